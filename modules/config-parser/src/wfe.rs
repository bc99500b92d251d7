use crate::connection::parse_connection_string;
use crate::xml::{parse_document, Element};
use crate::{read_config, ConfigError};
use readiness_core::TenantConfig;
use std::path::Path;
use tracing::debug;

pub fn parse_wfe_config(path: &Path) -> Result<Vec<TenantConfig>, ConfigError> {
    let text = read_config(path)?;
    let tenants = parse_wfe_str(&text).map_err(|message| ConfigError::Parse { path: path.to_path_buf(), message })?;
    debug!(path = %path.display(), tenants = tenants.len(), "parsed WFE tenants config");
    Ok(tenants)
}

/// One entry per `<tenant>` element, in document order, without deduplication.
pub fn parse_wfe_str(xml: &str) -> Result<Vec<TenantConfig>, String> {
    let root = parse_document(xml)?;
    Ok(root.descendants().into_iter().filter(|e| e.is("tenant")).map(tenant_from).collect())
}

fn tenant_from(e: &Element) -> TenantConfig {
    let connection_string = e.value_of(&["workflowDatabaseConnection", "workflowConnectionString", "connectionString"]);
    let parts = connection_string.as_deref().map(parse_connection_string).unwrap_or_default();
    TenantConfig {
        tenant_id: e.value_of(&["id", "tenantId"]).unwrap_or_default(),
        database_server: e.value_of(&["workflowDatabaseServer"]).or(parts.server),
        database_name: e.value_of(&["workflowDatabaseName"]).or(parts.database),
        connection_string,
        client_url: e.value_of(&["clientUrl"]),
        workflow_engine_path: e.value_of(&["workflowEnginePath"]),
        workflow_engine_physical_path: e.value_of(&["workflowEnginePhysicalPath"]),
        from_email_address: e.value_of(&["from-email-address", "fromEmailAddress"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANTS: &str = r#"<?xml version="1.0"?>
<tenants>
  <tenant id="ACME">
    <workflowDatabaseConnection>data source=SQL02;initial catalog=WF_ACME</workflowDatabaseConnection>
    <clientUrl>https://ess.acme.local/ESS</clientUrl>
    <workflowEnginePath>/WFE</workflowEnginePath>
    <workflowEnginePhysicalPath>D:\Apps\WFE</workflowEnginePhysicalPath>
    <from-email-address>hr@acme.local</from-email-address>
  </tenant>
  <tenant id="GLOBEX">
    <workflowDatabaseServer>SQL03</workflowDatabaseServer>
    <workflowDatabaseName>WF_GLOBEX</workflowDatabaseName>
  </tenant>
  <tenant id="ACME">
    <workflowDatabaseConnection>not a connection string</workflowDatabaseConnection>
  </tenant>
</tenants>"#;

    #[test]
    fn returns_every_tenant_in_document_order() {
        let t = parse_wfe_str(TENANTS).unwrap();
        let ids: Vec<_> = t.iter().map(|t| t.tenant_id.as_str()).collect();
        assert_eq!(ids, vec!["ACME", "GLOBEX", "ACME"]);
    }

    #[test]
    fn fields_from_connection_string_and_elements() {
        let t = parse_wfe_str(TENANTS).unwrap();
        assert_eq!(t[0].database_server.as_deref(), Some("SQL02"));
        assert_eq!(t[0].database_name.as_deref(), Some("WF_ACME"));
        assert_eq!(t[0].client_url.as_deref(), Some("https://ess.acme.local/ESS"));
        assert_eq!(t[0].workflow_engine_path.as_deref(), Some("/WFE"));
        assert_eq!(t[0].workflow_engine_physical_path.as_deref(), Some("D:\\Apps\\WFE"));
        assert_eq!(t[0].from_email_address.as_deref(), Some("hr@acme.local"));
        assert_eq!(t[1].database_server.as_deref(), Some("SQL03"));
        assert_eq!(t[1].database_name.as_deref(), Some("WF_GLOBEX"));
    }

    #[test]
    fn unparsable_connection_keeps_tenant() {
        let t = parse_wfe_str(TENANTS).unwrap();
        assert_eq!(t[2].tenant_id, "ACME");
        assert!(t[2].connection_string.is_some());
        assert_eq!(t[2].database_server, None);
        assert_eq!(t[2].database_name, None);
    }

    #[test]
    fn zero_tenants_is_empty_not_error() {
        assert!(parse_wfe_str("<tenants/>").unwrap().is_empty());
    }

    #[test]
    fn tenant_attributes_are_accepted() {
        let t = parse_wfe_str(r#"<tenants><tenant tenantId="X" clientUrl="http://x"/></tenants>"#).unwrap();
        assert_eq!(t[0].tenant_id, "X");
        assert_eq!(t[0].client_url.as_deref(), Some("http://x"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_wfe_config(&dir.path().join("tenants.config")).unwrap_err();
        assert!(err.is_not_found());
    }
}
