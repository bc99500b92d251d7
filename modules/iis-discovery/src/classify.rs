use readiness_core::InstanceType;

/// Classify an IIS application from its virtual and physical paths.
///
/// Case-insensitive substring rules, first match wins:
/// "WFE"/"Workflow" → WFE, then "ESS" → ESS, then "Self-Service" → ESS.
/// Workflow markers are tested first so a workflow engine living under an
/// ESS-named folder is never reported as ESS.
pub fn classify(application_path: &str, physical_path: &str) -> InstanceType {
    let app = application_path.to_lowercase();
    let phys = physical_path.to_lowercase();
    let has = |needle: &str| app.contains(needle) || phys.contains(needle);

    if has("wfe") || has("workflow") {
        InstanceType::Wfe
    } else if has("ess") || has("self-service") {
        InstanceType::Ess
    } else {
        InstanceType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_table() {
        let cases: &[(&str, &str, InstanceType)] = &[
            ("/ESS", "C:\\inetpub\\wwwroot\\ESS", InstanceType::Ess),
            ("/WFE", "C:\\inetpub\\wwwroot\\WFE", InstanceType::Wfe),
            ("/HR", "D:\\Apps\\Workflow\\Engine", InstanceType::Wfe),
            ("/Portal", "D:\\Apps\\Self-Service", InstanceType::Ess),
            ("/", "C:\\inetpub\\wwwroot", InstanceType::Unknown),
            ("/api", "C:\\sites\\api", InstanceType::Unknown),
            ("/ess", "c:\\apps\\ess", InstanceType::Ess),
        ];
        for (app, phys, expected) in cases {
            assert_eq!(classify(app, phys), *expected, "{} | {}", app, phys);
        }
    }

    #[test]
    fn workflow_wins_over_ess_in_any_case() {
        assert_eq!(classify("/ESS", "D:\\ESS\\WORKFLOW"), InstanceType::Wfe);
        assert_eq!(classify("/essWorkFlow", ""), InstanceType::Wfe);
        assert_eq!(classify("/ESS-wfe", "C:\\ESS"), InstanceType::Wfe);
    }

    #[test]
    fn empty_input_is_unknown() {
        assert_eq!(classify("", ""), InstanceType::Unknown);
    }
}
