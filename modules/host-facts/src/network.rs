use crate::sqlbrowser::{resolve_instance_port, UnresolvedInstance, SQL_BROWSER_PORT};
use crate::{DbConnector, NetworkProbe};
use anyhow::{anyhow, Context, Result};
use config_parser::{sql_endpoint, DEFAULT_SQL_PORT};
use serde::Serialize;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use sysinfo::Networks;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterInfo {
    pub name: String,
    pub mac_address: String,
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
}

fn is_loopback_name(name: &str) -> bool {
    let n = name.to_ascii_lowercase();
    n == "lo" || n.starts_with("lo0") || n.contains("loopback")
}

/// Non-loopback interfaces that have carried traffic.
pub fn list_active_adapters() -> Vec<AdapterInfo> {
    let networks = Networks::new_with_refreshed_list();
    let mut out: Vec<AdapterInfo> = networks
        .iter()
        .filter(|(name, _)| !is_loopback_name(name))
        .filter(|(_, data)| data.total_received() > 0 || data.total_transmitted() > 0)
        .map(|(name, data)| AdapterInfo {
            name: name.to_string(),
            mac_address: data.mac_address().to_string(),
            received_bytes: data.total_received(),
            transmitted_bytes: data.total_transmitted(),
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

fn connect_any(host: &str, port: u16, timeout: Duration) -> Result<SocketAddr> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve {}", host))?
        .collect();
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => return Ok(addr),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(anyhow!("{}:{}: {}", host, port, e)),
        None => Err(anyhow!("{} resolved to no addresses", host)),
    }
}

/// TCP-level reachability for SQL Server endpoints and the internet probe.
#[derive(Debug, Clone)]
pub struct TcpReachability {
    pub db_timeout: Duration,
    /// UDP port of SQL Browser, queried for named instances.
    pub browser_port: u16,
    pub internet_target: String,
    pub internet_timeout: Duration,
}

impl Default for TcpReachability {
    fn default() -> Self {
        TcpReachability {
            db_timeout: Duration::from_millis(5000),
            browser_port: SQL_BROWSER_PORT,
            internet_target: "www.microsoft.com:443".to_string(),
            internet_timeout: Duration::from_millis(3000),
        }
    }
}

impl DbConnector for TcpReachability {
    fn connect(&self, data_source: &str, database: &str) -> Result<String> {
        let ep = sql_endpoint(data_source);
        let port = match (&ep.instance, ep.port) {
            (_, Some(p)) => p,
            (Some(instance), None) => resolve_instance_port(&ep.host, instance, self.browser_port, self.db_timeout)
                .map_err(|e| UnresolvedInstance {
                    host: ep.host.clone(),
                    instance: instance.clone(),
                    reason: format!("{:#}", e),
                })?,
            (None, None) => DEFAULT_SQL_PORT,
        };
        debug!(host = %ep.host, port, database, "connecting to SQL Server endpoint");
        let addr = connect_any(&ep.host, port, self.db_timeout)?;
        Ok(format!("TCP connection to {} ({}) accepted for database {}", data_source, addr, database))
    }
}

impl NetworkProbe for TcpReachability {
    fn internet(&self) -> Result<String> {
        let (host, port) = match self.internet_target.rsplit_once(':') {
            Some((h, p)) => (h.to_string(), p.parse::<u16>().with_context(|| format!("bad port in '{}'", self.internet_target))?),
            None => (self.internet_target.clone(), 443),
        };
        let addr = connect_any(&host, port, self.internet_timeout)?;
        Ok(format!("reached {} ({})", self.internet_target, addr))
    }

    fn active_adapters(&self) -> Result<Vec<AdapterInfo>> {
        Ok(list_active_adapters())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, UdpSocket};
    use std::thread;

    #[test]
    fn loopback_names() {
        assert!(is_loopback_name("lo"));
        assert!(is_loopback_name("Loopback Pseudo-Interface 1"));
        assert!(!is_loopback_name("Ethernet0"));
        assert!(!is_loopback_name("eth0"));
    }

    #[test]
    fn db_connect_to_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let r = TcpReachability::default();
        let msg = r.connect(&format!("127.0.0.1,{}", port), "PG_DB").unwrap();
        assert!(msg.contains("PG_DB"));
        assert!(msg.contains("127.0.0.1"));
    }

    #[test]
    fn db_connect_failure_keeps_error_text() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let r = TcpReachability { db_timeout: Duration::from_millis(300), ..Default::default() };
        let err = r.connect(&format!("127.0.0.1,{}", port), "PG_DB").unwrap_err();
        assert!(err.to_string().contains(&port.to_string()));
    }

    #[test]
    fn named_instance_port_comes_from_browser() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let sql_port = listener.local_addr().unwrap().port();
        let browser = UdpSocket::bind("127.0.0.1:0").unwrap();
        let browser_port = browser.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (_, from) = browser.recv_from(&mut buf).unwrap();
            let payload = format!("ServerName;SQL01;InstanceName;HR;tcp;{};;", sql_port);
            let mut resp = vec![0x05];
            resp.extend_from_slice(&(payload.len() as u16).to_le_bytes());
            resp.extend_from_slice(payload.as_bytes());
            browser.send_to(&resp, from).unwrap();
        });
        let r = TcpReachability { browser_port, ..Default::default() };
        let msg = r.connect("127.0.0.1\\HR", "PG_DB").unwrap();
        handle.join().unwrap();
        assert!(msg.contains(&sql_port.to_string()), "{}", msg);
    }

    #[test]
    fn named_instance_without_browser_is_unresolved() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let browser_port = silent.local_addr().unwrap().port();
        let r = TcpReachability { browser_port, db_timeout: Duration::from_millis(200), ..Default::default() };
        let err = r.connect("127.0.0.1\\HR", "PG_DB").unwrap_err();
        let unresolved = err.downcast_ref::<UnresolvedInstance>().unwrap();
        assert_eq!(unresolved.instance, "HR");
        assert!(!err.to_string().contains("1433"));
    }

    #[test]
    fn internet_probe_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let target = listener.local_addr().unwrap().to_string();
        let r = TcpReachability { internet_target: target.clone(), ..Default::default() };
        assert!(r.internet().unwrap().contains(&target));
    }
}
