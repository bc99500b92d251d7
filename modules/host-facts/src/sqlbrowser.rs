//! SQL Server Browser lookup (UDP 1434) for named-instance ports.

use anyhow::{anyhow, Context, Result};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use thiserror::Error;

pub const SQL_BROWSER_PORT: u16 = 1434;

const CLNT_UCAST_INST: u8 = 0x04;
const SVR_RESP: u8 = 0x05;

/// A named instance whose TCP port could not be looked up.
#[derive(Debug, Error)]
#[error("named instance {host}\\{instance}: port could not be resolved via SQL Browser ({reason})")]
pub struct UnresolvedInstance {
    pub host: String,
    pub instance: String,
    pub reason: String,
}

pub fn instance_request(instance: &str) -> Vec<u8> {
    let mut q = Vec::with_capacity(instance.len() + 1);
    q.push(CLNT_UCAST_INST);
    q.extend_from_slice(instance.as_bytes());
    q
}

/// Pull the `tcp;<port>` pair out of a browser response
/// (`0x05`, u16 LE length, `key;value;...;;`).
pub fn parse_browser_response(buf: &[u8]) -> Result<u16> {
    if buf.len() < 3 || buf[0] != SVR_RESP {
        return Err(anyhow!("unexpected SQL Browser reply ({} bytes)", buf.len()));
    }
    let declared = u16::from_le_bytes([buf[1], buf[2]]) as usize;
    let body = &buf[3..];
    let body = &body[..declared.min(body.len())];
    let text = String::from_utf8_lossy(body);
    let tokens: Vec<&str> = text.split(';').collect();
    let port = tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case("tcp"))
        .and_then(|i| tokens.get(i + 1))
        .ok_or_else(|| anyhow!("instance does not listen on TCP"))?;
    port.trim().parse::<u16>().with_context(|| format!("bad TCP port '{}' in SQL Browser reply", port))
}

fn resolve_first(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve {}", host))?
        .next()
        .ok_or_else(|| anyhow!("{} resolved to no addresses", host))
}

/// Ask the browser on `host:browser_port` for the TCP port of `instance`.
pub fn resolve_instance_port(host: &str, instance: &str, browser_port: u16, timeout: Duration) -> Result<u16> {
    let addr = resolve_first(host, browser_port)?;
    let bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let sock = UdpSocket::bind(bind)?;
    sock.set_read_timeout(Some(timeout))?;
    sock.send_to(&instance_request(instance), addr)?;
    let mut buf = [0u8; 2048];
    let (n, _) = sock.recv_from(&mut buf).context("no reply from SQL Browser")?;
    parse_browser_response(&buf[..n])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn reply(payload: &str) -> Vec<u8> {
        let mut r = vec![SVR_RESP];
        r.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        r.extend_from_slice(payload.as_bytes());
        r
    }

    #[test]
    fn request_layout() {
        assert_eq!(instance_request("HR"), vec![0x04, b'H', b'R']);
    }

    #[test]
    fn parses_tcp_port() {
        let r = reply("ServerName;SQL01;InstanceName;HR;IsClustered;No;Version;15.0.2000.5;tcp;49723;;");
        assert_eq!(parse_browser_response(&r).unwrap(), 49723);
    }

    #[test]
    fn rejects_replies_without_tcp() {
        let r = reply("ServerName;SQL01;InstanceName;HR;np;\\\\SQL01\\pipe\\sql\\query;;");
        assert!(parse_browser_response(&r).is_err());
        assert!(parse_browser_response(&[0x05]).is_err());
        assert!(parse_browser_response(b"hello").is_err());
    }

    #[test]
    fn resolves_against_local_browser() {
        let browser = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = browser.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (n, from) = browser.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..n], &[0x04, b'H', b'R']);
            browser.send_to(&reply("ServerName;SQL01;InstanceName;HR;tcp;50123;;"), from).unwrap();
        });
        let got = resolve_instance_port("127.0.0.1", "HR", port, Duration::from_secs(2)).unwrap();
        handle.join().unwrap();
        assert_eq!(got, 50123);
    }
}
