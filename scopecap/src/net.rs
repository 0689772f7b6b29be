//! Network pre-flight helpers
//!
//! Everything here is informational: the capture carries on whatever these
//! report, except for an address that does not parse.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ipnet::Ipv4Net;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use scopecap_core::constants::{HTTP_PORT, REACHABILITY_PORTS};
use scopecap_transport::tcp;

use crate::error::{Error, Result};

/// Wait per port when probing reachability
pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(3);

/// Prefix assumed for the local network
pub const LOCAL_PREFIX: u8 = 24;

/// Parse an instrument address
pub fn validate_ip(address: &str) -> Result<IpAddr> {
    address
        .trim()
        .parse()
        .map_err(|_| Error::InvalidAddress(format!("'{}' is not a valid IP address", address)))
}

/// Local address the OS would use to reach `target`
///
/// Connecting a UDP socket sends nothing; it only asks the kernel to pick a
/// route.
pub async fn local_ip_for(target: IpAddr) -> Option<IpAddr> {
    let bind: SocketAddr = match target {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = UdpSocket::bind(bind).await.ok()?;
    socket.connect((target, HTTP_PORT)).await.ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// The /24 around `ip`
pub fn local_subnet(ip: Ipv4Addr) -> Ipv4Net {
    // a /24 prefix is always valid
    Ipv4Net::new(ip, LOCAL_PREFIX).map(|net| net.trunc()).unwrap_or_else(|_| Ipv4Net::from(ip))
}

/// Whether two addresses share a /24
pub fn same_subnet(a: IpAddr, b: IpAddr) -> bool {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => local_subnet(a).contains(&b),
        _ => false,
    }
}

/// Log which local interface reaches the instrument
pub async fn log_route(target: IpAddr) {
    match local_ip_for(target).await {
        Some(local) if same_subnet(local, target) => {
            info!("Local interface {} is on the same subnet as {}", local, target);
        }
        Some(local) => {
            warn!(
                "Local interface {} is not on {}'s /{} subnet; the instrument may be unreachable",
                local, target, LOCAL_PREFIX
            );
        }
        None => warn!("No route to {}", target),
    }
}

/// Probe the instrument's well-known ports, returning the open ones
pub async fn check_reachable(target: IpAddr) -> Vec<u16> {
    let host = target.to_string();
    let mut open = Vec::new();

    for port in REACHABILITY_PORTS {
        if tcp::probe(&host, port, REACHABILITY_TIMEOUT).await {
            debug!("{}:{} open", host, port);
            open.push(port);
        }
    }

    if open.is_empty() {
        warn!("{} did not answer on ports {:?}", host, REACHABILITY_PORTS);
    } else {
        info!("{} reachable on ports {:?}", host, open);
    }
    open
}

/// `Authorization` header value for HTTP Basic Auth
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// GET `/` on the instrument's web server with Basic Auth, returning the status
///
/// Some LAN-locked instruments only accept remote control once a web login
/// has happened.
pub async fn http_login(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
    wait: Duration,
) -> Result<u16> {
    let request = format!(
        "GET / HTTP/1.0\r\nHost: {}\r\nAuthorization: {}\r\nConnection: close\r\n\r\n",
        host,
        basic_auth(username, password)
    );

    let exchange = async {
        let mut stream = TcpStream::connect((host, port)).await?;
        stream.write_all(request.as_bytes()).await?;

        let mut head = Vec::with_capacity(256);
        let mut buf = [0u8; 256];
        while !head.contains(&b'\n') {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        Ok::<_, std::io::Error>(head)
    };

    let head = timeout(wait, exchange)
        .await
        .map_err(|_| Error::Transport(scopecap_transport::Error::ConnectionTimeout))??;

    parse_status(&head).ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "malformed HTTP status line",
        ))
    })
}

fn parse_status(head: &[u8]) -> Option<u16> {
    let line = head.split(|&b| b == b'\n').next()?;
    let line = std::str::from_utf8(line).ok()?;
    let mut parts = line.split_whitespace();

    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    #[test]
    fn test_validate_ip() {
        assert_eq!(validate_ip(" 192.168.1.50 ").unwrap(), IpAddr::from([192, 168, 1, 50]));
        assert!(matches!(validate_ip("scope.lab"), Err(Error::InvalidAddress(_))));
        assert!(validate_ip("192.168.1.256").is_err());
    }

    #[test]
    fn test_same_subnet() {
        let scope = IpAddr::from([192, 168, 1, 50]);

        assert!(same_subnet(IpAddr::from([192, 168, 1, 7]), scope));
        assert!(!same_subnet(IpAddr::from([192, 168, 2, 7]), scope));
        assert_eq!(local_subnet(Ipv4Addr::new(10, 0, 4, 33)).to_string(), "10.0.4.0/24");
    }

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth("admin", "secret"), "Basic YWRtaW46c2VjcmV0");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(b"HTTP/1.1 401 Unauthorized\r\n"), Some(401));
        assert_eq!(parse_status(b"HTTP/1.0 200 OK\r\nServer: x\r\n"), Some(200));
        assert_eq!(parse_status(b"garbage\r\n"), None);
    }

    #[tokio::test]
    async fn test_http_login_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(http_login("127.0.0.1", port, "a", "b", Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_local_ip_for_loopback() {
        let local = local_ip_for(IpAddr::from([127, 0, 0, 1])).await;
        assert_eq!(local, Some(IpAddr::from([127, 0, 0, 1])));
    }

    #[tokio::test]
    async fn test_http_login_sends_credentials() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await.unwrap();
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let status = http_login("127.0.0.1", port, "admin", "secret", Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(status, 200);
        assert!(server.await.unwrap().contains("Authorization: Basic YWRtaW46c2VjcmV0"));
    }
}
