//! TCP reachability condition

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use stevedore_core::prelude::*;

// Timeout per connect attempt
const TCP_PING_TIMEOUT: Duration = Duration::from_millis(500);

/// Check whether a set of TCP ports accepts connections.
///
/// Each iteration probes only the still-pending ports; a port that
/// accepted a connection once is never probed again. The condition
/// matches when the pending set is empty.
pub struct TcpPortCondition {
    host: String,
    ports: Vec<u16>,
    pending: Vec<u16>,
}

impl TcpPortCondition {
    pub fn new(host: impl Into<String>, ports: Vec<u16>) -> Self {
        let pending = ports.clone();
        Self {
            host: host.into(),
            ports,
            pending,
        }
    }

    pub fn describe(&self) -> String {
        let ports = self
            .ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("on tcp port(s) [{ports}] on host {}", self.host)
    }

    /// The ports not yet seen accepting a connection.
    pub fn pending(&self) -> &[u16] {
        &self.pending
    }

    pub async fn check(&mut self) -> Result<bool> {
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for port in self.pending.drain(..) {
            match timeout(
                TCP_PING_TIMEOUT,
                TcpStream::connect((self.host.as_str(), port)),
            )
            .await
            {
                Ok(Ok(_stream)) => {
                    debug!("tcp port {port} on {} accepted a connection", self.host);
                }
                _ => still_pending.push(port),
            }
        }
        self.pending = still_pending;
        Ok(self.pending.is_empty())
    }

    pub async fn cleanup(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn open_port() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn closed_port() -> u16 {
        let (listener, port) = open_port().await;
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_all_ports_open_matches() {
        let (_a, port_a) = open_port().await;
        let (_b, port_b) = open_port().await;
        let mut condition = TcpPortCondition::new("127.0.0.1", vec![port_a, port_b]);

        assert!(condition.check().await.unwrap());
        assert!(condition.pending().is_empty());
    }

    #[tokio::test]
    async fn test_satisfied_port_never_reprobed() {
        let (listener, open) = open_port().await;
        let closed = closed_port().await;
        let mut condition = TcpPortCondition::new("127.0.0.1", vec![open, closed]);

        assert!(!condition.check().await.unwrap());
        assert_eq!(condition.pending(), &[closed]);

        // The open port goes away; since it was already satisfied it must
        // not come back into the pending set.
        drop(listener);
        assert!(!condition.check().await.unwrap());
        assert_eq!(condition.pending(), &[closed]);
    }

    #[tokio::test]
    async fn test_pending_port_matches_once_opened() {
        let closed = closed_port().await;
        let mut condition = TcpPortCondition::new("127.0.0.1", vec![closed]);

        assert!(!condition.check().await.unwrap());

        let _listener = TcpListener::bind(("127.0.0.1", closed)).await.unwrap();
        assert!(condition.check().await.unwrap());
    }

    #[test]
    fn test_describe_names_ports_and_host() {
        let condition = TcpPortCondition::new("db.local", vec![5432, 6432]);
        assert_eq!(
            condition.describe(),
            "on tcp port(s) [5432, 6432] on host db.local"
        );
    }
}
