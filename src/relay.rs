//! Command relay client.
//!
//! The relay forwards finished records to a listener on another machine (typically a game
//! client bridge). The protocol is a bare TCP stream: one connection per payload, the payload is
//! written in full, the connection is closed, and nothing is read back.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::record::{CardRecord, TAG_SUFFIX};

/// Token telling the listener the current tag went away.
pub const REMOVED_TOKEN: &str = "RemovedTag";

/// Default relay host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default relay port.
pub const DEFAULT_PORT: u16 = 41114;

/// Default pause between the removal token and the record in [`RelayClient::send_swap`].
pub const DEFAULT_SWAP_DELAY: Duration = Duration::from_secs(1);

/// Relay endpoint configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Pause between the removal token and the record in a swap.
    pub swap_delay: Duration,
}

impl RelayConfig {
    /// Creates a configuration for the default endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            swap_delay: DEFAULT_SWAP_DELAY,
        }
    }

    /// Sets the host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the swap delay.
    #[must_use]
    pub const fn swap_delay(mut self, delay: Duration) -> Self {
        self.swap_delay = delay;
        self
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends records and removal notices to a relay listener.
#[derive(Debug, Clone, Default)]
pub struct RelayClient {
    config: RelayConfig,
}

impl RelayClient {
    #[must_use]
    pub const fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Sends an encoded record with the tag suffix appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPayload`] for a blank record, or the I/O error from connecting or
    /// writing.
    pub async fn send_record(&self, encoded: &str) -> Result<()> {
        let payload = record_payload(encoded)?;
        self.send(&payload).await?;
        tracing::info!("card data sent to {}:{}", self.config.host, self.config.port);
        Ok(())
    }

    /// Encodes `record` and sends it.
    pub async fn send_card(&self, record: &CardRecord) -> Result<()> {
        self.send_record(&record.encode()?).await
    }

    /// Tells the listener the tag was removed.
    pub async fn send_removed(&self) -> Result<()> {
        self.send(REMOVED_TOKEN).await?;
        tracing::info!("removed tag sent to {}:{}", self.config.host, self.config.port);
        Ok(())
    }

    /// Sends a removal notice, waits the swap delay, then sends the record.
    ///
    /// Nothing is sent if the record is blank. If the removal notice cannot be delivered the
    /// record is not sent either.
    pub async fn send_swap(&self, encoded: &str) -> Result<()> {
        let payload = record_payload(encoded)?;
        self.send_removed().await?;
        tokio::time::sleep(self.config.swap_delay).await;
        self.send(&payload).await?;
        tracing::info!("card data sent to {}:{}", self.config.host, self.config.port);
        Ok(())
    }

    async fn send(&self, payload: &str) -> Result<()> {
        let addr = (self.config.host.as_str(), self.config.port);
        let mut stream = TcpStream::connect(addr).await.inspect_err(|e| {
            tracing::warn!(
                "relay connection to {}:{} failed: {}",
                self.config.host,
                self.config.port,
                e
            );
        })?;
        stream.write_all(payload.as_bytes()).await?;
        stream.shutdown().await?;
        tracing::debug!("relayed {} bytes", payload.len());
        Ok(())
    }
}

fn record_payload(encoded: &str) -> Result<String> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(Error::EmptyPayload);
    }
    Ok(format!("{encoded}{TAG_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const RECORD: &str = "YG0189631139--4007----0000LOB-EN001UR1EXXX";

    async fn listener() -> (TcpListener, RelayClient) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = RelayClient::new(
            RelayConfig::new()
                .host("127.0.0.1")
                .port(port)
                .swap_delay(Duration::from_millis(20)),
        );
        (listener, client)
    }

    async fn accept_payload(listener: &TcpListener) -> String {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_send_record_appends_suffix() {
        let (listener, client) = listener().await;
        let server = tokio::spawn(async move { accept_payload(&listener).await });

        client.send_record(&format!(" {RECORD}\n")).await.unwrap();
        assert_eq!(server.await.unwrap(), format!("{RECORD}XX"));
    }

    #[tokio::test]
    async fn test_send_removed() {
        let (listener, client) = listener().await;
        let server = tokio::spawn(async move { accept_payload(&listener).await });

        client.send_removed().await.unwrap();
        assert_eq!(server.await.unwrap(), "RemovedTag");
    }

    #[tokio::test]
    async fn test_send_swap_uses_two_connections() {
        let (listener, client) = listener().await;
        let server = tokio::spawn(async move {
            let first = accept_payload(&listener).await;
            let second = accept_payload(&listener).await;
            (first, second)
        });

        client.send_swap(RECORD).await.unwrap();
        let (first, second) = server.await.unwrap();
        assert_eq!(first, REMOVED_TOKEN);
        assert_eq!(second, format!("{RECORD}XX"));
    }

    #[tokio::test]
    async fn test_send_card_encodes() {
        let (listener, client) = listener().await;
        let server = tokio::spawn(async move { accept_payload(&listener).await });

        let record = CardRecord::from_tag_text(RECORD).unwrap();
        client.send_card(&record).await.unwrap();
        assert_eq!(server.await.unwrap(), format!("{RECORD}XX"));
    }

    #[tokio::test]
    async fn test_blank_record_is_rejected() {
        let client = RelayClient::default();
        assert!(matches!(
            client.send_record("   ").await,
            Err(Error::EmptyPayload)
        ));
        assert!(matches!(client.send_swap("").await, Err(Error::EmptyPayload)));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = RelayClient::new(RelayConfig::new().host("127.0.0.1").port(port));
        assert!(matches!(client.send_removed().await, Err(Error::Io(_))));
    }

    #[test]
    fn test_relay_config_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 41114);
        assert_eq!(config.swap_delay, Duration::from_secs(1));
    }
}
