use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;

use crate::config::AgentConfig;
use crate::error::{Result, RollcallError};
use crate::protocol::{Event, FrameCodec, Response};
use crate::tls::{client_connector, server_name};

/// Node-side connection factory. Every request dials a fresh connection,
/// writes one event, reads one response and hangs up.
#[derive(Clone)]
pub struct NodeClient {
    master: String,
    server_name: ServerName<'static>,
    connector: Option<TlsConnector>,
    io_timeout: Duration,
}

impl NodeClient {
    pub async fn from_config(config: &AgentConfig) -> Result<Self> {
        let connector = if config.tls.enabled {
            if !config.tls.verifies_server() {
                tracing::warn!("No CA configured, coordinator certificate will not be verified");
            }
            Some(client_connector(&config.tls).await?)
        } else {
            tracing::warn!("TLS disabled, talking to coordinator in plaintext");
            None
        };

        Ok(Self {
            master: config.master.clone(),
            server_name: server_name(&config.server_name)?,
            connector,
            io_timeout: config.io_timeout,
        })
    }

    pub fn master(&self) -> &str {
        &self.master
    }

    /// One request/response round trip, bounded by the I/O timeout.
    pub async fn send(&self, event: &Event) -> Result<Response> {
        let round_trip = async {
            let tcp = TcpStream::connect(&self.master).await?;
            match &self.connector {
                Some(connector) => {
                    let tls = connector.connect(self.server_name.clone(), tcp).await?;
                    exchange(tls, event).await
                }
                None => exchange(tcp, event).await,
            }
        };

        let response = tokio::time::timeout(self.io_timeout, round_trip)
            .await
            .map_err(|_| RollcallError::Timeout)??;
        tracing::debug!(
            action = %event.action,
            code = response.response_code,
            message = %response.response_message,
            "Coordinator replied"
        );
        Ok(response)
    }
}

/// Write `event` on `stream` and read back a single response.
pub async fn exchange<S>(stream: S, event: &Event) -> Result<Response>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = tokio_util::codec::Framed::new(stream, FrameCodec::<Response, Event>::new());
    framed.send(event.clone()).await?;
    match framed.next().await {
        Some(Ok(response)) => Ok(response),
        // TLS peers that hang up without close_notify surface as UnexpectedEof.
        Some(Err(RollcallError::Transport(e))) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(RollcallError::NoResponse)
        }
        Some(Err(e)) => Err(e),
        None => Err(RollcallError::NoResponse),
    }
}
