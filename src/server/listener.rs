use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::Result;
use crate::server::session::{SessionHandler, SessionOutcome};
use crate::tls::TlsIdentity;

/// Pause after a failed accept so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept loop. Every connection gets its own task; tasks share nothing but
/// the cloned [`SessionHandler`].
pub struct Listener {
    listener: TcpListener,
    handler: SessionHandler,
    tls: Option<TlsAcceptor>,
    handshake_timeout: Duration,
}

impl Listener {
    pub async fn bind(
        addr: SocketAddr,
        handler: SessionHandler,
        tls: Option<TlsIdentity>,
        handshake_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            handler,
            tls: tls.map(|identity| identity.acceptor()),
            handshake_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Serve until `shutdown` fires, then wait for in-flight sessions.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let tracker = TaskTracker::new();
        tracing::info!(
            addr = %self.local_addr()?,
            tls = self.is_tls(),
            "Coordinator listening"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = self.handler.clone();
                        let tls = self.tls.clone();
                        let handshake_timeout = self.handshake_timeout;
                        tracker.spawn(async move {
                            serve(stream, peer, handler, tls, handshake_timeout).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        tracker.close();
        tracing::info!(in_flight = tracker.len(), "Draining sessions");
        tracker.wait().await;
        tracing::info!("Coordinator stopped");
        Ok(())
    }
}

async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    handler: SessionHandler,
    tls: Option<TlsAcceptor>,
    handshake_timeout: Duration,
) {
    let outcome = match tls {
        Some(acceptor) => {
            match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
                Ok(Ok(tls_stream)) => handler.handle(tls_stream).await,
                Ok(Err(e)) => {
                    tracing::debug!(%peer, error = %e, "TLS handshake failed");
                    return;
                }
                Err(_) => {
                    tracing::debug!(%peer, "TLS handshake timed out");
                    return;
                }
            }
        }
        None => handler.handle(stream).await,
    };

    match outcome {
        SessionOutcome::Responded { action, code } => {
            tracing::debug!(%peer, %action, code, "Session complete");
        }
        SessionOutcome::Closed(reason) => {
            tracing::debug!(%peer, ?reason, "Session closed without response");
        }
    }
}
