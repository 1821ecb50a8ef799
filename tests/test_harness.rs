//! Shared helpers for coordinator and node integration tests.
//!
//! Sessions are driven over in-memory duplex pipes where possible; tests that
//! need a real socket spawn a plaintext listener on an ephemeral port.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use rollcall::auth::AUTH_KEY;
use rollcall::protocol::{Action, Event, FrameCodec, Response, PARAM_JOB, PARAM_SYSINFO};
use rollcall::scheduler::ProvisioningPolicy;
use rollcall::server::{Listener, SessionHandler, SessionOutcome};
use rollcall::store::{KvStore, MemoryStore};

pub const SECRET: &str = "s3cret";

/// Facts blob a debian host would register with.
pub const DEBIAN_FACTS: &str = r#"{"os":{"family":"debian","platform":"debian"}}"#;

/// Short TTL so expiry tests stay fast.
pub const SHORT_EXPIRE: Duration = Duration::from_millis(300);

/// Store with [`SECRET`] already installed.
pub async fn store_with_secret() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .set(AUTH_KEY, SECRET, None)
        .await
        .expect("memory store set");
    store
}

pub fn handler(store: Arc<MemoryStore>, expire: Duration) -> SessionHandler {
    handler_with_policy(store, ProvisioningPolicy::default(), expire)
}

pub fn handler_with_policy(
    store: Arc<MemoryStore>,
    policy: ProvisioningPolicy,
    expire: Duration,
) -> SessionHandler {
    SessionHandler::new(store, policy, expire, Duration::from_secs(2))
}

pub fn checkin(id: i64) -> Event {
    Event::new(id, Action::Checkin, SECRET)
}

pub fn register(id: i64, facts: Option<&str>) -> Event {
    let event = Event::new(id, Action::Register, SECRET).with_param("name", "test");
    match facts {
        Some(blob) => event.with_param(PARAM_SYSINFO, blob),
        None => event,
    }
}

pub fn get_jobs(id: i64) -> Event {
    Event::new(id, Action::GetJobs, SECRET).with_param("params", "all")
}

pub fn delete_job(id: i64, job: &str) -> Event {
    Event::new(id, Action::DeleteJob, SECRET).with_param(PARAM_JOB, job)
}

/// Run one session over a duplex pipe: send `event`, collect the reply (if
/// any) and the outcome the handler reports.
pub async fn roundtrip(
    handler: &SessionHandler,
    event: Event,
) -> (Option<Response>, SessionOutcome) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let session = {
        let handler = handler.clone();
        tokio::spawn(async move { handler.handle(server).await })
    };

    let mut framed = Framed::new(client, FrameCodec::<Response, Event>::new());
    framed.send(event).await.expect("write event");
    let response = match framed.next().await {
        Some(Ok(response)) => Some(response),
        _ => None,
    };

    let outcome = session.await.expect("session task panicked");
    (response, outcome)
}

/// Send raw bytes and return whatever line comes back.
pub async fn raw_roundtrip(handler: &SessionHandler, bytes: &[u8]) -> (String, SessionOutcome) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let session = {
        let handler = handler.clone();
        tokio::spawn(async move { handler.handle(server).await })
    };

    client.write_all(bytes).await.expect("write bytes");
    client.shutdown().await.expect("shutdown write half");
    let mut reply = String::new();
    let _ = client.read_to_string(&mut reply).await;

    let outcome = session.await.expect("session task panicked");
    (reply, outcome)
}

/// A plaintext coordinator on an ephemeral localhost port.
pub struct TestCoordinator {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestCoordinator {
    pub async fn start(expire: Duration) -> Self {
        let store = store_with_secret().await;
        let listener = Listener::bind(
            "127.0.0.1:0".parse().unwrap(),
            handler(store.clone(), expire),
            None,
            Duration::from_secs(2),
        )
        .await
        .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            let _ = listener.run(token).await;
        });

        Self {
            addr,
            store,
            shutdown,
            handle,
        }
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout_duration {
        if condition().await {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}

pub async fn assert_eventually<F, Fut>(condition: F, timeout_duration: Duration, message: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = wait_for(condition, timeout_duration, Duration::from_millis(50)).await;
    assert!(result, "{}", message);
}
