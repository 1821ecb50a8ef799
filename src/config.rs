use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Port the coordinator listens on by default.
pub const DEFAULT_PORT: u16 = 1337;
/// Default liveness TTL for a registered node, in seconds.
pub const DEFAULT_EXPIRE_SECS: u64 = 30;
/// Default check-in interval for nodes, in seconds.
pub const DEFAULT_WAIT_SECS: u64 = 5;
/// Default bound on a single read or write on a connection, in seconds.
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 10;
/// SNI name nodes present when dialing the coordinator.
pub const DEFAULT_SERVER_NAME: &str = "rollcall-coordinator";

/// TLS configuration shared by the coordinator and nodes.
///
/// The coordinator presents `cert_path`/`key_path`. Nodes verify the
/// coordinator against `ca_cert_path` when it is set, and accept any
/// certificate otherwise.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Enable TLS. If false, all other TLS settings are ignored.
    pub enabled: bool,

    /// Path to the CA certificate (PEM format) used by nodes to verify the
    /// coordinator.
    pub ca_cert_path: Option<PathBuf>,

    /// Path to the coordinator's certificate chain (PEM format).
    pub cert_path: Option<PathBuf>,

    /// Path to the coordinator's private key (PEM format).
    pub key_path: Option<PathBuf>,

    /// Allow plaintext TCP for development/testing.
    /// When true and TLS files are missing, runs in plaintext mode with warning.
    /// When false and TLS files are missing, fails to start.
    pub allow_insecure: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ca_cert_path: None,
            cert_path: None,
            key_path: None,
            allow_insecure: false,
        }
    }
}

impl TlsConfig {
    /// Plaintext configuration, for tests and local development.
    pub fn insecure() -> Self {
        Self {
            enabled: false,
            allow_insecure: true,
            ..Self::default()
        }
    }

    /// True when the coordinator has everything it needs to serve TLS.
    pub fn server_ready(&self) -> bool {
        self.enabled && self.cert_path.is_some() && self.key_path.is_some()
    }

    /// True when nodes will verify the coordinator's certificate.
    pub fn verifies_server(&self) -> bool {
        self.enabled && self.ca_cert_path.is_some()
    }
}

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub listen_addr: SocketAddr,
    /// Redis URL. `None` selects the in-process store.
    pub redis_url: Option<String>,
    /// Liveness TTL applied to node markers and their job sets.
    pub expire: Duration,
    /// Shared secret to install. `None` reuses the stored one or generates one.
    pub secret: Option<String>,
    /// JSON file overriding the built-in provisioning templates.
    pub templates_path: Option<PathBuf>,
    pub io_timeout: Duration,
    pub tls: TlsConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            redis_url: None,
            expire: Duration::from_secs(DEFAULT_EXPIRE_SECS),
            secret: None,
            templates_path: None,
            io_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
            tls: TlsConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_expire(mut self, expire: Duration) -> Self {
        self.expire = expire;
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }
}

/// Node-side settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Coordinator address, `host:port`.
    pub master: String,
    pub node_id: i64,
    /// Display name sent on registration.
    pub name: String,
    /// Shared secret presented on every event.
    pub password: String,
    /// Sleep between check-in rounds.
    pub wait: Duration,
    pub io_timeout: Duration,
    /// Kill a job command still running after this long. `None` waits forever.
    pub job_timeout: Option<Duration>,
    /// Name used for SNI and, when verifying, certificate matching.
    pub server_name: String,
    pub tls: TlsConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            master: "localhost:1337".to_string(),
            node_id: 2,
            name: "client".to_string(),
            password: String::new(),
            wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            io_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
            job_timeout: None,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            tls: TlsConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn new(master: impl Into<String>, node_id: i64, password: impl Into<String>) -> Self {
        Self {
            master: master.into(),
            node_id,
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }
}

/// Pick a random node id in `1..10000`.
pub fn random_node_id() -> i64 {
    use rand::Rng;
    rand::thread_rng().gen_range(1..10000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tls_config_default() {
        let cfg = TlsConfig::default();
        assert!(cfg.enabled);
        assert!(cfg.ca_cert_path.is_none());
        assert!(cfg.cert_path.is_none());
        assert!(cfg.key_path.is_none());
        assert!(!cfg.allow_insecure);
        assert!(!cfg.server_ready());
    }

    #[test]
    fn tls_config_server_ready_when_cert_and_key_set() {
        let cfg = TlsConfig {
            cert_path: Some(PathBuf::from("/cert.pem")),
            key_path: Some(PathBuf::from("/key.pem")),
            ..TlsConfig::default()
        };
        assert!(cfg.server_ready());

        let mut missing_key = cfg.clone();
        missing_key.key_path = None;
        assert!(!missing_key.server_ready());

        let mut disabled = cfg;
        disabled.enabled = false;
        assert!(!disabled.server_ready());
    }

    #[test]
    fn tls_config_verifies_server_only_with_ca() {
        let mut cfg = TlsConfig::default();
        assert!(!cfg.verifies_server());
        cfg.ca_cert_path = Some(PathBuf::from("/ca.pem"));
        assert!(cfg.verifies_server());
    }

    #[test]
    fn insecure_tls_config() {
        let cfg = TlsConfig::insecure();
        assert!(!cfg.enabled);
        assert!(cfg.allow_insecure);
    }

    #[test]
    fn coordinator_config_default() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:1337");
        assert!(cfg.redis_url.is_none());
        assert_eq!(cfg.expire, Duration::from_secs(30));
        assert!(cfg.secret.is_none());
    }

    #[test]
    fn coordinator_config_builders() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let cfg = CoordinatorConfig::new(addr)
            .with_secret("s")
            .with_expire(Duration::from_secs(5))
            .with_tls(TlsConfig::insecure());
        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.secret.as_deref(), Some("s"));
        assert_eq!(cfg.expire, Duration::from_secs(5));
        assert!(!cfg.tls.enabled);
    }

    #[test]
    fn agent_config_default() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.master, "localhost:1337");
        assert_eq!(cfg.node_id, 2);
        assert_eq!(cfg.name, "client");
        assert_eq!(cfg.wait, Duration::from_secs(5));
        assert_eq!(cfg.server_name, DEFAULT_SERVER_NAME);
        assert!(cfg.job_timeout.is_none());
    }

    #[test]
    fn agent_config_job_timeout() {
        let cfg = AgentConfig::new("10.0.0.1:1337", 7, "s")
            .with_job_timeout(Duration::from_secs(60));
        assert_eq!(cfg.job_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn random_node_id_in_range() {
        for _ in 0..100 {
            let id = random_node_id();
            assert!((1..10000).contains(&id));
        }
    }
}
