use serde::{Deserialize, Serialize};

/// Host facts a node reports at registration, carried as a JSON string in
/// the `sysinfo` parameter. The coordinator only reads the OS family; the
/// rest is stored verbatim for operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostFacts {
    /// Hardware architecture (e.g. x86_64, aarch64).
    #[serde(default)]
    pub architecture: String,
    /// Hostname.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kernel_version: String,
    #[serde(default)]
    pub os: OsInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsInfo {
    /// OS family (e.g. debian, redhat, darwin, windows).
    #[serde(default)]
    pub family: String,
    /// OS platform (e.g. ubuntu, centos).
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl HostFacts {
    /// Parse a facts blob. Returns `None` for anything that is not a JSON
    /// object of the expected shape.
    pub fn parse(blob: &str) -> Option<Self> {
        serde_json::from_str(blob).ok()
    }

    /// Lower-cased OS family, falling back to the platform when the family
    /// is blank. `None` if neither is reported.
    pub fn os_family(&self) -> Option<String> {
        [&self.os.family, &self.os.platform]
            .into_iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .find(|s| !s.is_empty())
    }

    pub fn to_blob(&self) -> String {
        // A struct of strings always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_blob() {
        let facts = HostFacts::parse(r#"{"os":{"family":"Debian"}}"#).unwrap();
        assert_eq!(facts.os_family().as_deref(), Some("debian"));
        assert!(facts.name.is_empty());
    }

    #[test]
    fn family_falls_back_to_platform() {
        let facts = HostFacts::parse(r#"{"os":{"family":"","platform":"ubuntu"}}"#).unwrap();
        assert_eq!(facts.os_family().as_deref(), Some("ubuntu"));
    }

    #[test]
    fn missing_os_has_no_family() {
        let facts = HostFacts::parse(r#"{"name":"web-1"}"#).unwrap();
        assert_eq!(facts.os_family(), None);
        assert!(HostFacts::parse("not json").is_none());
    }

    #[test]
    fn blob_round_trips() {
        let facts = HostFacts {
            architecture: "x86_64".into(),
            name: "web-1".into(),
            kernel_version: "6.1.0".into(),
            os: OsInfo {
                family: "debian".into(),
                platform: "debian".into(),
                name: "Debian GNU/Linux".into(),
                version: "12".into(),
            },
        };
        assert_eq!(HostFacts::parse(&facts.to_blob()), Some(facts));
    }
}
