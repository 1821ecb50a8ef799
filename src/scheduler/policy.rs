use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RollcallError};
use crate::protocol::HostFacts;

/// Job id to command.
pub type JobTemplate = BTreeMap<String, String>;

/// OS family that receives the enlarged built-in template.
pub const DEBIAN_FAMILY: &str = "debian";

/// Chooses the job set a node is provisioned with from its reported host
/// facts.
///
/// Selection is a pure lookup on the lower-cased OS family: a family with a
/// template gets that template, everything else (including missing or
/// unparseable facts) gets `default`. Templates are per platform, never per
/// node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningPolicy {
    #[serde(default)]
    families: BTreeMap<String, JobTemplate>,
    #[serde(default)]
    default: JobTemplate,
}

impl Default for ProvisioningPolicy {
    fn default() -> Self {
        let debian: JobTemplate = [
            ("1234", "whoami"),
            ("2345", "ls /"),
            ("3456", "uname -a"),
            ("4567", "df -h"),
            ("5678", "uptime"),
        ]
        .into_iter()
        .map(|(id, cmd)| (id.to_string(), cmd.to_string()))
        .collect();

        Self::new(JobTemplate::new()).with_family(DEBIAN_FAMILY, debian)
    }
}

impl ProvisioningPolicy {
    /// A policy with no family-specific templates.
    pub fn new(default: JobTemplate) -> Self {
        Self {
            families: BTreeMap::new(),
            default,
        }
    }

    pub fn with_family(mut self, family: &str, template: JobTemplate) -> Self {
        self.families.insert(family.to_ascii_lowercase(), template);
        self
    }

    /// Load a policy from a JSON file of the form
    /// `{"families": {"debian": {"1": "cmd"}}, "default": {}}`.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(raw)
            .map_err(|e| RollcallError::Internal(format!("invalid templates: {}", e)))?;
        // Family keys match case-insensitively.
        let families = parsed
            .families
            .into_iter()
            .map(|(family, template)| (family.to_ascii_lowercase(), template))
            .collect();
        Ok(Self {
            families,
            default: parsed.default,
        })
    }

    pub fn template_for_family(&self, family: Option<&str>) -> &JobTemplate {
        family
            .and_then(|f| self.families.get(&f.to_ascii_lowercase()))
            .unwrap_or(&self.default)
    }

    /// Template for a raw `sysinfo` blob as sent on `register`.
    pub fn jobs_for(&self, facts_blob: Option<&str>) -> &JobTemplate {
        let family = facts_blob
            .and_then(HostFacts::parse)
            .and_then(|facts| facts.os_family());
        self.template_for_family(family.as_deref())
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(String::as_str)
    }
}
