use sysinfo::System;

use crate::protocol::{HostFacts, OsInfo};

/// Gather this host's facts for registration.
pub fn collect() -> HostFacts {
    let platform = System::distribution_id();
    let family = os_family(std::env::consts::OS, &platform);

    HostFacts {
        architecture: std::env::consts::ARCH.to_string(),
        name: System::host_name().unwrap_or_default(),
        kernel_version: System::kernel_version().unwrap_or_default(),
        os: OsInfo {
            family,
            platform,
            name: System::name().unwrap_or_default(),
            version: System::os_version().unwrap_or_default(),
        },
    }
}

/// Map an OS and distribution id onto the family names the coordinator
/// keys templates on. Derivatives report their parent, so ubuntu hosts
/// report `debian`.
pub fn os_family(os: &str, distribution: &str) -> String {
    let distribution = distribution.trim().to_ascii_lowercase();

    match os {
        "linux" => {}
        "macos" => return "darwin".to_string(),
        other => return other.to_string(),
    }

    let family = match distribution.as_str() {
        "debian" | "ubuntu" | "raspbian" | "linuxmint" | "pop" | "kali" | "elementary"
        | "devuan" | "zorin" => "debian",
        "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "ol" | "amzn" | "scientific"
        | "cloudlinux" => "redhat",
        "sles" | "sled" | "suse" => "suse",
        d if d.starts_with("opensuse") => "suse",
        "arch" | "manjaro" | "endeavouros" | "garuda" => "arch",
        "" => "linux",
        d => d,
    };
    family.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debian_derivatives_map_to_debian() {
        for distro in ["debian", "ubuntu", "Raspbian", "linuxmint"] {
            assert_eq!(os_family("linux", distro), "debian");
        }
    }

    #[test]
    fn redhat_and_suse_families() {
        assert_eq!(os_family("linux", "centos"), "redhat");
        assert_eq!(os_family("linux", "fedora"), "redhat");
        assert_eq!(os_family("linux", "opensuse-leap"), "suse");
    }

    #[test]
    fn non_linux_uses_os() {
        assert_eq!(os_family("macos", ""), "darwin");
        assert_eq!(os_family("windows", "windows"), "windows");
        assert_eq!(os_family("freebsd", ""), "freebsd");
    }

    #[test]
    fn unknown_distribution_passes_through() {
        assert_eq!(os_family("linux", "alpine"), "alpine");
        assert_eq!(os_family("linux", ""), "linux");
    }

    #[test]
    fn collected_facts_are_populated() {
        let facts = collect();
        assert!(!facts.architecture.is_empty());
        assert!(facts.os_family().is_some());
    }
}
