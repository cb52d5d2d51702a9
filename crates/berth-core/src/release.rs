//! Release information exposed to templates

use serde::{Deserialize, Serialize};

/// Release information for templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    /// Is this an install operation?
    pub is_install: bool,

    /// Is this an upgrade operation?
    pub is_upgrade: bool,

    /// Service (always "Berth")
    pub service: String,
}

impl ReleaseInfo {
    /// Create release info for a new install
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: "Berth".to_string(),
        }
    }

    /// Create release info for an upgrade
    pub fn for_upgrade(name: &str, namespace: &str, revision: u32) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision,
            is_install: false,
            is_upgrade: true,
            service: "Berth".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_and_upgrade_flags() {
        let install = ReleaseInfo::for_install("chart-api1", "games");
        assert_eq!(install.revision, 1);
        assert!(install.is_install && !install.is_upgrade);

        let upgrade = ReleaseInfo::for_upgrade("chart-api1", "games", 4);
        assert_eq!(upgrade.revision, 4);
        assert!(upgrade.is_upgrade && !upgrade.is_install);
    }

    #[test]
    fn test_camel_case_keys() {
        let json = serde_json::to_value(ReleaseInfo::for_install("a", "b")).unwrap();
        assert_eq!(json["isInstall"], true);
        assert_eq!(json["service"], "Berth");
    }
}
