//! Stored release records and their state machine

use berth_core::{Archetype, ChartMetadata, Values};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How long a pending record blocks other calls before it counts as stale
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::minutes(5);

/// Chart a release was rendered from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    /// Chart metadata at deploy time
    pub metadata: ChartMetadata,

    /// Chart directory, used again when only the version changes
    pub path: PathBuf,
}

/// A stored release revision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRelease {
    /// Release name
    pub name: String,

    /// Kubernetes namespace
    pub namespace: String,

    /// Starts at 1; every upgrade of the same name adds one
    pub revision: u32,

    /// Image / application version tag
    pub version: String,

    /// Service archetype
    pub archetype: Archetype,

    /// Lifecycle state
    pub state: ReleaseState,

    /// Chart this revision was rendered from
    pub chart: ChartRef,

    /// Values document as submitted
    pub values: Values,

    /// Rendered manifests by template file name
    #[serde(default)]
    pub manifests: BTreeMap<String, String>,

    /// Rendered `NOTES.txt`
    #[serde(default)]
    pub notes: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Fields shared by every new revision
#[derive(Debug, Clone)]
pub struct ReleaseSpec {
    pub version: String,
    pub archetype: Archetype,
    pub chart: ChartRef,
    pub values: Values,
    pub manifests: BTreeMap<String, String>,
    pub notes: Option<String>,
}

impl StoredRelease {
    /// Revision 1 of a new release, pending install
    pub fn for_install(name: String, namespace: String, spec: ReleaseSpec) -> Self {
        let now = Utc::now();
        Self {
            name,
            namespace,
            revision: 1,
            version: spec.version,
            archetype: spec.archetype,
            state: ReleaseState::PendingInstall {
                started_at: now,
                timeout: DEFAULT_OPERATION_TIMEOUT,
            },
            chart: spec.chart,
            values: spec.values,
            manifests: spec.manifests,
            notes: spec.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// The revision after `previous`, pending upgrade
    pub fn for_upgrade(previous: &StoredRelease, spec: ReleaseSpec) -> Self {
        let now = Utc::now();
        Self {
            name: previous.name.clone(),
            namespace: previous.namespace.clone(),
            revision: previous.revision + 1,
            version: spec.version,
            archetype: spec.archetype,
            state: ReleaseState::PendingUpgrade {
                started_at: now,
                timeout: DEFAULT_OPERATION_TIMEOUT,
                previous_revision: previous.revision,
            },
            chart: spec.chart,
            values: spec.values,
            manifests: spec.manifests,
            notes: spec.notes,
            created_at: previous.created_at,
            updated_at: now,
        }
    }

    /// Storage key for this revision
    pub fn storage_key(&self) -> String {
        format!("sh.berth.release.v1.{}.v{}", self.name, self.revision)
    }

    /// All manifests joined into one multi-document YAML stream
    pub fn manifest(&self) -> String {
        self.manifests
            .iter()
            .map(|(name, body)| format!("# Source: {}\n{}", name, body.trim_end()))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }

    pub fn mark_deployed(&mut self) {
        self.state = ReleaseState::Deployed;
        self.updated_at = Utc::now();
    }

    /// Record why the last call failed
    pub fn mark_failed(&mut self, reason: String) {
        self.state = ReleaseState::Failed {
            reason,
            failed_at: Utc::now(),
        };
        self.updated_at = Utc::now();
    }

    /// Mark the release as superseded (replaced by a newer revision)
    pub fn mark_superseded(&mut self) {
        self.state = ReleaseState::Superseded;
        self.updated_at = Utc::now();
    }

    /// Mark the release as being uninstalled
    pub fn mark_uninstalling(&mut self) {
        let now = Utc::now();
        self.state = ReleaseState::PendingUninstall {
            started_at: now,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        };
        self.updated_at = now;
    }
}

/// Where a revision is in its lifecycle
///
/// Pending states carry their start time so a record left behind by a dead
/// process can be recognised and taken over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ReleaseState {
    /// Successfully deployed
    Deployed,

    /// Deployment failed
    Failed {
        reason: String,
        failed_at: DateTime<Utc>,
    },

    /// Replaced by a newer revision
    Superseded,

    /// Installation in progress
    PendingInstall {
        started_at: DateTime<Utc>,
        #[serde(with = "duration_serde")]
        timeout: Duration,
    },

    /// Upgrade in progress
    PendingUpgrade {
        started_at: DateTime<Utc>,
        #[serde(with = "duration_serde")]
        timeout: Duration,
        previous_revision: u32,
    },

    /// Uninstallation in progress
    PendingUninstall {
        started_at: DateTime<Utc>,
        #[serde(with = "duration_serde")]
        timeout: Duration,
    },
}

impl ReleaseState {
    /// A call is (or was) working on this revision
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingInstall { .. } | Self::PendingUpgrade { .. } | Self::PendingUninstall { .. }
        )
    }

    /// Check if this pending state has timed out
    ///
    /// A stale pending record was left behind by a process that died mid-call.
    pub fn is_stale(&self) -> bool {
        let now = Utc::now();
        match self {
            Self::PendingInstall { started_at, timeout }
            | Self::PendingUpgrade { started_at, timeout, .. }
            | Self::PendingUninstall { started_at, timeout } => {
                now.signed_duration_since(*started_at) > *timeout
            }
            _ => false,
        }
    }

    /// Name shown in listings
    pub fn status_name(&self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::Failed { .. } => "failed",
            Self::Superseded => "superseded",
            Self::PendingInstall { .. } => "pending-install",
            Self::PendingUpgrade { .. } => "pending-upgrade",
            Self::PendingUninstall { .. } => "pending-uninstall",
        }
    }
}

impl std::fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { reason, .. } => write!(f, "failed: {}", reason),
            other => write!(f, "{}", other.status_name()),
        }
    }
}

/// Durations are stored as whole seconds
mod duration_serde {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.num_seconds().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(seconds))
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_release_state_stale_detection() {
        let state = ReleaseState::PendingInstall {
            started_at: Utc::now() - Duration::minutes(10),
            timeout: Duration::minutes(5),
        };
        assert!(state.is_stale());

        let fresh = ReleaseState::PendingInstall {
            started_at: Utc::now(),
            timeout: Duration::minutes(5),
        };
        assert!(!fresh.is_stale());
        assert!(fresh.is_pending());
        assert!(!ReleaseState::Deployed.is_pending());
    }

    #[test]
    fn test_storage_key() {
        let release = release("chart-api100", "default");
        assert_eq!(release.storage_key(), "sh.berth.release.v1.chart-api100.v1");
    }

    #[test]
    fn test_upgrade_increments_revision() {
        let first = release("chart-api100", "games");
        let second = StoredRelease::for_upgrade(&first, spec("1.0.1"));

        assert_eq!(second.revision, 2);
        assert_eq!(second.version, "1.0.1");
        assert_eq!(second.created_at, first.created_at);
        assert!(matches!(
            second.state,
            ReleaseState::PendingUpgrade { previous_revision: 1, .. }
        ));
    }

    #[test]
    fn test_state_serialization() {
        let mut release = release("a", "b");
        release.mark_failed("boom".to_string());

        let json = serde_json::to_value(&release).unwrap();
        assert_eq!(json["state"]["status"], "failed");
        assert_eq!(json["archetype"], "api");

        let back: StoredRelease = serde_json::from_value(json).unwrap();
        assert!(matches!(back.state, ReleaseState::Failed { reason, .. } if reason == "boom"));
    }

    #[test]
    fn test_manifest_stream() {
        let mut release = release("a", "b");
        release
            .manifests
            .insert("service.yaml".to_string(), "kind: Service\n".to_string());

        let stream = release.manifest();
        assert!(stream.starts_with("# Source: configmap.yaml\n"));
        assert!(stream.contains("\n---\n# Source: service.yaml\nkind: Service"));
    }
}
