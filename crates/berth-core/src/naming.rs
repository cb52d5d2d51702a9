//! Release name derivation

use crate::archetype::Archetype;

/// Derive the implicit release name for a chart, archetype and version
///
/// Every `.` is stripped from the version: `("chart", api, "1.2.3")` gives
/// `chart-api123`. Distinct versions can collide (`1.23` and `12.3`), and the
/// result is not checked against Kubernetes name rules.
pub fn generate_name(base: &str, archetype: Archetype, version: &str) -> String {
    let version: String = version.chars().filter(|c| *c != '.').collect();
    format!("{}-{}{}", base, archetype.as_str(), version)
}
