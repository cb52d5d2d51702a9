//! Numbered release listings for interactive selection
//!
//! A [`ReleaseListing`] is taken once per command and owned by it. Ordinals
//! are 1-based and only mean something for the listing that printed them.

use berth_core::Archetype;
use chrono::{DateTime, Utc};
use console::style;
use std::io::Write;
use std::num::IntErrorKind;
use thiserror::Error;

use crate::release::StoredRelease;

/// Bad input while picking a release from a listing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("'{token}' is not a release number")]
    Parse { token: String },

    #[error("release number {index} is out of range (1-{len})")]
    OutOfRange { index: String, len: usize },

    #[error("no releases to select from")]
    Empty,
}

/// One row of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSummary {
    pub name: String,
    pub namespace: String,
    pub version: String,
    pub archetype: Archetype,
    pub revision: u32,
    pub status: &'static str,
    pub updated_at: DateTime<Utc>,
}

impl From<&StoredRelease> for ReleaseSummary {
    fn from(release: &StoredRelease) -> Self {
        Self {
            name: release.name.clone(),
            namespace: release.namespace.clone(),
            version: release.version.clone(),
            archetype: release.archetype,
            revision: release.revision,
            status: release.state.status_name(),
            updated_at: release.updated_at,
        }
    }
}

/// Releases in a stable order, addressable by ordinal
#[derive(Debug, Clone, Default)]
pub struct ReleaseListing {
    releases: Vec<ReleaseSummary>,
}

impl ReleaseListing {
    /// Build a listing ordered by release name
    pub fn new<'a>(releases: impl IntoIterator<Item = &'a StoredRelease>) -> Self {
        let mut releases: Vec<ReleaseSummary> = releases.into_iter().map(Into::into).collect();
        releases.sort_by(|a, b| a.name.cmp(&b.name).then(a.namespace.cmp(&b.namespace)));
        Self { releases }
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Rows with their 1-based ordinals
    pub fn entries(&self) -> impl Iterator<Item = (usize, &ReleaseSummary)> {
        self.releases.iter().enumerate().map(|(i, r)| (i + 1, r))
    }

    /// Write the listing as a table
    pub fn print<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(
            out,
            "{:<4} {:<28} {:<12} {:<6} {:<9} {:<18} {:<20}",
            style("#").bold(),
            style("NAME").bold(),
            style("VERSION").bold(),
            style("TYPE").bold(),
            style("REVISION").bold(),
            style("STATUS").bold(),
            style("UPDATED").bold()
        )?;

        for (ordinal, release) in self.entries() {
            let status = match release.status {
                "deployed" => style(release.status).green(),
                "failed" => style(release.status).red(),
                s if s.starts_with("pending") => style(release.status).yellow(),
                _ => style(release.status).dim(),
            };

            writeln!(
                out,
                "{:<4} {:<28} {:<12} {:<6} {:<9} {:<18} {:<20}",
                ordinal,
                release.name,
                release.version,
                release.archetype,
                release.revision,
                status,
                release.updated_at.format("%Y-%m-%d %H:%M:%S")
            )?;
        }

        Ok(())
    }

    /// Map a user-typed ordinal to the release printed at that position
    pub fn resolve(&self, token: &str) -> Result<&ReleaseSummary, SelectionError> {
        let token = token.trim();
        let out_of_range = || SelectionError::OutOfRange {
            index: token.to_string(),
            len: self.releases.len(),
        };

        let index = match token.parse::<usize>() {
            Ok(index) => index,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => return Err(out_of_range()),
            Err(_) if is_negative_integer(token) => return Err(out_of_range()),
            Err(_) => {
                return Err(SelectionError::Parse {
                    token: token.to_string(),
                });
            }
        };

        match index.checked_sub(1).and_then(|i| self.releases.get(i)) {
            Some(release) => Ok(release),
            None => Err(out_of_range()),
        }
    }
}

fn is_negative_integer(token: &str) -> bool {
    token
        .strip_prefix('-')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::test_support::release;

    fn listing() -> ReleaseListing {
        let releases = vec![
            release("chart-host200", "default"),
            release("chart-api110", "default"),
            release("chart-api100", "default"),
        ];
        ReleaseListing::new(&releases)
    }

    #[test]
    fn test_listing_sorted_by_name() {
        let listing = listing();
        let names: Vec<&str> = listing.entries().map(|(_, r)| r.name.as_str()).collect();
        assert_eq!(names, vec!["chart-api100", "chart-api110", "chart-host200"]);
    }

    #[test]
    fn test_resolve_matches_printed_position() {
        let listing = listing();
        let mut out = Vec::new();
        listing.print(&mut out).unwrap();
        let printed = String::from_utf8(out).unwrap();

        for (ordinal, summary) in listing.entries() {
            let row = printed
                .lines()
                .find(|l| l.starts_with(&format!("{:<4} ", ordinal)))
                .unwrap();
            assert!(row.contains(&summary.name));
            assert_eq!(listing.resolve(&ordinal.to_string()).unwrap(), summary);
        }
    }

    #[test]
    fn test_resolve_trims_whitespace() {
        assert_eq!(listing().resolve(" 2\n").unwrap().name, "chart-api110");
    }

    #[test]
    fn test_resolve_errors() {
        let listing = listing();

        assert_eq!(
            listing.resolve("two"),
            Err(SelectionError::Parse {
                token: "two".to_string()
            })
        );
        assert_eq!(
            listing.resolve("0"),
            Err(SelectionError::OutOfRange {
                index: "0".to_string(),
                len: 3
            })
        );
        assert_eq!(
            listing.resolve("4"),
            Err(SelectionError::OutOfRange {
                index: "4".to_string(),
                len: 3
            })
        );
        assert!(matches!(listing.resolve("-1"), Err(SelectionError::OutOfRange { .. })));
        assert!(matches!(listing.resolve("-"), Err(SelectionError::Parse { .. })));
    }

    #[test]
    fn test_resolve_huge_ordinals() {
        let listing = listing();
        let huge = "18446744073709551617";

        assert_eq!(
            listing.resolve(huge),
            Err(SelectionError::OutOfRange {
                index: huge.to_string(),
                len: 3
            })
        );
        assert!(matches!(
            listing.resolve("-99999999999999999999"),
            Err(SelectionError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_listing() {
        let listing = ReleaseListing::default();
        assert!(listing.is_empty());
        assert_eq!(
            listing.resolve("1"),
            Err(SelectionError::OutOfRange {
                index: "1".to_string(),
                len: 0
            })
        );
    }
}
