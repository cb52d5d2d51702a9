//! Interactive release selection

use berth_kube::{ReleaseListing, ReleaseSummary, SelectionError};
use std::io::{BufRead, Write};

use crate::error::Result;

/// Print `listing`, ask for a number and return the chosen release
///
/// An empty listing fails before anything is read.
pub fn prompt_selection<'a, R, W>(listing: &'a ReleaseListing, mut reader: R, mut writer: W) -> Result<&'a ReleaseSummary>
where
    R: BufRead,
    W: Write,
{
    if listing.is_empty() {
        return Err(SelectionError::Empty.into());
    }

    listing.print(&mut writer)?;
    write!(writer, "Select: ")?;
    writer.flush()?;

    let mut line = String::new();
    reader.read_line(&mut line)?;

    Ok(listing.resolve(&line)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use berth_core::{Archetype, Values};
    use berth_kube::{ChartRef, ReleaseSpec, StoredRelease};
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn release(name: &str) -> StoredRelease {
        let spec = ReleaseSpec {
            version: "1.0".to_string(),
            archetype: Archetype::Api,
            chart: ChartRef {
                metadata: serde_yaml::from_str("name: chart\nversion: 1.0.0\n").unwrap(),
                path: PathBuf::from("charts/api"),
            },
            values: Values::default(),
            manifests: BTreeMap::new(),
            notes: None,
        };
        StoredRelease::for_install(name.to_string(), "default".to_string(), spec)
    }

    fn listing() -> ReleaseListing {
        let releases = vec![release("chart-host10"), release("chart-api10")];
        ReleaseListing::new(&releases)
    }

    #[test]
    fn test_prompt_returns_chosen_release() {
        let listing = listing();
        let mut out = Vec::new();

        let chosen = prompt_selection(&listing, Cursor::new("2\n"), &mut out).unwrap();
        assert_eq!(chosen.name, "chart-host10");

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("chart-api10"));
        assert!(printed.ends_with("Select: "));
    }

    #[test]
    fn test_prompt_rejects_bad_input() {
        let listing = listing();
        let result = prompt_selection(&listing, Cursor::new("two\n"), Vec::new());
        assert!(matches!(
            result,
            Err(CliError::Selection(SelectionError::Parse { .. }))
        ));
    }

    #[test]
    fn test_empty_listing_reads_nothing() {
        let listing = ReleaseListing::default();
        let mut input = Cursor::new("1\n");

        let result = prompt_selection(&listing, &mut input, Vec::new());
        assert!(matches!(result, Err(CliError::Selection(SelectionError::Empty))));
        assert_eq!(input.position(), 0);
    }
}
