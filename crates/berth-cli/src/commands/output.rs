//! Output command - write a release's manifests and values to disk

use console::style;
use std::path::Path;

use super::{Session, resolve_release};
use crate::error::Result;

/// Run the output command
pub async fn run(session: &Session, path: &Path, name: Option<String>) -> Result<()> {
    let chart = session.chart()?;
    let client = session.client().await?;
    let name = resolve_release(&client, &chart.namespace, name).await?;

    let target = client.output(&name, &chart.namespace, path).await?;

    println!(
        "{} Wrote {} to {}",
        style("✓").green().bold(),
        style(&name).cyan(),
        target.display()
    );

    Ok(())
}
