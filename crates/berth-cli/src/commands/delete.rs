//! Delete command - remove a release from the cluster

use console::style;

use super::{Session, resolve_release};
use crate::error::Result;

/// Run the delete command
pub async fn run(session: &Session, name: Option<String>) -> Result<()> {
    let chart = session.chart()?;
    let client = session.client().await?;
    let name = resolve_release(&client, &chart.namespace, name).await?;

    println!(
        "{} Deleting release {} from namespace {}",
        style("→").blue().bold(),
        style(&name).cyan(),
        style(&chart.namespace).yellow()
    );

    let release = client.uninstall(&name, &chart.namespace).await?;

    println!(
        "{} Release {} deleted",
        style("✓").green().bold(),
        style(&release.name).cyan()
    );

    Ok(())
}
