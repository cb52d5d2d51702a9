//! List command - show the current chart's releases

use berth_kube::ReleaseListing;
use console::style;
use std::io;

use super::Session;
use crate::error::Result;

/// Run the list command
pub async fn run(session: &Session) -> Result<()> {
    let chart = session.chart()?;
    let client = session.client().await?;
    let releases = client.list(&chart.namespace).await?;

    if releases.is_empty() {
        println!(
            "No releases found in namespace {}",
            style(&chart.namespace).yellow()
        );
        return Ok(());
    }

    ReleaseListing::new(&releases).print(&mut io::stdout().lock())?;
    Ok(())
}
