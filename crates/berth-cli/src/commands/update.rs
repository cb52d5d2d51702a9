//! Update command - move a release to a new image version

use berth_image::DockerHost;
use console::style;

use super::{Session, resolve_release};
use crate::deploy::{Deployer, UpdateRequest};
use crate::error::Result;

/// Run the update command
pub async fn run(session: &Session, name: Option<String>, request: UpdateRequest) -> Result<()> {
    let chart = session.chart()?;
    let client = session.client().await?;
    let name = resolve_release(&client, &chart.namespace, name).await?;

    match request.reinstall {
        Some(archetype) => println!(
            "{} Re-installing {} as {} {}",
            style("→").blue().bold(),
            style(&name).cyan(),
            style(archetype).cyan(),
            style(&request.version).cyan()
        ),
        None => println!(
            "{} Updating {} to {}",
            style("→").blue().bold(),
            style(&name).cyan(),
            style(&request.version).cyan()
        ),
    }

    let host = DockerHost::new();
    let deployer = Deployer::new(&client, &host, &session.config, chart, &session.config_path);
    let release = deployer.update(&name, &request).await?;

    println!(
        "{} Release {} deployed at {} (revision {})",
        style("✓").green().bold(),
        style(&release.name).cyan(),
        style(&release.version).cyan(),
        release.revision
    );

    Ok(())
}
