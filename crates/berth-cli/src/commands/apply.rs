//! Apply command - build (optionally) and install a release

use berth_image::DockerHost;
use console::style;

use super::Session;
use crate::deploy::{ApplyRequest, Deployer};
use crate::error::Result;

/// Run the apply command
pub async fn run(session: &Session, request: ApplyRequest) -> Result<()> {
    let chart = session.chart()?;
    let name = request.release_name(chart);

    println!(
        "{} Applying {} {} as {} in namespace {}",
        style("→").blue().bold(),
        style(request.archetype).cyan(),
        style(&request.version).cyan(),
        style(&name).cyan(),
        style(&chart.namespace).yellow()
    );
    if let Some(dockerfile) = &request.dockerfile {
        println!(
            "  Building image from {}",
            style(dockerfile.display()).dim()
        );
    }

    let client = session.client().await?;
    let host = DockerHost::new();
    let deployer = Deployer::new(&client, &host, &session.config, chart, &session.config_path);
    let release = deployer.apply(&request).await?;

    println!(
        "{} Release {} deployed (revision {})",
        style("✓").green().bold(),
        style(&release.name).cyan(),
        release.revision
    );
    if let Some(notes) = &release.notes {
        println!();
        println!("{}", notes.trim_end());
    }

    Ok(())
}
