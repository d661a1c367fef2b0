// ABOUTME: Deploy command implementation.
// ABOUTME: Runs the deployment pipeline and reports warnings and the final state.

use mtadeploy::config::{ArchiveSource, Config};
use mtadeploy::context::variables::ProcessType;
use mtadeploy::error::Result;
use mtadeploy::output::Output;
use mtadeploy::process::{ProcessOptions, run_process};

use super::{cancel_on_interrupt, report};

/// Deploy the configured archive to the configured space.
pub async fn deploy(config: Config, force: bool, mut output: Output) -> Result<()> {
    output.start_timer();
    let archive = match &config.archive {
        ArchiveSource::Path(path) => path.display().to_string(),
        ArchiveSource::Url(url) => url.clone(),
    };
    output.progress(&format!("Deploying {archive} to space {}", config.space));

    let options = ProcessOptions {
        force,
        ..ProcessOptions::default()
    };
    cancel_on_interrupt(options.cancel.clone());

    let result = run_process(&config, ProcessType::Deploy, options).await?;
    report(result, &output, "Deployment complete!")
}
