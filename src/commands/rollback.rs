// ABOUTME: Rollback command implementation.
// ABOUTME: Restores the backup MTA under its original application names.

use mtadeploy::config::Config;
use mtadeploy::context::variables::ProcessType;
use mtadeploy::error::Result;
use mtadeploy::output::Output;
use mtadeploy::process::{ProcessOptions, run_process};

use super::{cancel_on_interrupt, report};

/// Swap the deployed MTA for its backup.
pub async fn rollback(config: Config, force: bool, mut output: Output) -> Result<()> {
    output.start_timer();
    output.progress(&format!("Rolling back in space {}", config.space));

    let options = ProcessOptions {
        force,
        ..ProcessOptions::default()
    };
    cancel_on_interrupt(options.cancel.clone());

    let result = run_process(&config, ProcessType::Rollback, options).await?;
    report(result, &output, "Rollback complete!")
}
