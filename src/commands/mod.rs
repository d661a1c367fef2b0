// ABOUTME: Command module aggregator for the mtadeploy CLI.
// ABOUTME: Re-exports the deploy, rollback, and digest command handlers.

mod deploy;
mod digest;
mod rollback;

pub use deploy::deploy;
pub use digest::digest;
pub use rollback::rollback;

use mtadeploy::error::{Error, Result};
use mtadeploy::output::Output;
use mtadeploy::process::ProcessReport;

/// Print the warnings of a run, then its result.
fn report(report: ProcessReport, output: &Output, success: &str) -> Result<()> {
    if report.resumed {
        output.progress(&format!("Resumed unfinished run {}", report.process_id));
    }
    for warning in &report.warnings {
        output.warning(&warning.message);
    }
    if report.outcome.is_done() {
        output.success(success);
        Ok(())
    } else {
        let message = report
            .outcome
            .error_message()
            .unwrap_or_else(|| format!("run {} failed", report.process_id));
        Err(Error::RunFailed(message))
    }
}

/// Cancel the run on Ctrl-C; the runner releases resources and stops.
fn cancel_on_interrupt(cancel: tokio_util::sync::CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, aborting run");
            cancel.cancel();
        }
    });
}
