//! Stop command - ask the training server to stop a job.

use tracing::{info, warn};
use trainwatch::client::{ClientError, TrainingClient};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the stop command.
pub struct StopArgs {
    pub job_id: String,
    pub server: Option<String>,
    pub debug: bool,
}

/// Run the stop command.
pub async fn run(args: StopArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("stop");

    let client = runner.create_client(args.server.as_deref())?;
    let timeout = runner.config().monitor_config().stop_timeout;

    let result = tokio::time::timeout(timeout, client.stop_job(&args.job_id))
        .await
        .unwrap_or_else(|_| {
            Err(ClientError::Transport(format!(
                "no response within {}s",
                timeout.as_secs()
            )))
        });

    match result {
        Ok(()) => {
            info!(job_id = %args.job_id, "Stop requested");
            println!("Stop requested for job {}", args.job_id);
            Ok(())
        }
        Err(e) => {
            warn!(job_id = %args.job_id, error = %e, "Stop request failed");
            Err(e.into())
        }
    }
}
