//! Watch command - monitor a training job until it finishes.
//!
//! Prints one line per status change. Ctrl-C stops monitoring and asks the
//! server to stop the job.

use chrono::Local;
use tracing::info;
use trainwatch::monitor::{DownloadSnapshot, LifecycleController, StatusReport, UnifiedStatus};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the watch command.
pub struct WatchArgs {
    pub job_id: String,
    pub server: Option<String>,
    pub debug: bool,
}

/// Run the watch command.
pub async fn run(args: WatchArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("watch");

    let client = runner.create_client(args.server.as_deref())?;
    println!("Watching job {} on {}", args.job_id, client.base_url());

    let mut controller = LifecycleController::new(client, runner.config().monitor_config());
    let mut status = controller.subscribe();
    controller.start(args.job_id.as_str()).await;

    let last = loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break controller.report();
                }
                let report = status.borrow_and_update().clone();
                println!("[{}] {}", Local::now().format("%H:%M:%S"), format_report(&report));
                if report.status.is_terminal() {
                    break report;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Interrupted, stopping job {}...", args.job_id);
                controller.stop().await;
                break controller.report();
            }
        }
    };

    // Joins the session tasks; no remote call once the job is terminal
    controller.stop().await;
    info!(job_id = %args.job_id, status = %last.status, "Watch finished");

    match last.status {
        UnifiedStatus::Failed(message) => Err(CliError::JobFailed(message)),
        UnifiedStatus::ConnectivityLost => Err(CliError::ConnectivityLost),
        UnifiedStatus::Stopped => {
            println!("Stopped.");
            Ok(())
        }
        _ => {
            if let Some(checkpoints) = &last.checkpoints {
                println!("Checkpoints:");
                for checkpoint in checkpoints {
                    match &checkpoint.path {
                        Some(path) => println!("  {} ({})", checkpoint.name, path),
                        None => println!("  {}", checkpoint.name),
                    }
                }
            }
            Ok(())
        }
    }
}

/// One status line.
fn format_report(report: &StatusReport) -> String {
    match (&report.status, &report.download) {
        (UnifiedStatus::DownloadingModel, Some(download)) => {
            format!("Downloading model{}", format_download(download))
        }
        (status, _) => status.to_string(),
    }
}

fn format_download(download: &DownloadSnapshot) -> String {
    let mut parts = Vec::new();
    if let Some(fraction) = download.fraction() {
        parts.push(format!("{:.0}%", fraction * 100.0));
    }
    if let (Some(done), Some(total)) = (download.files_done, download.files_total) {
        parts.push(format!("{}/{} files", done, total));
    }
    if let Some(speed) = download.speed_bytes_per_sec {
        parts.push(format!("{:.1} MB/s", speed / 1_048_576.0));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trainwatch::monitor::ProgressSnapshot;

    #[test]
    fn test_format_download_line() {
        let report = StatusReport {
            status: UnifiedStatus::DownloadingModel,
            download: Some(DownloadSnapshot {
                is_active: true,
                bytes_done: Some(512),
                bytes_total: Some(1024),
                files_done: Some(3),
                files_total: Some(10),
                speed_bytes_per_sec: Some(2.0 * 1_048_576.0),
                eta_seconds: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            format_report(&report),
            "Downloading model (50%, 3/10 files, 2.0 MB/s)"
        );
    }

    #[test]
    fn test_format_download_without_counts() {
        let report = StatusReport {
            status: UnifiedStatus::DownloadingModel,
            download: Some(DownloadSnapshot::active()),
            ..Default::default()
        };
        assert_eq!(format_report(&report), "Downloading model");
    }

    #[test]
    fn test_format_training_line() {
        let mut progress = ProgressSnapshot::running(0.42);
        progress.steps_done = 42;
        progress.steps_total = 100;
        let report = StatusReport {
            status: UnifiedStatus::Training(progress),
            ..Default::default()
        };
        assert_eq!(format_report(&report), "Training 42% (step 42/100)");
    }
}
