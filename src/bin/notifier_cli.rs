// src/bin/notifier_cli.rs

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use prettytable::{row, Table};
use std::sync::Arc;
use std::time::Duration;
use structopt::StructOpt;
use tracing::{error, info, warn};

use resilient_notifier::heartbeat::{HeartbeatMonitor, HeartbeatOutcome};
use resilient_notifier::logging;
use resilient_notifier::{Notification, NotificationService, NotifierConfig};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "notifier_cli",
    about = "Operate the multi-channel notification service"
)]
struct Opt {
    /// Verbosity level
    #[structopt(short, long, parse(from_occurrences), global = true)]
    verbose: usize,

    /// Emit logs as JSON lines
    #[structopt(long, global = true)]
    json_logs: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Deliver one notification through the failover chain
    Send {
        #[structopt(short, long)]
        subject: String,

        #[structopt(short, long)]
        body: String,

        /// Optional HTML rendering of the body
        #[structopt(long)]
        html: Option<String>,

        #[structopt(short, long)]
        urgent: bool,

        /// Give up after this many seconds across all channels
        #[structopt(long)]
        timeout_secs: Option<u64>,
    },
    /// Send a status report if the last one is older than the interval
    Heartbeat {
        /// Ignore the interval and send now
        #[structopt(long)]
        force: bool,
    },
    /// Resubmit stored undelivered notifications
    Replay {
        /// Override the configured retry limit
        #[structopt(long)]
        max_retries: Option<u32>,
    },
    /// Show channel health and the undelivered queue
    Status,
    /// Run heartbeat and replay on an interval until Ctrl-C
    Watch {
        #[structopt(long, default_value = "300")]
        every_secs: u64,
    },
    /// Mark a channel unavailable
    Disable { channel: String },
    /// Mark a channel available again
    Enable { channel: String },
}

fn init_tracing(opt: &Opt) {
    if opt.json_logs {
        logging::init_json();
        return;
    }

    let log_level = match opt.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    logging::init_with(&format!(
        "notifier_cli={},resilient_notifier={}",
        log_level, log_level
    ));
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Parse command line arguments
    let opt = Opt::from_args();
    init_tracing(&opt);

    let config = NotifierConfig::from_env()?;
    let service = Arc::new(NotificationService::from_config(config).await?);

    let ok = match opt.command {
        Command::Send {
            subject,
            body,
            html,
            urgent,
            timeout_secs,
        } => {
            let mut notification = Notification::new(subject, body).urgent(urgent);
            if let Some(html) = html {
                notification = notification.with_html(html);
            }
            let delivered = match timeout_secs {
                Some(secs) => {
                    service
                        .send_within(&notification, Duration::from_secs(secs))
                        .await
                }
                None => service.send_notification(&notification).await,
            };
            if delivered {
                info!("Notification delivered");
            } else {
                error!("Notification could not be delivered, stored for replay");
            }
            delivered
        }
        Command::Heartbeat { force } => {
            let outcome = if force {
                HeartbeatMonitor::new(Arc::clone(service.orchestrator()))
                    .maybe_send_heartbeat(Utc::now(), Duration::ZERO)
                    .await
            } else {
                service.maybe_send_heartbeat().await
            };
            println!("Heartbeat: {:?}", outcome);
            outcome != HeartbeatOutcome::Failed
        }
        Command::Replay { max_retries } => {
            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(Duration::from_millis(120));
            pb.set_style(ProgressStyle::with_template("{spinner:.blue} {msg}")?);
            pb.set_message("Replaying undelivered notifications...");

            let max_retries = max_retries.unwrap_or(service.config().replay.max_retries);
            let summary = service
                .replay_with(max_retries, service.config().replay.pause)
                .await;

            pb.finish_with_message(format!(
                "Replayed {} of {}: {} delivered, {} failed, {} at retry limit",
                summary.delivered + summary.failed,
                summary.total,
                summary.delivered,
                summary.failed,
                summary.skipped
            ));
            summary.failed == 0
        }
        Command::Status => {
            print_status(&service).await?;
            true
        }
        Command::Watch { every_secs } => {
            watch(&service, Duration::from_secs(every_secs)).await?;
            true
        }
        Command::Disable { channel } => service.disable_channel(&channel).await,
        Command::Enable { channel } => service.enable_channel(&channel).await,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

async fn print_status(service: &NotificationService) -> Result<(), Box<dyn std::error::Error>> {
    let status = service.status().await;
    let now = Utc::now();

    let mut table = Table::new();
    table.add_row(row!["Channel", "Available", "Failures", "Last success"]);
    for channel in service.orchestrator().health().priority() {
        let health = status.channel(channel).cloned().unwrap_or_default();
        let last_success = match health.last_success {
            Some(ts) => format!(
                "{} ({} min ago)",
                ts.format("%Y-%m-%d %H:%M:%S"),
                now.signed_duration_since(ts).num_minutes()
            ),
            None => "never".to_string(),
        };
        table.add_row(row![
            channel,
            if health.available { "yes" } else { "no" },
            health.consecutive_failures,
            last_success
        ]);
    }
    table.printstd();

    let records = service.undelivered_records().await?;
    println!(
        "Undelivered: {} stored, {} lifetime",
        records.len(),
        status.undelivered_count
    );
    if !records.is_empty() {
        let mut queue = Table::new();
        queue.add_row(row!["Id", "Created", "Retries", "Subject"]);
        for (id, record) in &records {
            queue.add_row(row![
                id,
                record.created_at.format("%Y-%m-%d %H:%M:%S"),
                record.retry_count,
                record.notification.subject
            ]);
        }
        queue.printstd();
    }
    if let Some(ts) = status.last_heartbeat {
        println!("Last heartbeat: {}", ts.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

async fn watch(service: &Arc<NotificationService>, every: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let report = service.startup().await;
    info!(
        reset = report.reset_channels.len(),
        heartbeat = ?report.heartbeat,
        replayed = report.replay.delivered,
        "Startup maintenance done"
    );

    let handle = service.start_maintenance(every);
    let abort = handle.abort_handle();

    let stopper = Arc::clone(service);
    ctrlc::set_handler(move || {
        warn!("Interrupt received, stopping maintenance");
        stopper.stop_maintenance();
        // Status and records are written after every step, nothing to flush
        abort.abort();
    })?;

    match handle.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {}
        Err(e) => return Err(e.into()),
    }
    info!("Watch stopped");
    Ok(())
}
