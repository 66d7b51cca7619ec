mod config;
mod jobs;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use warrant_core::domain::{JobDataMap, Role};
use warrant_core::{Scheduler, Trigger};

use config::WarrantConfig;

/// Fire role-authorized jobs and inspect their results
#[derive(Parser, Debug)]
#[command(name = "warrant")]
struct Args {
    /// Config file (missing file means built-in defaults)
    #[arg(long, env = "WARRANT_CONFIG", default_value = "warrant.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fire a job once (or `--times` times in a row) and print each result
    Fire {
        job: String,

        /// Role the caller acts as
        #[arg(long)]
        role: String,

        /// Job data entry, `key=value`; the value is parsed as JSON when possible
        #[arg(long = "data", value_parser = parse_data_entry)]
        data: Vec<(String, Value)>,

        #[arg(long, default_value_t = 1)]
        times: u32,

        #[arg(long, default_value = "manual")]
        trigger: String,
    },

    /// List registered jobs
    List,

    /// Print job health
    Health,
}

fn parse_data_entry(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[derive(Serialize)]
struct FireOutcome<'a> {
    job: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    retryable: bool,
    result: Option<Arc<warrant_core::JobResult>>,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn fire(
    scheduler: Arc<Scheduler>,
    job: &str,
    role: Role,
    data: JobDataMap,
    times: u32,
    trigger: &str,
) -> anyhow::Result<()> {
    // Ctrl-C は実行中のジョブに協調キャンセルを要求する
    let cancel_on_signal = {
        let scheduler = Arc::clone(&scheduler);
        let job = job.to_string();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(job = %job, "Interrupted, cancelling job");
                if let Err(e) = scheduler.cancel(&job) {
                    warn!(error = %e, "Cancel failed");
                }
            }
        })
    };

    let mut last_error = None;
    for _ in 0..times.max(1) {
        let trigger = Trigger::named(trigger).with_data(data.clone());
        let outcome = match scheduler.fire(job, &role, trigger).await {
            Ok(result) => {
                last_error = None;
                FireOutcome {
                    job,
                    ok: true,
                    error: None,
                    retryable: false,
                    result: Some(result),
                }
            }
            Err(err) => {
                let outcome = FireOutcome {
                    job,
                    ok: false,
                    error: Some(err.to_string()),
                    retryable: err.is_retryable(),
                    result: scheduler.last_result(job),
                };
                last_error = Some(err);
                outcome
            }
        };
        print_json(&outcome)?;
    }
    cancel_on_signal.abort();

    match last_error {
        Some(err) => Err(err).with_context(|| format!("job `{job}` did not succeed")),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = WarrantConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let scheduler = Arc::new(jobs::build_scheduler(&config).context("building scheduler")?);
    info!(jobs = ?scheduler.job_names(), "Scheduler ready");

    match args.command {
        Command::Fire {
            job,
            role,
            data,
            times,
            trigger,
        } => {
            let data: JobDataMap = data.into_iter().collect();
            fire(scheduler, &job, Role::new(role), data, times, &trigger).await
        }
        Command::List => print_json(&scheduler.summaries()),
        Command::Health => print_json(&scheduler.health_status().await),
    }
}
