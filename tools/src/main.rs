//! ledger-runner: headless front end for the incentive engines.
//!
//! Usage:
//!   ledger-runner overview  --data ledger.json
//!   ledger-runner schedule  --data ledger.json --payee 1001 [--total 1200] [--cap 80]
//!                           [--term 12] [--start 2024-01-01] [--frequency quarterly]
//!   ledger-runner batch     --data ledger.json --payee 1001 --payee 1002 [--cap ..] [--term ..]
//!   ledger-runner anomalies --data ledger.json [--deadline-ms 5000]
//!   ledger-runner --ipc-mode [--config engine.json]

use anyhow::{Context, Result};
use chrono::NaiveDate;
use incentive_core::{
    anomaly_engine::AnomalyEngine,
    config::EngineConfig,
    dataset::Dataset,
    dataset_store::DatasetStore,
    isolation_forest::FitBudget,
    overview::overview,
    response::Response,
    schedule_engine::{PaymentFrequency, ScheduleEngine, ScheduleOverrides, ScheduleRequest},
    LedgerError,
};
use serde::Serialize;
use std::env;
use std::io::{self, BufRead, Write};
use std::time::{Duration, Instant};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Load {
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        dataset: Option<serde_json::Value>,
    },
    Overview,
    Schedule(ScheduleRequest),
    Batch {
        payee_ids: Vec<String>,
        #[serde(default)]
        overrides: ScheduleOverrides,
    },
    DetectAnomalies,
    Quit,
}

#[derive(Serialize)]
struct Loaded {
    rows: usize,
    columns: usize,
}

struct Runner {
    config: EngineConfig,
    store: DatasetStore,
    /// Per-call fit deadline, measured from the start of each detection.
    fit_timeout: Option<Duration>,
}

impl Runner {
    fn schedule_engine(&self) -> ScheduleEngine {
        ScheduleEngine::new(self.config.schedule.clone())
    }

    fn anomaly_engine(&self) -> AnomalyEngine {
        let budget = match self.fit_timeout {
            Some(timeout) => FitBudget::unlimited().with_deadline(Instant::now() + timeout),
            None => FitBudget::unlimited(),
        };
        AnomalyEngine::new(self.config.anomaly.clone()).with_budget(budget)
    }

    fn load(&self, path: Option<&str>, inline: Option<serde_json::Value>) -> Response<Loaded> {
        let parsed = match (path, inline) {
            (_, Some(value)) => Dataset::from_json(&value.to_string()),
            (Some(path), None) => read_dataset(path),
            (None, None) => Err(LedgerError::DatasetUnavailable),
        };
        parsed
            .map(|ds| {
                let loaded = Loaded { rows: ds.row_count(), columns: ds.columns().len() };
                self.store.replace(ds);
                loaded
            })
            .into()
    }

    fn handle(&self, cmd: IpcCommand) -> Result<Option<String>> {
        let line = match cmd {
            IpcCommand::Quit => return Ok(None),
            IpcCommand::Load { path, dataset } => to_line(&self.load(path.as_deref(), dataset))?,
            IpcCommand::Overview => to_line(&Response::from(
                self.store
                    .snapshot()
                    .map(|ds| overview(&ds, &self.config.schedule.columns)),
            ))?,
            IpcCommand::Schedule(request) => to_line(&Response::from(
                self.store
                    .snapshot()
                    .and_then(|ds| self.schedule_engine().generate(&request, &ds)),
            ))?,
            IpcCommand::Batch { payee_ids, overrides } => to_line(&Response::from(
                self.store
                    .snapshot()
                    .and_then(|ds| self.schedule_engine().generate_batch(&payee_ids, &overrides, &ds)),
            ))?,
            IpcCommand::DetectAnomalies => to_line(&Response::from(
                self.store
                    .snapshot()
                    .and_then(|ds| self.anomaly_engine().detect(&ds)),
            ))?,
        };
        Ok(Some(line))
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    let config = match arg_value(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let fit_timeout = parse_opt::<u64>(&args, "--deadline-ms")?.map(Duration::from_millis);
    let runner = Runner { config, store: DatasetStore::new(), fit_timeout };

    if ipc_mode {
        return run_ipc_loop(&runner);
    }

    let cmd = args.get(1).map(|s| s.as_str()).unwrap_or("overview");
    let data = arg_value(&args, "--data").context("--data <file> is required")?;
    runner.store.replace(read_dataset(data)?);

    let line = match cmd {
        "overview" => runner.handle(IpcCommand::Overview)?,
        "schedule" => {
            let payee = arg_value(&args, "--payee").context("--payee <id> is required")?;
            let request = ScheduleRequest {
                payee_id: payee.to_string(),
                total_incentive: parse_opt(&args, "--total")?,
                cap_percent: parse_opt(&args, "--cap")?,
                term_months: parse_opt(&args, "--term")?,
                start_date: parse_date_opt(&args, "--start")?,
                frequency: parse_opt::<PaymentFrequency>(&args, "--frequency")?,
            };
            runner.handle(IpcCommand::Schedule(request))?
        }
        "batch" => {
            let payee_ids = arg_values(&args, "--payee");
            let overrides = ScheduleOverrides {
                cap_percent: parse_opt(&args, "--cap")?,
                term_months: parse_opt(&args, "--term")?,
                start_date: parse_date_opt(&args, "--start")?,
                frequency: parse_opt::<PaymentFrequency>(&args, "--frequency")?,
            };
            runner.handle(IpcCommand::Batch { payee_ids, overrides })?
        }
        "anomalies" => runner.handle(IpcCommand::DetectAnomalies)?,
        other => anyhow::bail!("Unknown command: {other}"),
    };
    if let Some(line) = line {
        println!("{line}");
    }
    Ok(())
}

fn run_ipc_loop(runner: &Runner) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "status": "error", "kind": "bad_command", "message": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match runner.handle(cmd)? {
            Some(line) => writeln!(stdout, "{line}")?,
            None => break,
        }
        stdout.flush()?;
    }
    Ok(())
}

fn read_dataset(path: &str) -> Result<Dataset, LedgerError> {
    let content = std::fs::read_to_string(path)?;
    Dataset::from_json(&content)
}

fn to_line<T: Serialize>(response: &Response<T>) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn arg_values(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .collect()
}

fn parse_opt<T>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    arg_value(args, flag)
        .map(|v| v.parse::<T>().map_err(|e| anyhow::anyhow!("Invalid {flag} '{v}': {e}")))
        .transpose()
}

fn parse_date_opt(args: &[String], flag: &str) -> Result<Option<NaiveDate>> {
    arg_value(args, flag)
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .with_context(|| format!("Invalid {flag} '{v}', expected YYYY-MM-DD"))
        })
        .transpose()
}
