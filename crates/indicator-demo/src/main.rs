use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicator::{Indicator, IndicatorQueue, IndicatorRequest, Presenter, QueueConfig};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How long a manually dismissed indicator stays up before the demo cancels it.
const MANUAL_HOLD: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
struct DemoOptions {
    count: usize,
    timeout: Option<Duration>,
    capacity: Option<usize>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            count: 3,
            timeout: Some(Duration::from_millis(500)),
            capacity: None,
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let options = match parse_args(&args) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: indicator-demo [--count N] [--timeout-ms MS] [--manual] [--capacity N]");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --count <n>         Indicators to request [default: 3]");
            eprintln!("  --timeout-ms <ms>   Auto-dismiss after this long [default: 500]");
            eprintln!("  --manual            Dismiss by cancelling instead of by timeout");
            eprintln!("  --capacity <n>      Reject requests beyond n live indicators");
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(options) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// Initialize tracing with INDICATOR_LOG and LOG_FORMAT support.
fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("INDICATOR_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("trace") => "trace",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("indicator={level},indicator_demo={level}"))
    };

    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

fn parse_args(args: &[String]) -> Result<DemoOptions, String> {
    let mut options = DemoOptions::default();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--count" => {
                i += 1;
                options.count = parse_number(args.get(i), "--count")?;
            }
            "--timeout-ms" => {
                i += 1;
                let millis = parse_number(args.get(i), "--timeout-ms")?;
                options.timeout = Some(Duration::from_millis(millis as u64));
            }
            "--manual" => options.timeout = None,
            "--capacity" => {
                i += 1;
                options.capacity = Some(parse_number(args.get(i), "--capacity")?);
            }
            "--help" | "-h" => return Err(String::new()),
            arg => return Err(format!("unexpected argument: {arg}")),
        }
        i += 1;
    }

    if options.count == 0 {
        return Err("--count must be at least 1".to_string());
    }
    if options.capacity == Some(0) {
        return Err("--capacity must be at least 1".to_string());
    }
    Ok(options)
}

fn parse_number(value: Option<&String>, flag: &str) -> Result<usize, String> {
    let value = value.ok_or_else(|| format!("{flag} requires a value"))?;
    value
        .parse()
        .map_err(|_| format!("{flag} expects a non-negative integer, got '{value}'"))
}

/// Presenter that "shows" an indicator by printing it.
struct ConsolePresenter {
    label: String,
}

impl Presenter for ConsolePresenter {
    fn present(&self) {
        println!("[show] {}", self.label);
    }

    fn dismiss(&self) {
        println!("[hide] {}", self.label);
    }
}

fn run(options: DemoOptions) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(drive(options))
}

async fn drive(options: DemoOptions) -> anyhow::Result<()> {
    let config = match options.capacity {
        Some(capacity) => QueueConfig::with_capacity(capacity),
        None => QueueConfig::default(),
    };
    let queue: IndicatorQueue = IndicatorQueue::with_config(config);

    let mut indicators: Vec<Indicator> = Vec::with_capacity(options.count);
    for n in 1..=options.count {
        let presenter: Arc<dyn Presenter> = Arc::new(ConsolePresenter {
            label: format!("indicator {n}/{}", options.count),
        });
        let request = match options.timeout {
            Some(after) => IndicatorRequest::timeout(presenter, after),
            None => IndicatorRequest::manual(presenter),
        };

        match queue.try_add(request) {
            Ok(indicator) => indicators.push(indicator),
            Err(e) => warn!(request = n, error = %e, "Request rejected"),
        }
    }

    let snapshot = serde_json::to_string(&queue.snapshot()).context("failed to encode snapshot")?;
    info!(%snapshot, "Requests queued");

    for indicator in &indicators {
        if indicator.dismissal().timeout().is_none() {
            tokio::time::sleep(MANUAL_HOLD).await;
            indicator.cancel();
        }
        indicator.wait().await;
    }

    info!(shown = indicators.len(), "All indicators dismissed");
    Ok(())
}
