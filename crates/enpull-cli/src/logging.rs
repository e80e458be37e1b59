//! Console and optional file logging.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Level for every layer: progress normally, errors only when `silent`.
pub fn level(silent: bool) -> LevelFilter {
    if silent {
        LevelFilter::ERROR
    } else {
        LevelFilter::INFO
    }
}

/// Install the global subscriber.
///
/// The console layer writes to stderr. With `log_file`, the same events are
/// appended to that file; `silent` quiets both.
pub fn init(silent: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(level(silent));

    let file = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(file_layer(file, silent))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}

fn file_layer<S>(file: File, silent: bool) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(level(silent))
}
