use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber on stderr, leaving stdout to the report.
///
/// `RUST_LOG` overrides the level chosen from `-v` flags.
pub fn init(verbosity: u8, json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(verbosity).into())
        .from_env_lossy();

    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json {
        registry.with(layer.json().with_thread_names(true)).try_init()
    } else {
        registry.with(layer.compact()).try_init()
    };

    if installed.is_err() {
        tracing::warn!("tracing subscriber already set; keeping the existing one");
    }
}

fn default_level(verbosity: u8) -> tracing::level_filters::LevelFilter {
    use tracing::level_filters::LevelFilter;
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
