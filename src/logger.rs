pub use tracing::{debug, error, info, instrument, trace, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt::{self, format::FmtSpan}};

/// Crate output at info, everything else (rusb, dependencies) at warn.
pub const DEFAULT_FILTER: &str = "warn,seek_thermal_rs=info";

/// Installs the global subscriber.
///
/// `RUST_LOG` replaces [`DEFAULT_FILTER`]. Lines carry the thread name so
/// acquisition worker output can be told apart from the caller's; once any
/// directive asks for debug or trace, span closings are logged with timings.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime())
        .with_span_events(span_events(&env_filter.to_string()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn span_events(filter: &str) -> FmtSpan {
    let verbose = filter
        .split(',')
        .filter_map(|directive| directive.rsplit('=').next())
        .any(|level| matches!(level.trim(), "debug" | "trace"));

    if verbose { FmtSpan::CLOSE } else { FmtSpan::NONE }
}
