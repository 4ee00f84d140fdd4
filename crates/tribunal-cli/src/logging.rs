use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Filter used when `RUST_LOG` is unset. `--verbose` adds per-case and
/// per-judge debug events from the core crate.
pub fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,tribunal_core=debug"
    } else {
        "warn,tribunal=info,tribunal_core=info"
    }
}

/// Install the global subscriber on stderr so logs never mix with report output.
pub fn init_tracing(json: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .compact()
            .boxed()
    };

    // a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init();
}
