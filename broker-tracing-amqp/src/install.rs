//! Process-level installation of the instrumentation layer.

use std::env;
use std::sync::Once;

use broker_tracing::global;
use broker_tracing::trace::Tracer;
use tracing_subscriber::EnvFilter;

static INSTALL: Once = Once::new();

/// Installs the process-wide pieces of the instrumentation layer: a logging
/// subscriber appropriate for the environment, and a default tracer when
/// none has been registered yet.
///
/// Idempotent; calling it any number of times has the effect of calling it
/// once. Hosts that register their own tracer or subscriber first keep
/// them.
pub fn install() {
    INSTALL.call_once(|| {
        init_logging();
        if global::tracer().is_none() {
            global::set_tracer(Tracer::new());
        }
    });
}

/// The Lambda runtime stamps and routes log records itself, so it gets a
/// timestamp-less, ANSI-less formatter; everything else gets the standard
/// one.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if running_in_lambda() {
        builder.without_time().with_ansi(false).try_init().ok();
    } else {
        builder.try_init().ok();
    }
}

fn running_in_lambda() -> bool {
    env::var("AWS_EXECUTION_ENV")
        .map(|value| value.contains("AWS_Lambda_"))
        .unwrap_or(false)
}
