use crate::Environment;
use tracing::{debug, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Crates of this workspace that log store traffic at `debug`
const WORKSPACE_CRATES: [&str; 3] = ["database", "domain_products", "products_cli"];

/// HTTP plumbing underneath the Cosmos client; its connection-pool chatter
/// drowns out request spans at `debug`
const QUIET_CRATES: [&str; 3] = ["hyper", "hyper_util", "reqwest"];

/// Default filter directives when `RUST_LOG` is unset
///
/// Production keeps workspace crates at `info` and silences the HTTP stack
/// below `warn`. Development raises workspace crates to `debug` so every
/// document request and its status is visible.
pub fn default_directives(environment: &Environment) -> String {
    let (workspace, quiet) = if environment.is_production() {
        ("info", "warn")
    } else {
        ("debug", "info")
    };

    std::iter::once("info".to_string())
        .chain(WORKSPACE_CRATES.iter().map(|c| format!("{c}={workspace}")))
        .chain(QUIET_CRATES.iter().map(|c| format!("{c}={quiet}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install color-eyre with the project-standard configuration.
///
/// Call early in `main()`, before any fallible operation. Safe to call more
/// than once.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize tracing for the given environment.
///
/// - **Production** (`APP_ENV=production`): flattened JSON events, no module
///   targets.
/// - **Development** (default): pretty output with targets.
///
/// Levels come from [`default_directives`] unless `RUST_LOG` is set. Both
/// variants include the `tracing-error` `ErrorLayer`, so errors recorded by `#[instrument(err)]`
/// carry the span trace of the store operation that produced them.
///
/// Calling this again after a subscriber is installed is a no-op.
pub fn init_tracing(environment: &Environment) {
    let is_production = environment.is_production();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(environment)));

    let result = if is_production {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(_) => info!(?environment, json = is_production, "Tracing initialized"),
        Err(_) => debug!("Tracing already initialized, skipping re-initialization"),
    }
}
