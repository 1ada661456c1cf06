use std::sync::OnceLock;

use log::{debug, error};
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::commands::Verbosity;

static LOGGER_HANDLE: OnceLock<Handle<EnvFilter, Registry>> = OnceLock::new();

pub(crate) fn init_logger(verbosity: Option<Verbosity>) {
    let verbosity = verbosity.unwrap_or_default();

    let log_filter = match verbosity {
        // Show only errors
        Verbosity::Quiet => "off,storefront=error,storefront_catalog=error",
        // Only show warnings
        Verbosity::Verbose(0) => "off,storefront=warn,storefront_catalog=warn",
        // Show our own info logs
        Verbosity::Verbose(1) => "off,storefront=info,storefront_catalog=info",
        // Also show debug from the catalog library
        Verbosity::Verbose(2) => "off,storefront=debug,storefront_catalog=debug",
        // Also show trace from the catalog library
        Verbosity::Verbose(3) => "off,storefront=trace,storefront_catalog=trace",
        // Also show debug from the HTTP stack
        Verbosity::Verbose(4) => "debug,storefront=trace,storefront_catalog=trace",
        Verbosity::Verbose(_) => "trace",
    };

    let filter_handle = LOGGER_HANDLE.get_or_init(|| {
        let (subscriber, reload_handle) = create_registry_and_filter_reload_handle();
        subscriber.init();
        reload_handle
    });

    update_filters(filter_handle, log_filter);
}

/// Replace the active filter, `RUST_LOG` takes precedence over `log_filter`.
pub fn update_filters(filter_handle: &Handle<EnvFilter, Registry>, log_filter: &str) {
    let result = filter_handle.modify(|layer| {
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_filter)) {
            Ok(new_filter) => *layer = new_filter,
            Err(err) => {
                error!("Updating logger filter failed: {}", err);
            },
        };
    });
    if let Err(err) = result {
        error!("Updating logger filter failed: {}", err);
    }
}

pub fn create_registry_and_filter_reload_handle() -> (
    impl tracing_subscriber::layer::SubscriberExt + SubscriberInitExt,
    Handle<EnvFilter, Registry>,
) {
    debug!("Initializing logger");
    // The first filter set establishes an upper bound for `log` verbosity,
    // so start at `trace` and narrow it down through the reload handle.
    let filter = EnvFilter::new("trace");
    let (filter, filter_reload_handle) = tracing_subscriber::reload::Layer::new(filter);
    let log_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(tracing_subscriber::fmt::format())
        .with_filter(filter);
    let registry = tracing_subscriber::registry().with(log_layer);

    (registry, filter_reload_handle)
}
