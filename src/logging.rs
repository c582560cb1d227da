// Logging setup for applications embedding the pool.
//
// The pool itself only emits `tracing` events: worker lifecycle at debug,
// release and restart at info, uncaught task faults at error. Installing a
// subscriber is left to the application; the helpers here cover the common
// cases.
//
// ```rust
// use workhive::logging::{self, LogConfig};
//
// logging::init(LogConfig {
//     level: tracing::Level::DEBUG,
//     ..Default::default()
// });
// ```

use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Emit one JSON object per event instead of human-readable lines
    pub json_format: bool,
    /// Include thread name and id, useful to tell workers apart
    pub show_thread_info: bool,
    /// Extra directives, e.g. `"workhive=debug,my_app=info"`
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_thread_info: true,
            target_filters: None,
        }
    }
}

static INIT: Once = Once::new();

/// Install the global subscriber. Only the first call has any effect.
///
/// `RUST_LOG` is honoured on top of `config.level`.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

        if let Some(filters) = config.target_filters {
            for filter in filters.split(',') {
                if let Ok(directive) = filter.trim().parse() {
                    env_filter = env_filter.add_directive(directive);
                }
            }
        }

        let registry = tracing_subscriber::registry().with(env_filter);

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(
                registry.with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        } else {
            Box::new(
                registry.with(
                    fmt::layer()
                        .with_thread_names(config.show_thread_info)
                        .with_thread_ids(config.show_thread_info),
                ),
            )
        };

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Error setting global tracing subscriber: {err}");
        }
    });
}

pub fn init_default() {
    init(LogConfig::default());
}
