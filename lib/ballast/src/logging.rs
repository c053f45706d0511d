//! Structured logging plumbing shared by the workspace. Components take an
//! optional parent `Logger` and fall back to a discarding one, so library code
//! never forces a logging setup on the caller.

pub use slog::{debug, error, info, o, trace, warn, Discard, Drain, Logger};

use sloggers::{Config, LoggerConfig};

/// Builds the default terminal logger. Binaries and test harnesses call this
/// once and hand child loggers down to components.
pub fn init() -> Logger {
    let config: LoggerConfig = serdeconv::from_toml_str(
        r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#,
    )
    .expect("Malformed logger config");

    config.build_logger().expect("Logger construction failed")
}

/// Logger that drops every record.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}

/// Resolves an optional parent logger into a concrete one.
pub fn child<'a, L: Into<Option<&'a Logger>>>(parent: L) -> Logger {
    match parent.into() {
        Some(log) => log.new(o!()),
        None => discard(),
    }
}
