use std::env;
use std::str::FromStr;

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

pub const LOG_LEVEL_ENV: &str = "VRI_LOG";

/// Logs to stdout, next to whatever the simulation itself prints.
#[must_use]
pub fn config_default() -> Config {
    config_with_level(log_level())
}

pub fn config_with_level(level: LevelFilter) -> Config {
    let stdout = ConsoleAppender::builder()
        .target(Target::Stdout)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%dT%H:%M:%S%Z)}\tvri\t{l}\t{m}{n}",
        )))
        .build();

    Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .expect("static logging configuration is valid")
}

/// Installs [`config_default`] unless a logger is already set.
///
/// Returns whether this call installed the logger.
pub fn init() -> bool {
    log4rs::init_config(config_default()).is_ok()
}

fn log_level() -> LevelFilter {
    [LOG_LEVEL_ENV, "RUST_LOG"]
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find_map(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(LevelFilter::Info)
}
