use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::error::ConfigError;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l:<5})} {t} - {m}{n}";

/// Install a stderr logger at `level`. Transport internals stay at warn.
pub fn init(level: LevelFilter) -> Result<(), ConfigError> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder().build("h2", LevelFilter::Warn))
        .logger(Logger::builder().build("hyper", LevelFilter::Warn))
        .logger(Logger::builder().build("tower", LevelFilter::Warn))
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| ConfigError::Invalid(format!("logging: {}", e)))?;

    log4rs::init_config(config).map_err(|e| ConfigError::Invalid(format!("logging: {}", e)))?;
    Ok(())
}
