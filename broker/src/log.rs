// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config as LogConfigBuilder, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::Log;
use crate::error::{Error, ErrorKind};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {l} {t} - {m}{n}";
const ROLLING_FILE_SIZE_LIMIT: u64 = 10 * 1024 * 1024;
const ROLLING_FILE_COUNT: u32 = 5;

fn parse_level(level: &str) -> Result<LevelFilter, Error> {
    level.parse().map_err(|_| {
        Error::from_string(
            ErrorKind::ConfigError,
            format!("unknown log level `{level}`"),
        )
    })
}

/// Initializes the global `log` facade from the `log` config section. Safe to call
/// once; a second call would fail in `log4rs::init_config` but the broker only ever
/// calls this from `main`.
///
/// # Errors
///
/// Returns an error if a configured log level is not recognized or the log file's
/// parent directory cannot be used for rolling.
pub fn init(config: &Log) -> Result<(), Error> {
    if config.disable() {
        let log_config = LogConfigBuilder::builder()
            .build(Root::builder().build(LevelFilter::Off))
            .map_err(|err| Error::from_string(ErrorKind::ConfigError, format!("{err}")))?;
        log4rs::init_config(log_config)
            .map_err(|err| Error::from_string(ErrorKind::ConfigError, format!("{err}")))?;
        return Ok(());
    }

    let mut builder = LogConfigBuilder::builder();
    let mut root = Root::builder();

    if config.console() {
        let encoder = Box::new(PatternEncoder::new(PATTERN));
        let appender = ConsoleAppender::builder().encoder(encoder).build();
        builder = builder.appender(Appender::builder().build("console", Box::new(appender)));
        root = root.appender("console");
    }

    if let Some(path) = config.file() {
        let roller = FixedWindowRoller::builder()
            .build(&format!("{path}.{{}}.gz"), ROLLING_FILE_COUNT)
            .map_err(|err| Error::from_string(ErrorKind::ConfigError, format!("{err}")))?;
        let trigger = SizeTrigger::new(ROLLING_FILE_SIZE_LIMIT);
        let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));
        let appender = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path, Box::new(policy))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(appender)));
        root = root.appender("file");
    }

    let console_level = parse_level(config.console_level())?;
    let file_level = if config.file().is_some() {
        parse_level(config.file_level())?
    } else {
        LevelFilter::Off
    };
    let root_level = console_level.max(file_level);

    let log_config = builder
        .build(root.build(root_level))
        .map_err(|err| Error::from_string(ErrorKind::ConfigError, format!("{err}")))?;
    log4rs::init_config(log_config)
        .map_err(|err| Error::from_string(ErrorKind::ConfigError, format!("{err}")))?;
    Ok(())
}
