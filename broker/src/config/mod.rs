// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

mod general;
mod listener;
mod log;
mod security;

pub use general::General;
pub use listener::Listener;
pub use log::Log;
pub use security::Security;

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::cli::Cli;
use crate::error::Error;

/// Top-level broker configuration, assembled from an optional TOML file and then
/// overridden field-by-field with any CLI flags the caller passed. Frozen and
/// validated once at startup; handed around afterwards as `Arc<Config>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: General,

    #[serde(default)]
    pub listener: Listener,

    #[serde(default)]
    pub security: Security,

    #[serde(default)]
    pub log: Log,
}

impl Config {
    /// # Errors
    ///
    /// Returns an error if `--conf-file` names a file that cannot be read or does
    /// not parse as TOML, or if the merged configuration fails validation.
    pub fn load(cli: &Cli) -> Result<Self, Error> {
        let mut config = match &cli.conf_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, Error> {
        let content = fs::read_to_string(Path::new(path))?;
        toml::from_str(&content)
            .map_err(|err| Error::from_string(crate::error::ErrorKind::ConfigError, format!("{path}: {err}")))
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(address) = &cli.server_address {
            self.listener.server_address = address.clone();
        }
        if let Some(port) = cli.server_port {
            self.listener.server_port = port;
        }
        if let Some(rbuf) = cli.conn_rbuf_size {
            self.listener.conn_rbuf_size = rbuf;
        }
        if let Some(wbuf) = cli.conn_wbuf_size {
            self.listener.conn_wbuf_size = wbuf;
        }
        if let Some(timeout) = cli.conn_timeout {
            self.general.connect_timeout_ms = timeout;
        }
        if let Some(timeout) = cli.pub_ack_timeout {
            self.general.pub_ack_timeout_ms = timeout;
        }
        if let Some(retries) = cli.pub_max_retries {
            self.general.pub_max_retries = retries;
        }
        if let Some(factory) = &cli.auth_service_factory {
            self.security.auth_service_factory = factory.clone();
        }
        if let Some(file) = &cli.log_file {
            self.log.file = Some(file.clone());
        }
        if let Some(level) = &cli.log_file_level {
            self.log.file_level = level.clone();
        }
        if cli.log_console {
            self.log.console = true;
        }
        if let Some(level) = &cli.log_console_level {
            self.log.console_level = level.clone();
        }
        if cli.log_disable {
            self.log.disable = true;
        }
        if cli.log_sync {
            self.log.sync = true;
        }
    }

    /// # Errors
    ///
    /// Returns an error if any section's invariants are violated.
    pub fn validate(&self) -> Result<(), Error> {
        self.general.validate()?;
        self.security.validate()?;
        Ok(())
    }
}
