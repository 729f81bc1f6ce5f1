// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

use crate::error::{Error, ErrorKind};

/// Security section in config: which auth backend to use and where its data lives.
#[derive(Debug, Clone, Deserialize)]
pub struct Security {
    /// Skip authentication entirely; every CONNECT is accepted.
    #[serde(default)]
    pub(crate) allow_anonymous: bool,

    /// Selects the auth backend: `allow-all` or `file`. Mirrors `--auth-service-factory`.
    #[serde(default = "Security::default_auth_service_factory")]
    pub(crate) auth_service_factory: String,

    /// Path to the `user:salt:hash` password file used by the `file` backend.
    #[serde(default = "Security::default_password_file")]
    pub(crate) password_file: String,
}

impl Security {
    #[must_use]
    pub fn default_auth_service_factory() -> String {
        "allow-all".to_string()
    }

    #[must_use]
    pub fn default_password_file() -> String {
        "passwd.conf".to_string()
    }

    #[must_use]
    pub const fn allow_anonymous(&self) -> bool {
        self.allow_anonymous
    }

    #[must_use]
    pub fn auth_service_factory(&self) -> &str {
        &self.auth_service_factory
    }

    #[must_use]
    pub fn password_file(&self) -> &str {
        &self.password_file
    }

    /// # Errors
    ///
    /// Returns an error if `auth_service_factory` names an unknown backend.
    pub fn validate(&self) -> Result<(), Error> {
        match self.auth_service_factory.as_str() {
            "allow-all" | "file" => Ok(()),
            other => Err(Error::from_string(
                ErrorKind::ConfigError,
                format!("security.auth_service_factory: unknown backend `{other}`"),
            )),
        }
    }
}

impl Default for Security {
    fn default() -> Self {
        Self {
            allow_anonymous: false,
            auth_service_factory: Self::default_auth_service_factory(),
            password_file: Self::default_password_file(),
        }
    }
}
