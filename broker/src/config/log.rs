// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

/// Log section in config: console/file sinks and their levels.
#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    #[serde(default)]
    pub(crate) disable: bool,

    #[serde(default = "Log::default_console")]
    pub(crate) console: bool,

    #[serde(default = "Log::default_level")]
    pub(crate) console_level: String,

    pub(crate) file: Option<String>,

    #[serde(default = "Log::default_level")]
    pub(crate) file_level: String,

    /// Flush every log record synchronously instead of batching. Slower, used for
    /// debugging startup issues.
    #[serde(default)]
    pub(crate) sync: bool,
}

impl Log {
    #[must_use]
    pub const fn default_console() -> bool {
        true
    }

    #[must_use]
    pub fn default_level() -> String {
        "info".to_string()
    }

    #[must_use]
    pub const fn disable(&self) -> bool {
        self.disable
    }

    #[must_use]
    pub const fn console(&self) -> bool {
        self.console
    }

    #[must_use]
    pub fn console_level(&self) -> &str {
        &self.console_level
    }

    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    #[must_use]
    pub fn file_level(&self) -> &str {
        &self.file_level
    }

    #[must_use]
    pub const fn sync(&self) -> bool {
        self.sync
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            disable: false,
            console: Self::default_console(),
            console_level: Self::default_level(),
            file: None,
            file_level: Self::default_level(),
            sync: false,
        }
    }
}
