// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

mod file_auth;

use std::net::IpAddr;

pub use file_auth::{format_entry as format_password_entry, FileAuth};

use crate::error::{Error, ErrorKind};

/// Decides whether a CONNECT's credentials are accepted. Implementations must not
/// block the async runtime; the flat-file backend does its file I/O at construction
/// time and answers `authenticate` from an in-memory map.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, remote_ip: IpAddr, username: Option<&str>, password: Option<&[u8]>) -> bool;
}

/// Accepts every CONNECT unconditionally. Used when `allow_anonymous` is set or
/// `--auth-service-factory allow-all` is selected.
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn authenticate(&self, _remote_ip: IpAddr, _username: Option<&str>, _password: Option<&[u8]>) -> bool {
        true
    }
}

/// Builds the configured `Authenticator`.
///
/// # Errors
///
/// Returns an error if `factory` names an unknown backend, or if the `file` backend's
/// password file cannot be read.
pub fn build(factory: &str, allow_anonymous: bool, password_file: &str) -> Result<Box<dyn Authenticator>, Error> {
    if allow_anonymous {
        return Ok(Box::new(AllowAll));
    }
    match factory {
        "allow-all" => Ok(Box::new(AllowAll)),
        "file" => Ok(Box::new(FileAuth::load(password_file)?)),
        other => Err(Error::from_string(
            ErrorKind::ConfigError,
            format!("unknown auth backend `{other}`"),
        )),
    }
}
