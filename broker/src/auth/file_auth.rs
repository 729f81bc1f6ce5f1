// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::auth::Authenticator;
use crate::error::{Error, ErrorKind};

const SALT_LEN: usize = 16;

/// A parsed password-file line: the salt and the salted hash it was checked against.
type SaltedHash = (Vec<u8>, Vec<u8>);

/// Flat-file username/password backend. Each line is `user:salt_hex:hash_hex`, where
/// `hash = sha256(salt || password)`. Loaded once at startup into memory; the file is
/// not re-read afterwards.
pub struct FileAuth {
    entries: HashMap<String, SaltedHash>,
}

impl FileAuth {
    /// # Errors
    ///
    /// Returns an error if `path` cannot be read or contains a malformed line.
    pub fn load(path: &str) -> Result<Self, Error> {
        let entries = if Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            parse_entries(&content)?
        } else {
            HashMap::new()
        };
        Ok(Self { entries })
    }
}

impl Authenticator for FileAuth {
    fn authenticate(&self, _remote_ip: IpAddr, username: Option<&str>, password: Option<&[u8]>) -> bool {
        let (Some(username), Some(password)) = (username, password) else {
            return false;
        };
        let Some((salt, expected_hash)) = self.entries.get(username) else {
            return false;
        };
        &hash_password(salt, password) == expected_hash
    }
}

fn parse_entries(content: &str) -> Result<HashMap<String, SaltedHash>, Error> {
    let mut entries = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(3, ':');
        let (Some(user), Some(salt_hex), Some(hash_hex)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::from_string(
                ErrorKind::AuthError,
                format!("malformed password entry: `{line}`"),
            ));
        };
        let salt = decode_hex(salt_hex)?;
        let hash = decode_hex(hash_hex)?;
        entries.insert(user.to_string(), (salt, hash));
    }
    Ok(entries)
}

fn decode_hex(s: &str) -> Result<Vec<u8>, Error> {
    if !s.len().is_multiple_of(2) {
        return Err(Error::new(ErrorKind::AuthError, "odd-length hex field"));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| Error::new(ErrorKind::AuthError, "invalid hex digit"))
        })
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hash_password(salt: &[u8], password: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password);
    hasher.finalize().to_vec()
}

/// Builds one `user:salt_hex:hash_hex` line for the password file, generating a fresh
/// random salt. Used by the `mqttd-passwd` management tool.
#[must_use]
pub fn format_entry(username: &str, password: &[u8]) -> String {
    let mut salt = vec![0_u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let hash = hash_password(&salt, password);
    format!("{username}:{}:{}", encode_hex(&salt), encode_hex(&hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_file_format() {
        let line = format_entry("alice", b"hunter2");
        let entries = parse_entries(&line).unwrap();
        let auth = FileAuth { entries };
        let ip: IpAddr = [127, 0, 0, 1].into();
        assert!(auth.authenticate(ip, Some("alice"), Some(b"hunter2")));
        assert!(!auth.authenticate(ip, Some("alice"), Some(b"wrong")));
        assert!(!auth.authenticate(ip, Some("bob"), Some(b"hunter2")));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_entries("alice:nocolon").is_err());
    }
}
