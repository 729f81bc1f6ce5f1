// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::fmt::{self, Display};
use std::io;

use tokio::sync::mpsc;

use crate::commands::{DispatcherToSessionCmd, SessionToDispatcherCmd};

/// Represent the types of errors.
#[derive(Clone, Debug)]
pub enum ErrorKind {
    /// Error occurred while performing I/O.
    IoError,

    /// Packet encode error.
    EncodeError,

    /// Packet decode error.
    DecodeError,

    /// Config file is missing a required value or contains an invalid one.
    ConfigError,

    /// Password file entry is malformed.
    AuthError,

    /// mpsc channel send failed because the receiving task has already stopped.
    ChannelError,
}

#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_owned(),
        }
    }

    #[must_use]
    pub fn from_string(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::from_string(ErrorKind::IoError, format!("{err}"))
    }
}

impl From<codec::EncodeError> for Error {
    fn from(err: codec::EncodeError) -> Self {
        Self::from_string(ErrorKind::EncodeError, format!("{err:?}"))
    }
}

impl From<codec::DecodeError> for Error {
    fn from(err: codec::DecodeError) -> Self {
        Self::from_string(ErrorKind::DecodeError, format!("{err:?}"))
    }
}

impl From<mpsc::error::SendError<DispatcherToSessionCmd>> for Error {
    fn from(err: mpsc::error::SendError<DispatcherToSessionCmd>) -> Self {
        Self::from_string(ErrorKind::ChannelError, format!("{err}"))
    }
}

impl From<mpsc::error::SendError<SessionToDispatcherCmd>> for Error {
    fn from(err: mpsc::error::SendError<SessionToDispatcherCmd>) -> Self {
        Self::from_string(ErrorKind::ChannelError, format!("{err}"))
    }
}
