// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Storage-Layer Error Type
//!
//! Every fallible operation in this crate returns [`Result`]. The variant
//! set is deliberately small: callers dispatch on the kind (is this
//! corruption? a missing key?) and log or propagate the message.
//!
//! Corruption is never recovered from locally. A corrupt block aborts the
//! read and poisons any iterator derived from it; only the log reader
//! tolerates framing damage, by skipping to the next block boundary.

/// Result alias used throughout the storage layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the storage substrate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// On-disk data failed validation (checksum, magic, framing, bounds).
    #[error("corruption: {0}")]
    Corruption(String),

    /// The operation or encoding is recognized but not supported.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The caller passed something structurally invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a corruption error with the given message.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }
}
