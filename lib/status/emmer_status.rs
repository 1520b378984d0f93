// Copyright 2025 The Emmer Authors
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License. You may obtain a copy of
// the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the
// License for the specific language governing permissions and limitations under
// the License.

//! # emmer_status
//!
//! Canonical error codes for the Emmer kernel.  `Ok` is not part of the enum
//! so that `Result<T>` stays idiomatic Rust; the `StatusCode` trait converts a
//! `Result` into the numeric code used at the syscall boundary.
//!
//! # Example
//!
//! ```
//! use emmer_status::{Error, Result};
//!
//! fn checked_div(numerator: u32, denominator: u32) -> Result<u32> {
//!     if denominator == 0 {
//!         Err(Error::InvalidArgument)
//!     } else {
//!         Ok(numerator / denominator)
//!     }
//! }
//!
//! assert_eq!(checked_div(4, 2), Ok(2));
//! assert_eq!(checked_div(4, 0), Err(Error::InvalidArgument));
//! ```

#![no_std]

/// Status code for no error.
pub const OK: u32 = 0;

/// Canonical error codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Error {
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Convert a `Result` into a numeric status code.
pub trait StatusCode {
    fn status_code(self) -> u32;
}

impl<T> StatusCode for Result<T> {
    fn status_code(self) -> u32 {
        match self {
            Ok(_) => OK,
            Err(e) => e as u32,
        }
    }
}
