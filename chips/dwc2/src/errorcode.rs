// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Standard error enum for driver operations.

/// Errors returned by the driver.
///
/// Only recoverable conditions are reported this way. Configuration mistakes
/// such as over-allocating the FIFO memory are assertion failures instead.
/// The discriminants follow the kernel's error numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum ErrorCode {
    /// The component is powered down
    OFF = 4,
    /// Operation is not supported
    NOSUPPORT = 10,
}

impl From<ErrorCode> for usize {
    fn from(err: ErrorCode) -> usize {
        err as usize
    }
}

impl From<ErrorCode> for Result<(), ErrorCode> {
    fn from(ec: ErrorCode) -> Self {
        Err(ec)
    }
}
