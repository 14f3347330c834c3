// SPDX-License-Identifier: MPL-2.0

//! Crate-wide error taxonomy.
//!
//! The dispatcher only ever surfaces three wire-level outcomes to a client
//! (success, `ILLEGAL_ARGUMENT`, `NO_BACKING_DEVICE`) plus the out-of-band
//! would-block case for non-blocking reads. Internally we keep richer
//! context so a caller can log what actually went wrong.

use std::string::String;

/// Result alias used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// The three wire codes a DRM client can observe, per the legacy DRM ioctl ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCode {
    Success,
    IllegalArgument,
    NoBackingDevice,
}

/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown ioctl command {0:#x}")]
    UnknownIoctl(u32),

    #[error("unknown capability {0}")]
    UnknownCapability(u64),

    #[error("invalid flag combination: {0}")]
    InvalidFlags(&'static str),

    #[error("property validation failed: {0}")]
    ValidationFailed(&'static str),

    #[error("object {0} not found")]
    NoSuchObject(u32),

    #[error("blob {0} not found")]
    NoSuchBlob(u32),

    #[error("zero-length blob")]
    EmptyBlob,

    #[error("client has not negotiated the atomic capability")]
    AtomicNotEnabled,

    #[error("CRTC {0} has no cursor plane")]
    NoCursorPlane(u32),

    #[error("buffer handle {0} is not known to this file")]
    UnknownHandle(u32),

    #[error("PRIME credential is not registered")]
    UnknownPrimeCredential,

    #[error("destination buffer is too small")]
    BufferTooSmall,

    #[error("read would block")]
    WouldBlock,

    #[error("id allocator exhausted")]
    IdsExhausted,

    #[error("driver rejected the commit during capture")]
    CommitRejected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Maps this error onto the narrow wire-level vocabulary a DRM client
    /// can actually observe. `WouldBlock` has no wire code of its own: it is
    /// a distinct, non-error return path for non-blocking reads and must be
    /// matched before calling this.
    pub fn wire_code(&self) -> WireCode {
        match self {
            Error::NoCursorPlane(_) => WireCode::NoBackingDevice,
            Error::WouldBlock => {
                unreachable!("WouldBlock is not a wire error, it is a distinct read outcome")
            }
            _ => WireCode::IllegalArgument,
        }
    }
}
