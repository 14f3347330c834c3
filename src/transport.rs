// SPDX-License-Identifier: MPL-2.0

//! The host IPC seam: everything the dispatcher needs from the
//! microkernel's message-passing/shared-memory/fd primitives, abstracted
//! behind a trait so this crate never speaks a concrete wire transport.
//!
//! Real lanes, descriptor passing and shared-memory handles live on the
//! host side; this crate only ever asks for a calling conversation's
//! credentials, a monotonic clock reading, or to have a freshly served
//! lane installed as an fd in some process.

use crate::device::PrimeCredential;
use crate::error::Result;
use crate::prime::PrimeFile;
use std::sync::Arc;

/// The result of serving a [`PrimeFile`] on a fresh lane and asking the
/// host to install it as a file descriptor in the calling process, as
/// `PRIME_HANDLE_TO_FD` requires.
pub struct ServedPrimeFile {
    pub fd: i32,
    /// Credential the host derives for the newly served lane; this is
    /// what the *receiving* process presents back via `PRIME_FD_TO_HANDLE`.
    pub credentials: PrimeCredential,
}

/// The host collaborator the dispatcher calls through for anything that
/// isn't pure object-graph bookkeeping. A concrete implementation owns
/// the actual lane, shared-memory and fd-passing primitives; this crate
/// never touches them directly.
pub trait Transport: Send + Sync {
    /// The 16-byte credential the host derives for the conversation the
    /// current ioctl request arrived on.
    fn credentials(&self) -> PrimeCredential;

    /// Serves `prime` on a fresh lane and installs that lane as a file
    /// descriptor in the calling process, for `PRIME_HANDLE_TO_FD`.
    fn serve_prime_file(&self, prime: Arc<PrimeFile>) -> Result<ServedPrimeFile>;

    /// A monotonic nanosecond clock reading, used to timestamp posted
    /// events (`drm_event_vblank.tv_sec`/`tv_usec`).
    fn monotonic_now_ns(&self) -> u64;
}
