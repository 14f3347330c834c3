// SPDX-License-Identifier: MPL-2.0

//! The hardware back-end this core consumes. Nothing in this module knows
//! how a dumb buffer is actually allocated or how a mode is actually
//! programmed into silicon: a concrete `Driver` impl lives outside this
//! crate and is handed in at `Device::new`.

use std::sync::Arc;

use crate::buffer::BufferObject;
use crate::commit::Configuration;
use crate::connector::ConnectorStatus;
use crate::error::Result;
use crate::framebuffer::Framebuffer;
use crate::modes::ModeInfo;

bitflags::bitflags! {
    /// Feature bits a driver advertises; the dispatcher consults these to
    /// decide which ioctls/capabilities are legal for this device.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DriverFeatures: u32 {
        const GEM     = 1 << 0;
        const MODESET = 1 << 1;
        const ATOMIC  = 1 << 2;
        const CURSOR_HOTSPOT = 1 << 3;
    }
}

/// Result of probing a connector's attachment state, returned by
/// [`Driver::probe_connector`]. The reference design calls this
/// asynchronous (it may require a round-trip to real hardware); here it
/// is a blocking call on the File's cooperative task, consistent with
/// the rest of this crate's scheduling model (see the concurrency notes
/// in the crate root docs).
#[derive(Debug, Clone)]
pub struct ConnectorProbe {
    pub status: ConnectorStatus,
    pub modes: Vec<ModeInfo>,
}

/// The driver interface this core is built against. A real implementation
/// owns the hardware or a paravirtualized equivalent; this crate only
/// calls through it at well-defined points (dumb-buffer creation,
/// framebuffer creation, commit, connector probing, dirty notification).
pub trait Driver: Send + Sync {
    fn driver_version(&self) -> (u16, u16, u16);
    fn driver_info(&self) -> (String, String, String);
    fn features(&self) -> DriverFeatures;

    fn cursor_width(&self) -> u32;
    fn cursor_height(&self) -> u32;
    fn addfb2_modifiers_supported(&self) -> bool;

    /// Allocates a "dumb" (no GPU-acceleration) buffer of the requested
    /// size. Returns the buffer's byte size and row pitch; the device
    /// assigns the BO its identity and mmap slot.
    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> Result<(u64, u32)>;

    fn create_framebuffer(
        &self,
        bo: Arc<BufferObject>,
        width: u32,
        height: u32,
        pitch: u32,
        fourcc: u32,
        modifier: u64,
    ) -> Result<Framebuffer>;

    /// A fresh commit context. Each call to this must yield an independent
    /// `Configuration`: the commit engine never reuses one across commits.
    fn create_configuration(&self) -> Box<dyn Configuration>;

    fn probe_connector(&self, connector_id: u32) -> Result<ConnectorProbe>;

    fn notify_dirty(&self, framebuffer_id: u32) -> Result<()>;
}
