// SPDX-License-Identifier: MPL-2.0

//! Mode-info construction and the standard-mode filter helper.
//!
//! The full DMT timing table is out of scope for this core (it is a pure
//! data table supplied by the platform integration, not core logic); what
//! lives here is the wire-compatible `drm_mode_modeinfo` layout, the
//! constructor used to build entries in it, and the width/height filter a
//! driver runs the table through before handing modes to a connector.

use bytemuck::{Pod, Zeroable};

pub const DRM_DISPLAY_MODE_LEN: usize = 32;

pub const MODE_TYPE_DRIVER: u32 = 1 << 6;
pub const MODE_TYPE_PREFERRED: u32 = 1 << 3;

pub const MODE_FLAG_PHSYNC: u32 = 1 << 0;
pub const MODE_FLAG_NHSYNC: u32 = 1 << 1;
pub const MODE_FLAG_PVSYNC: u32 = 1 << 2;
pub const MODE_FLAG_NVSYNC: u32 = 1 << 3;
pub const MODE_FLAG_INTERLACE: u32 = 1 << 4;

/// `drm_mode_modeinfo`, byte-for-byte as DRM/KMS clients expect it. Any
/// blob assigned to the `MODE_ID` property must be exactly this size.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct ModeInfo {
    pub clock: u32,
    pub hdisplay: u16,
    pub hsync_start: u16,
    pub hsync_end: u16,
    pub htotal: u16,
    pub hskew: u16,
    pub vdisplay: u16,
    pub vsync_start: u16,
    pub vsync_end: u16,
    pub vtotal: u16,
    pub vscan: u16,
    pub vrefresh: u32,
    pub flags: u32,
    pub mode_type: u32,
    pub name: [u8; DRM_DISPLAY_MODE_LEN],
}

#[allow(clippy::too_many_arguments)]
pub fn make_mode_info(
    name: &str,
    mode_type: u32,
    clock: u32,
    hdisplay: u16,
    hsync_start: u16,
    hsync_end: u16,
    htotal: u16,
    hskew: u16,
    vdisplay: u16,
    vsync_start: u16,
    vsync_end: u16,
    vtotal: u16,
    vscan: u16,
    flags: u32,
) -> ModeInfo {
    let mut name_buf = [0u8; DRM_DISPLAY_MODE_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(DRM_DISPLAY_MODE_LEN - 1);
    name_buf[..len].copy_from_slice(&bytes[..len]);

    ModeInfo {
        clock,
        hdisplay,
        hsync_start,
        hsync_end,
        htotal,
        hskew,
        vdisplay,
        vsync_start,
        vsync_end,
        vtotal,
        vscan,
        vrefresh: 60,
        flags,
        mode_type,
        name: name_buf,
    }
}

/// A small built-in table of common display timings, standing in for the
/// platform's real DMT table (out of scope for this core). Large enough to
/// exercise `filter_by_resolution` meaningfully in tests.
fn standard_modes() -> [ModeInfo; 3] {
    [
        make_mode_info(
            "640x480",
            MODE_TYPE_DRIVER,
            25175,
            640,
            656,
            752,
            800,
            0,
            480,
            490,
            492,
            525,
            0,
            MODE_FLAG_NHSYNC | MODE_FLAG_NVSYNC,
        ),
        make_mode_info(
            "800x600",
            MODE_TYPE_DRIVER,
            40000,
            800,
            840,
            968,
            1056,
            0,
            600,
            601,
            605,
            628,
            0,
            MODE_FLAG_PHSYNC | MODE_FLAG_PVSYNC,
        ),
        make_mode_info(
            "1024x768",
            MODE_TYPE_DRIVER | MODE_TYPE_PREFERRED,
            65000,
            1024,
            1048,
            1184,
            1344,
            0,
            768,
            771,
            777,
            806,
            0,
            MODE_FLAG_NHSYNC | MODE_FLAG_NVSYNC,
        ),
    ]
}

/// Appends every standard mode that fits within `max_width` x `max_height`
/// to `supported_modes`, mirroring the driver-side helper that filters the
/// platform's timing table down to what a connector can actually drive.
pub fn add_standard_modes(supported_modes: &mut Vec<ModeInfo>, max_width: u32, max_height: u32) {
    for mode in standard_modes() {
        if mode.hdisplay as u32 <= max_width && mode.vdisplay as u32 <= max_height {
            supported_modes.push(mode);
        }
    }
}
