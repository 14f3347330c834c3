// SPDX-License-Identifier: MPL-2.0

//! Wire-format structs for the DRM ioctl ABI: byte-for-byte `#[repr(C)]`
//! layouts a client marshals its requests into. Many of these follow the
//! "query size, then fill" idiom: a first call with the destination
//! pointer fields zeroed asks only for counts, a second call with those
//! pointers set receives the data.

use bytemuck::{Pod, Zeroable};

pub const DRM_PROP_NAME_LEN: usize = 32;

pub const DRM_IOCTL_VERSION: u32 = 0x00;
pub const DRM_IOCTL_GET_CAP: u32 = 0x0c;
pub const DRM_IOCTL_SET_CLIENT_CAP: u32 = 0x0d;
pub const DRM_IOCTL_SET_MASTER: u32 = 0x1e;
pub const DRM_IOCTL_DROP_MASTER: u32 = 0x1f;
pub const DRM_IOCTL_PRIME_HANDLE_TO_FD: u32 = 0x2d;
pub const DRM_IOCTL_PRIME_FD_TO_HANDLE: u32 = 0x2e;
pub const DRM_IOCTL_MODE_GETRESOURCES: u32 = 0xa0;
pub const DRM_IOCTL_MODE_GETCRTC: u32 = 0xa1;
pub const DRM_IOCTL_MODE_SETCRTC: u32 = 0xa2;
pub const DRM_IOCTL_MODE_CURSOR: u32 = 0xa3;
pub const DRM_IOCTL_MODE_GETGAMMA: u32 = 0xa4;
pub const DRM_IOCTL_SET_GAMMA: u32 = 0xa5;
pub const DRM_IOCTL_MODE_GETENCODER: u32 = 0xa6;
pub const DRM_IOCTL_MODE_GETCONNECTOR: u32 = 0xa7;
pub const DRM_IOCTL_MODE_GETPROPERTY: u32 = 0xaa;
pub const DRM_IOCTL_MODE_SETPROPERTY: u32 = 0xab;
pub const DRM_IOCTL_MODE_GETPROPBLOB: u32 = 0xac;
pub const DRM_IOCTL_MODE_GETFB: u32 = 0xad;
pub const DRM_IOCTL_MODE_ADDFB: u32 = 0xae;
pub const DRM_IOCTL_MODE_RMFB: u32 = 0xaf;
pub const DRM_IOCTL_MODE_PAGE_FLIP: u32 = 0xb0;
pub const DRM_IOCTL_MODE_DIRTYFB: u32 = 0xb1;
pub const DRM_IOCTL_MODE_CREATE_DUMB: u32 = 0xb2;
pub const DRM_IOCTL_MODE_MAP_DUMB: u32 = 0xb3;
pub const DRM_IOCTL_MODE_DESTROY_DUMB: u32 = 0xb4;
pub const DRM_IOCTL_MODE_GETPLANERESOURCES: u32 = 0xb5;
pub const DRM_IOCTL_MODE_GETPLANE: u32 = 0xb6;
pub const DRM_IOCTL_MODE_ATOMIC: u32 = 0xbc;
pub const DRM_IOCTL_MODE_CREATEPROPBLOB: u32 = 0xbd;
pub const DRM_IOCTL_MODE_DESTROYPROPBLOB: u32 = 0xbe;
pub const DRM_IOCTL_MODE_OBJ_GETPROPERTIES: u32 = 0xb9;
pub const DRM_IOCTL_MODE_CURSOR2: u32 = 0xbb;
pub const DRM_IOCTL_MODE_ADDFB2: u32 = 0xb8;
pub const DRM_IOCTL_MODE_GETFB2: u32 = 0xcf;
pub const DRM_IOCTL_GEM_CLOSE: u32 = 0x09;

pub const DRM_CAP_DUMB_BUFFER: u64 = 0x1;
pub const DRM_CAP_VBLANK_HIGH_CRTC: u64 = 0x2;
pub const DRM_CAP_DUMB_PREFERRED_DEPTH: u64 = 0x3;
pub const DRM_CAP_DUMB_PREFER_SHADOW: u64 = 0x4;
pub const DRM_CAP_PRIME: u64 = 0x5;
pub const DRM_CAP_TIMESTAMP_MONOTONIC: u64 = 0x6;
pub const DRM_CAP_ASYNC_PAGE_FLIP: u64 = 0x7;
pub const DRM_CAP_CURSOR_WIDTH: u64 = 0x8;
pub const DRM_CAP_CURSOR_HEIGHT: u64 = 0x9;
pub const DRM_CAP_ADDFB2_MODIFIERS: u64 = 0x10;

pub const DRM_PRIME_CAP_IMPORT: u64 = 0x1;
pub const DRM_PRIME_CAP_EXPORT: u64 = 0x2;

/// `ADDFB2`'s flag bit meaning the `modifier` array is populated; with it
/// clear the modifier is always overridden to `DRM_FORMAT_MOD_LINEAR`.
pub const DRM_MODE_FB_MODIFIERS: u32 = 0x2;

pub const DRM_CLIENT_CAP_STEREO_3D: u64 = 0x1;
pub const DRM_CLIENT_CAP_UNIVERSAL_PLANES: u64 = 0x2;
pub const DRM_CLIENT_CAP_ATOMIC: u64 = 0x3;

pub const DRM_MODE_CURSOR_BO: u32 = 0x1;
pub const DRM_MODE_CURSOR_MOVE: u32 = 0x2;

pub const DRM_MODE_PAGE_FLIP_EVENT: u32 = 0x01;
pub const DRM_MODE_PAGE_FLIP_ASYNC: u32 = 0x02;

pub const DRM_MODE_ATOMIC_TEST_ONLY: u32 = 0x0100;
pub const DRM_MODE_ATOMIC_NONBLOCK: u32 = 0x0200;
pub const DRM_MODE_ATOMIC_ALLOW_MODESET: u32 = 0x0400;
pub const DRM_MODE_PAGE_FLIP_EVENT_FLAG: u32 = DRM_MODE_PAGE_FLIP_EVENT;
pub const DRM_MODE_ATOMIC_FLAG_MASK: u32 = DRM_MODE_ATOMIC_TEST_ONLY
    | DRM_MODE_ATOMIC_NONBLOCK
    | DRM_MODE_ATOMIC_ALLOW_MODESET
    | DRM_MODE_PAGE_FLIP_EVENT_FLAG
    | DRM_MODE_PAGE_FLIP_ASYNC;

pub const DRM_FORMAT_MOD_LINEAR: u64 = 0;

/// `DRM_MODE_OBJECT_ANY`: the wire sentinel an `Object`-kind property
/// reports in `MODE_GETPROPERTY`'s `values_out[0]` when it accepts any
/// mode-object kind, instead of one of [`ObjectKind`](crate::object::ObjectKind)'s own tags.
pub const DRM_MODE_OBJECT_ANY: u32 = 0;

use crate::modes::ModeInfo;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmVersion {
    pub version_major: i32,
    pub version_minor: i32,
    pub version_patchlevel: i32,
    pub name_len: u64,
    pub name: u64,
    pub date_len: u64,
    pub date: u64,
    pub desc_len: u64,
    pub desc: u64,
}

impl DrmVersion {
    pub fn is_first_call(&self) -> bool {
        self.name == 0 && self.date == 0 && self.desc == 0
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmGetCap {
    pub capability: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmSetClientCap {
    pub capability: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeGetResources {
    pub fb_id_ptr: u64,
    pub crtc_id_ptr: u64,
    pub connector_id_ptr: u64,
    pub encoder_id_ptr: u64,

    pub count_fbs: u32,
    pub count_crtcs: u32,
    pub count_connectors: u32,
    pub count_encoders: u32,

    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
}

impl DrmModeGetResources {
    pub fn is_first_call(&self) -> bool {
        self.fb_id_ptr == 0
            && self.crtc_id_ptr == 0
            && self.connector_id_ptr == 0
            && self.encoder_id_ptr == 0
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeCrtc {
    pub set_connectors_ptr: u64,
    pub count_connectors: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub x: u32,
    pub y: u32,
    pub gamma_size: u32,
    pub mode_valid: u32,
    pub mode: ModeInfo,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeCursor {
    pub flags: u32,
    pub crtc_id: u32,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub handle: u32,
    pub hot_x: i32,
    pub hot_y: i32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeGetEncoder {
    pub encoder_id: u32,
    pub encoder_type: u32,
    pub crtc_id: u32,
    pub possible_crtcs: u32,
    pub possible_clones: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeGetConnector {
    pub encoders_ptr: u64,
    pub modes_ptr: u64,
    pub props_ptr: u64,
    pub prop_values_ptr: u64,

    pub count_modes: u32,
    pub count_props: u32,
    pub count_encoders: u32,

    pub encoder_id: u32,
    pub connector_id: u32,
    pub connector_type: u32,
    pub connector_type_id: u32,
    pub connection: u32,
    pub mm_width: u32,
    pub mm_height: u32,
    pub subpixel: u32,
    pub pad: u32,
}

impl DrmModeGetConnector {
    pub fn is_first_call(&self) -> bool {
        self.encoders_ptr == 0
            && self.modes_ptr == 0
            && self.props_ptr == 0
            && self.prop_values_ptr == 0
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeGetProperty {
    pub values_ptr: u64,
    pub enum_blob_ptr: u64,
    pub prop_id: u32,
    pub flags: u32,
    pub name: [u8; DRM_PROP_NAME_LEN],
    pub count_values: u32,
    pub count_enum_blobs: u32,
}

impl DrmModeGetProperty {
    pub fn is_first_call(&self) -> bool {
        self.values_ptr == 0 && self.enum_blob_ptr == 0
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeConnectorSetProperty {
    pub value: u64,
    pub prop_id: u32,
    pub connector_id: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Hash, Eq, PartialEq, Pod, Zeroable)]
pub struct DrmModeGetBlob {
    pub blob_id: u32,
    pub length: u32,
    pub data: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeFbCmd {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub bpp: u32,
    pub depth: u32,
    pub handle: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeFbCmd2 {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
    pub flags: u32,
    pub handles: [u32; 4],
    pub pitches: [u32; 4],
    pub offsets: [u32; 4],
    pub modifier: [u64; 4],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeGetFb2 {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
    pub flags: u32,
    pub handles: [u32; 4],
    pub pitches: [u32; 4],
    pub offsets: [u32; 4],
    pub modifier: [u64; 4],
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeFbDirtyCmd {
    pub fb_id: u32,
    pub flags: u32,
    pub color: u32,
    pub num_clips: u32,
    pub clips_ptr: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeCreateDumb {
    pub height: u32,
    pub width: u32,
    pub bpp: u32,
    pub flags: u32,
    pub handle: u32,
    pub pitch: u32,
    pub size: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeMapDumb {
    pub handle: u32,
    pub pad: u32,
    pub offset: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeDestroyDumb {
    pub handle: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmGemClose {
    pub handle: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeGetPlaneRes {
    pub plane_id_ptr: u64,
    pub count_planes: u32,
}

impl DrmModeGetPlaneRes {
    pub fn is_first_call(&self) -> bool {
        self.plane_id_ptr == 0
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeGetPlane {
    pub plane_id: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub possible_crtcs: u32,
    pub gamma_size: u32,
    pub count_format_types: u32,
    pub format_type_ptr: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeObjectGetProps {
    pub props_ptr: u64,
    pub prop_values_ptr: u64,
    pub count_props: u32,
    pub obj_id: u32,
    pub obj_type: u32,
}

impl DrmModeObjectGetProps {
    pub fn is_first_call(&self) -> bool {
        self.props_ptr == 0 && self.prop_values_ptr == 0
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeAtomic {
    pub flags: u32,
    pub count_objs: u32,
    pub objs_ptr: u64,
    pub count_props_ptr: u64,
    pub props_ptr: u64,
    pub prop_values_ptr: u64,
    pub reserved: u64,
    pub user_data: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModePageFlip {
    pub crtc_id: u32,
    pub fb_id: u32,
    pub flags: u32,
    pub reserved: u32,
    pub user_data: u64,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeCreateBlob {
    pub data: u64,
    pub length: u32,
    pub blob_id: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmModeDestroyBlob {
    pub blob_id: u32,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmPrimeHandle {
    pub handle: u32,
    pub flags: u32,
    pub fd: i32,
}

/// `drm_event_vblank`, the wire layout every posted event is serialized
/// into before a client's `read` call copies it out.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, Pod, Zeroable)]
pub struct DrmEventVblank {
    pub base_type: u32,
    pub base_length: u32,
    pub user_data: u64,
    pub tv_sec: u32,
    pub tv_usec: u32,
    pub sequence: u32,
    pub crtc_id: u32,
}

pub const DRM_EVENT_VBLANK: u32 = 0x01;
pub const DRM_EVENT_FLIP_COMPLETE: u32 = 0x02;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_first_call_only_when_all_out_pointers_are_zero() {
        let mut v = DrmVersion::default();
        assert!(v.is_first_call());
        v.name = 0x1000;
        assert!(!v.is_first_call());
    }

    #[test]
    fn event_vblank_is_exactly_the_wire_size() {
        assert_eq!(std::mem::size_of::<DrmEventVblank>(), 32);
    }
}
