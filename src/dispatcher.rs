// SPDX-License-Identifier: MPL-2.0

//! The ioctl dispatcher: one method per DRM/KMS request, operating on a
//! single `File`'s conversation with the device.
//!
//! A real ioctl entry point receives a fixed-size head struct plus, for the
//! "query size then fill" commands, pointers into shared memory the host
//! has already mapped for this call. This crate never touches raw pointers:
//! the host-side shim that owns the actual ioctl syscall surface resolves
//! those pointers into plain Rust slices before calling through here, and
//! copies the (possibly truncated) results back out afterward. Each method
//! below always reports the *true* count in the head struct; it only
//! writes as many elements into an output slice as that slice has room
//! for, exactly like the real kernel ABI's first-call/second-call idiom
//! (see [`crate::wire::DrmVersion::is_first_call`] and friends).
//!
//! | wire command | method |
//! |---|---|
//! | `VERSION` | [`Dispatcher::version`] |
//! | `GET_CAP` | [`Dispatcher::get_cap`] |
//! | `SET_CLIENT_CAP` | [`Dispatcher::set_client_cap`] |
//! | `MODE_GETRESOURCES` | [`Dispatcher::mode_getresources`] |
//! | `MODE_GETCONNECTOR` | [`Dispatcher::mode_getconnector`] |
//! | `MODE_GETENCODER` | [`Dispatcher::mode_getencoder`] |
//! | `MODE_GETPLANE` | [`Dispatcher::mode_getplane`] |
//! | `MODE_GETPLANERESOURCES` | [`Dispatcher::mode_getplaneresources`] |
//! | `MODE_GETCRTC` | [`Dispatcher::mode_getcrtc`] |
//! | `MODE_SETCRTC` | [`Dispatcher::mode_setcrtc`] |
//! | `MODE_ADDFB` | [`Dispatcher::mode_addfb`] |
//! | `MODE_ADDFB2` | [`Dispatcher::mode_addfb2`] |
//! | `MODE_GETFB2` | [`Dispatcher::mode_getfb2`] |
//! | `MODE_RMFB` | [`Dispatcher::mode_rmfb`] |
//! | `MODE_DIRTYFB` | [`Dispatcher::mode_dirtyfb`] |
//! | `MODE_CREATE_DUMB` | [`Dispatcher::mode_create_dumb`] |
//! | `MODE_MAP_DUMB` | [`Dispatcher::mode_map_dumb`] |
//! | `MODE_DESTROY_DUMB` / `GEM_CLOSE` | [`Dispatcher::mode_destroy_dumb`] / [`Dispatcher::gem_close`] |
//! | `MODE_CURSOR` / `MODE_CURSOR2` | [`Dispatcher::mode_cursor`] / [`Dispatcher::mode_cursor2`] |
//! | `MODE_PAGE_FLIP` | [`Dispatcher::mode_page_flip`] |
//! | `MODE_OBJ_GETPROPERTIES` | [`Dispatcher::mode_obj_getproperties`] |
//! | `MODE_GETPROPERTY` | [`Dispatcher::mode_getproperty`] |
//! | `MODE_SETPROPERTY` | [`Dispatcher::mode_setproperty`] |
//! | `MODE_GETPROPBLOB` | [`Dispatcher::mode_getpropblob`] |
//! | `MODE_CREATEPROPBLOB` | [`Dispatcher::mode_createpropblob`] |
//! | `MODE_DESTROYPROPBLOB` | [`Dispatcher::mode_destroypropblob`] |
//! | `MODE_ATOMIC` | [`Dispatcher::mode_atomic`] |
//! | `PRIME_HANDLE_TO_FD` | [`Dispatcher::prime_handle_to_fd`] |
//! | `PRIME_FD_TO_HANDLE` | [`Dispatcher::prime_fd_to_handle`] |
//!
//! Unknown commands are not this module's concern: the host shim logs and
//! drops them before ever reaching a `Dispatcher` method, per the wire
//! contract's "unknown commands: log and dismiss" rule.

use std::sync::Arc;

use log::{debug, trace};

use crate::commit;
use crate::device::{Device, PrimeCredential};
use crate::error::{Error, Result};
use crate::file::{File, FlipCompleteEvent};
use crate::format;
use crate::modes::ModeInfo;
use crate::object::{ModeObject, ObjectKind};
use crate::prime::PrimeFile;
use crate::property::{Assignment, AssignmentValue, Property, PropertyId, PropertyKind};
use crate::transport::Transport;
use crate::wire::*;

fn copy_into<T: Copy>(src: &[T], dst: &mut [T]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
}

/// Resolves `id` against every mode-object table the dispatcher can point
/// a property at (`Object` properties include `FB_ID`, which `lookup_generic`
/// alone does not cover).
fn resolve_object_kind(device: &Device, id: u32) -> Option<ObjectKind> {
    if device.crtc(id).is_some() {
        Some(ObjectKind::Crtc)
    } else if device.plane(id).is_some() {
        Some(ObjectKind::Plane)
    } else if device.connector(id).is_some() {
        Some(ObjectKind::Connector)
    } else if device.encoder(id).is_some() {
        Some(ObjectKind::Encoder)
    } else if device.framebuffer(id).is_some() {
        Some(ObjectKind::Framebuffer)
    } else {
        None
    }
}

/// Converts a raw wire value into the typed `AssignmentValue` a property's
/// kind expects, resolving object and blob references against the device.
fn to_assignment_value(device: &Device, property: &Property, raw: u64) -> Result<AssignmentValue> {
    Ok(match property.kind() {
        PropertyKind::IntRange { .. } | PropertyKind::IntSignedRange { .. } | PropertyKind::Enum(_) => {
            AssignmentValue::Int(raw)
        }
        PropertyKind::Object(_) => {
            if raw == 0 {
                AssignmentValue::Null
            } else {
                let kind = resolve_object_kind(device, raw as u32).ok_or(Error::NoSuchObject(raw as u32))?;
                AssignmentValue::Object(kind, raw as u32)
            }
        }
        PropertyKind::Blob => {
            if raw == 0 {
                AssignmentValue::Blob(None)
            } else {
                let blob = device.find_blob(raw as u32).ok_or(Error::NoSuchBlob(raw as u32))?;
                AssignmentValue::Blob(Some(blob.data.clone()))
            }
        }
    })
}

/// One open file's view onto the dispatcher: every method here borrows the
/// `File` and `Transport` a single conversation is bound to.
pub struct Dispatcher {
    file: Arc<File>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(file: Arc<File>, transport: Arc<dyn Transport>) -> Self {
        Self { file, transport }
    }

    pub fn file(&self) -> &Arc<File> {
        &self.file
    }

    fn device(&self) -> &Arc<Device> {
        self.file.device()
    }

    // ----- identification -----

    pub fn version(
        &self,
        req: &mut DrmVersion,
        name_buf: &mut [u8],
        date_buf: &mut [u8],
        desc_buf: &mut [u8],
    ) -> Result<()> {
        trace!("dispatch: VERSION");
        let device = self.device();
        let (major, minor, patch) = device.driver_version();
        req.version_major = major as i32;
        req.version_minor = minor as i32;
        req.version_patchlevel = patch as i32;
        let (name, desc, date) = device.driver_info();
        req.name_len = name.len() as u64;
        req.date_len = date.len() as u64;
        req.desc_len = desc.len() as u64;
        copy_into(name.as_bytes(), name_buf);
        copy_into(date.as_bytes(), date_buf);
        copy_into(desc.as_bytes(), desc_buf);
        Ok(())
    }

    pub fn get_cap(&self, req: &mut DrmGetCap) -> Result<()> {
        trace!("dispatch: GET_CAP {:#x}", req.capability);
        let device = self.device();
        let value = match req.capability {
            DRM_CAP_DUMB_BUFFER => 1,
            DRM_CAP_TIMESTAMP_MONOTONIC => 1,
            DRM_CAP_VBLANK_HIGH_CRTC => 1,
            DRM_CAP_PRIME => DRM_PRIME_CAP_IMPORT | DRM_PRIME_CAP_EXPORT,
            DRM_CAP_CURSOR_WIDTH => device.limits.cursor_width as u64,
            DRM_CAP_CURSOR_HEIGHT => device.limits.cursor_height as u64,
            DRM_CAP_ADDFB2_MODIFIERS => device.limits.addfb2_modifiers_supported as u64,
            _ => {
                req.value = 0;
                return Err(Error::UnknownCapability(req.capability));
            }
        };
        req.value = value;
        Ok(())
    }

    pub fn set_client_cap(&self, req: &DrmSetClientCap) -> Result<()> {
        trace!("dispatch: SET_CLIENT_CAP {:#x}={}", req.capability, req.value);
        match req.capability {
            DRM_CLIENT_CAP_ATOMIC => {
                self.file.set_atomic(req.value != 0);
                Ok(())
            }
            DRM_CLIENT_CAP_UNIVERSAL_PLANES => {
                self.file.set_universal_planes(req.value != 0);
                Ok(())
            }
            DRM_CLIENT_CAP_STEREO_3D => Err(Error::InvalidFlags("stereo_3d is not a supported client cap")),
            _ => Err(Error::UnknownCapability(req.capability)),
        }
    }

    // ----- resource enumeration -----

    pub fn mode_getresources(
        &self,
        req: &mut DrmModeGetResources,
        fb_ids: &mut [u32],
        crtc_ids: &mut [u32],
        connector_ids: &mut [u32],
        encoder_ids: &mut [u32],
    ) -> Result<()> {
        trace!("dispatch: MODE_GETRESOURCES");
        let device = self.device();
        let fbs = self.file.framebuffer_ids();
        let crtcs = device.crtc_ids();
        let connectors = device.connector_ids();
        let encoders = device.encoder_ids();

        req.count_fbs = fbs.len() as u32;
        req.count_crtcs = crtcs.len() as u32;
        req.count_connectors = connectors.len() as u32;
        req.count_encoders = encoders.len() as u32;
        copy_into(&fbs, fb_ids);
        copy_into(&crtcs, crtc_ids);
        copy_into(&connectors, connector_ids);
        copy_into(&encoders, encoder_ids);

        req.min_width = device.limits.min_width;
        req.min_height = device.limits.min_height;
        req.max_width = if device.limits.max_width == 0 { 16384 } else { device.limits.max_width };
        req.max_height = if device.limits.max_height == 0 { 16384 } else { device.limits.max_height };
        Ok(())
    }

    pub fn mode_getplaneresources(&self, req: &mut DrmModeGetPlaneRes, plane_ids: &mut [u32]) -> Result<()> {
        trace!("dispatch: MODE_GETPLANERESOURCES");
        let device = self.device();
        let mut ids = Vec::new();
        for crtc_id in device.crtc_ids() {
            if let Some(crtc) = device.crtc(crtc_id) {
                ids.push(crtc.primary_plane);
                if let Some(cursor) = crtc.cursor_plane {
                    ids.push(cursor);
                }
            }
        }
        req.count_planes = ids.len() as u32;
        copy_into(&ids, plane_ids);
        Ok(())
    }

    // ----- per-object queries -----

    pub fn mode_getconnector(
        &self,
        req: &mut DrmModeGetConnector,
        encoder_ids: &mut [u32],
        modes: &mut [ModeInfo],
        prop_ids: &mut [u32],
        prop_values: &mut [u64],
    ) -> Result<()> {
        trace!("dispatch: MODE_GETCONNECTOR {}", req.connector_id);
        let device = self.device();
        let connector = device.connector(req.connector_id).ok_or(Error::NoSuchObject(req.connector_id))?;

        if req.count_modes == 0 {
            // First call: re-probe the connector's live status. The mode
            // list itself is fixed at registration time in this core, so
            // a probe's reported modes are informational only.
            let probe = device.driver().probe_connector(connector.id)?;
            *connector.status.lock().unwrap() = probe.status;
        }

        let status = *connector.status.lock().unwrap();
        req.connection = status.wire_value();
        req.connector_type = connector.connector_type;
        req.connector_type_id = 0;
        req.mm_width = connector.mm_width;
        req.mm_height = connector.mm_height;
        req.subpixel = connector.subpixel;
        req.encoder_id = connector.current_encoder.lock().unwrap().unwrap_or(0);
        req.count_modes = connector.modes.len() as u32;
        req.count_encoders = connector.possible_encoders.len() as u32;

        let props = connector.properties();
        req.count_props = props.len() as u32;
        let pairs: Vec<(u32, u64)> = props
            .iter()
            .map(|(id, value)| (device.property(*id).object_id, *value))
            .collect();
        let ids: Vec<u32> = pairs.iter().map(|(id, _)| *id).collect();
        let values: Vec<u64> = pairs.iter().map(|(_, v)| *v).collect();

        copy_into(&connector.possible_encoders, encoder_ids);
        copy_into(&connector.modes, modes);
        copy_into(&ids, prop_ids);
        copy_into(&values, prop_values);
        Ok(())
    }

    pub fn mode_getencoder(&self, req: &mut DrmModeGetEncoder) -> Result<()> {
        trace!("dispatch: MODE_GETENCODER {}", req.encoder_id);
        let device = self.device();
        let encoder = device.encoder(req.encoder_id).ok_or(Error::NoSuchObject(req.encoder_id))?;
        req.crtc_id = encoder.crtc.lock().unwrap().unwrap_or(0);
        req.possible_crtcs = encoder.possible_crtcs;
        req.possible_clones = encoder.possible_clones;
        Ok(())
    }

    pub fn mode_getplane(&self, req: &mut DrmModeGetPlane, format_types: &mut [u32]) -> Result<()> {
        trace!("dispatch: MODE_GETPLANE {}", req.plane_id);
        let device = self.device();
        let plane = device.plane(req.plane_id).ok_or(Error::NoSuchObject(req.plane_id))?;
        let state = plane.state.lock().unwrap();
        req.possible_crtcs = plane.possible_crtcs;
        req.crtc_id = state.crtc.unwrap_or(0);
        req.fb_id = state.fb.unwrap_or(0);
        req.gamma_size = 0;
        req.count_format_types = plane.formats.len() as u32;
        copy_into(&plane.formats, format_types);
        Ok(())
    }

    pub fn mode_getcrtc(&self, req: &mut DrmModeCrtc) -> Result<()> {
        trace!("dispatch: MODE_GETCRTC {}", req.crtc_id);
        let device = self.device();
        let crtc = device.crtc(req.crtc_id).ok_or(Error::NoSuchObject(req.crtc_id))?;
        req.gamma_size = crtc.gamma_size;

        let mode_blob = crtc.state.lock().unwrap().mode.clone();
        match mode_blob {
            Some(bytes) => {
                req.mode = *bytemuck::from_bytes(&bytes);
                req.mode_valid = 1;
                let primary = device.plane(crtc.primary_plane).ok_or(Error::NoSuchObject(crtc.primary_plane))?;
                let pstate = primary.state.lock().unwrap();
                req.x = pstate.src_x >> 16;
                req.y = pstate.src_y >> 16;
                req.fb_id = pstate.fb.unwrap_or(0);
            }
            None => {
                req.mode_valid = 0;
                req.fb_id = 0;
            }
        }
        Ok(())
    }

    // ----- legacy mode-set -----

    /// Legacy `SETCRTC`: translates `(fb, connectors, mode)` into a fixed
    /// assignment batch and drives it through the same commit engine an
    /// atomic client would use. `connector_ids` is the host-resolved
    /// `set_connectors_ptr` array; `req.mode_valid == 0` means "disable".
    pub fn mode_setcrtc(&self, req: &DrmModeCrtc, connector_ids: &[u32]) -> Result<()> {
        trace!("dispatch: MODE_SETCRTC {}", req.crtc_id);
        let device = self.device();
        let crtc = device.crtc(req.crtc_id).ok_or(Error::NoSuchObject(req.crtc_id))?;

        let active = device.property(PropertyId::Active).clone();
        let mode_id = device.property(PropertyId::ModeId).clone();
        let mut assignments = vec![];

        if req.mode_valid == 0 {
            assignments.push(Assignment::int(crtc.id, ObjectKind::Crtc, active, 0));
            assignments.push(Assignment::blob(crtc.id, ObjectKind::Crtc, mode_id, None));
            assignments.push(Assignment::null_object(
                crtc.primary_plane,
                ObjectKind::Plane,
                device.property(PropertyId::FbId).clone(),
            ));
            assignments.push(Assignment::null_object(
                crtc.primary_plane,
                ObjectKind::Plane,
                device.property(PropertyId::CrtcId).clone(),
            ));
            return commit::commit_sync(device, &assignments).map(|_| ());
        }
        let mode: &ModeInfo = &req.mode;

        let mode_bytes: Arc<[u8]> = Arc::from(bytemuck::bytes_of(mode).to_vec().into_boxed_slice());
        assignments.push(Assignment::int(crtc.id, ObjectKind::Crtc, active, 1));
        assignments.push(Assignment::blob(crtc.id, ObjectKind::Crtc, mode_id, Some(mode_bytes)));

        let primary = crtc.primary_plane;
        let fb_prop = device.property(PropertyId::FbId).clone();
        let fb_value = if req.fb_id == 0 {
            AssignmentValue::Null
        } else {
            AssignmentValue::Object(ObjectKind::Framebuffer, req.fb_id)
        };
        assignments.push(Assignment {
            object_id: primary,
            object_kind: ObjectKind::Plane,
            property: fb_prop,
            value: fb_value,
        });
        assignments.push(Assignment::int(
            primary,
            ObjectKind::Plane,
            device.property(PropertyId::SrcX).clone(),
            (req.x as u64) << 16,
        ));
        assignments.push(Assignment::int(
            primary,
            ObjectKind::Plane,
            device.property(PropertyId::SrcY).clone(),
            (req.y as u64) << 16,
        ));
        assignments.push(Assignment::int(
            primary,
            ObjectKind::Plane,
            device.property(PropertyId::SrcW).clone(),
            (mode.hdisplay as u64) << 16,
        ));
        assignments.push(Assignment::int(
            primary,
            ObjectKind::Plane,
            device.property(PropertyId::SrcH).clone(),
            (mode.vdisplay as u64) << 16,
        ));
        assignments.push(Assignment::int(primary, ObjectKind::Plane, device.property(PropertyId::CrtcX).clone(), 0));
        assignments.push(Assignment::int(primary, ObjectKind::Plane, device.property(PropertyId::CrtcY).clone(), 0));
        assignments.push(Assignment::int(
            primary,
            ObjectKind::Plane,
            device.property(PropertyId::CrtcW).clone(),
            mode.hdisplay as u64,
        ));
        assignments.push(Assignment::int(
            primary,
            ObjectKind::Plane,
            device.property(PropertyId::CrtcH).clone(),
            mode.vdisplay as u64,
        ));

        let crtc_id_prop = device.property(PropertyId::CrtcId).clone();
        assignments.push(Assignment::object(
            primary,
            ObjectKind::Plane,
            crtc_id_prop.clone(),
            ObjectKind::Crtc,
            crtc.id,
        ));
        for &connector_id in connector_ids {
            assignments.push(Assignment::object(
                connector_id,
                ObjectKind::Connector,
                crtc_id_prop.clone(),
                ObjectKind::Crtc,
                crtc.id,
            ));
        }

        commit::commit_sync(device, &assignments)?;
        Ok(())
    }

    // ----- framebuffers -----

    pub fn mode_addfb(&self, req: &mut DrmModeFbCmd) -> Result<()> {
        trace!("dispatch: MODE_ADDFB handle={}", req.handle);
        let bo = self.file.resolve_handle(req.handle).ok_or(Error::UnknownHandle(req.handle))?;
        let fourcc = format::convert_legacy_format(req.bpp, req.depth)?;
        let fb = self
            .device()
            .create_framebuffer(bo, req.width, req.height, req.pitch, fourcc, DRM_FORMAT_MOD_LINEAR)?;
        self.file.attach_framebuffer(fb.id);
        req.fb_id = fb.id;
        Ok(())
    }

    pub fn mode_addfb2(&self, req: &mut DrmModeFbCmd2) -> Result<()> {
        trace!("dispatch: MODE_ADDFB2 handle={}", req.handles[0]);
        let bo = self.file.resolve_handle(req.handles[0]).ok_or(Error::UnknownHandle(req.handles[0]))?;
        let modifier = if req.flags & DRM_MODE_FB_MODIFIERS != 0 {
            req.modifier[0]
        } else {
            DRM_FORMAT_MOD_LINEAR
        };
        let fb = self.device().create_framebuffer(
            bo,
            req.width,
            req.height,
            req.pitches[0],
            req.pixel_format,
            modifier,
        )?;
        self.file.attach_framebuffer(fb.id);
        req.fb_id = fb.id;
        Ok(())
    }

    pub fn mode_getfb2(&self, req: &mut DrmModeGetFb2) -> Result<()> {
        trace!("dispatch: MODE_GETFB2 {}", req.fb_id);
        let fb = self.device().framebuffer(req.fb_id).ok_or(Error::NoSuchObject(req.fb_id))?;
        req.width = fb.width;
        req.height = fb.height;
        req.pixel_format = fb.fourcc;
        req.modifier = [fb.modifier, 0, 0, 0];
        req.handles = [fb.bo.id, 0, 0, 0];
        req.pitches = [fb.pitch, 0, 0, 0];
        req.offsets = [0, 0, 0, 0];
        Ok(())
    }

    pub fn mode_rmfb(&self, fb_id: u32) -> Result<()> {
        trace!("dispatch: MODE_RMFB {fb_id}");
        if !self.file.detach_framebuffer(fb_id) {
            return Err(Error::NoSuchObject(fb_id));
        }
        Ok(())
    }

    pub fn mode_dirtyfb(&self, req: &DrmModeFbDirtyCmd) -> Result<()> {
        trace!("dispatch: MODE_DIRTYFB {}", req.fb_id);
        self.device().framebuffer(req.fb_id).ok_or(Error::NoSuchObject(req.fb_id))?;
        self.device().driver().notify_dirty(req.fb_id)
    }

    // ----- dumb buffers -----

    pub fn mode_create_dumb(&self, req: &mut DrmModeCreateDumb) -> Result<()> {
        trace!("dispatch: MODE_CREATE_DUMB {}x{}x{}", req.width, req.height, req.bpp);
        let bo = self.device().create_dumb(req.width, req.height, req.bpp)?;
        req.pitch = bo.pitch;
        req.size = bo.size;
        req.handle = self.file.create_handle(bo)?;
        Ok(())
    }

    pub fn mode_map_dumb(&self, req: &mut DrmModeMapDumb) -> Result<()> {
        trace!("dispatch: MODE_MAP_DUMB {}", req.handle);
        let bo = self.file.resolve_handle(req.handle).ok_or(Error::UnknownHandle(req.handle))?;
        req.offset = self.device().install_mapping(&bo)?;
        Ok(())
    }

    pub fn mode_destroy_dumb(&self, req: &DrmModeDestroyDumb) -> Result<()> {
        trace!("dispatch: MODE_DESTROY_DUMB {}", req.handle);
        self.file.close_handle(req.handle).ok_or(Error::UnknownHandle(req.handle))?;
        Ok(())
    }

    pub fn gem_close(&self, req: &DrmGemClose) -> Result<()> {
        trace!("dispatch: GEM_CLOSE {}", req.handle);
        self.file.close_handle(req.handle).ok_or(Error::UnknownHandle(req.handle))?;
        Ok(())
    }

    // ----- cursor -----

    pub fn mode_cursor(&self, req: &DrmModeCursor) -> Result<()> {
        trace!("dispatch: MODE_CURSOR crtc={}", req.crtc_id);
        self.cursor_common(req)
    }

    /// `CURSOR2` carries a hotspot (`hot_x`/`hot_y`); this core only
    /// forwards it to drivers that advertise `CURSOR_HOTSPOT`, which none
    /// of its bundled test doubles do, so it is accepted and ignored here.
    pub fn mode_cursor2(&self, req: &DrmModeCursor) -> Result<()> {
        trace!("dispatch: MODE_CURSOR2 crtc={}", req.crtc_id);
        self.cursor_common(req)
    }

    fn cursor_common(&self, req: &DrmModeCursor) -> Result<()> {
        let device = self.device();
        let crtc = device.crtc(req.crtc_id).ok_or(Error::NoSuchObject(req.crtc_id))?;
        let cursor_plane = crtc.cursor_plane.ok_or(Error::NoCursorPlane(req.crtc_id))?;

        let mut assignments = Vec::new();
        if req.flags & DRM_MODE_CURSOR_BO != 0 {
            let fb_prop = device.property(PropertyId::FbId).clone();
            if req.handle == 0 {
                assignments.push(Assignment::null_object(cursor_plane, ObjectKind::Plane, fb_prop));
            } else {
                let bo = self.file.resolve_handle(req.handle).ok_or(Error::UnknownHandle(req.handle))?;
                let fb = device.create_framebuffer(
                    bo,
                    req.width,
                    req.height,
                    req.width * 4,
                    format::FOURCC_ARGB8888,
                    DRM_FORMAT_MOD_LINEAR,
                )?;
                self.file.attach_framebuffer(fb.id);
                assignments.push(Assignment::object(
                    cursor_plane,
                    ObjectKind::Plane,
                    fb_prop,
                    ObjectKind::Framebuffer,
                    fb.id,
                ));
                assignments.push(Assignment::int(
                    cursor_plane,
                    ObjectKind::Plane,
                    device.property(PropertyId::SrcW).clone(),
                    (req.width as u64) << 16,
                ));
                assignments.push(Assignment::int(
                    cursor_plane,
                    ObjectKind::Plane,
                    device.property(PropertyId::SrcH).clone(),
                    (req.height as u64) << 16,
                ));
            }
        }
        if req.flags & DRM_MODE_CURSOR_MOVE != 0 {
            assignments.push(Assignment::int(
                cursor_plane,
                ObjectKind::Plane,
                device.property(PropertyId::CrtcX).clone(),
                req.x as u64,
            ));
            assignments.push(Assignment::int(
                cursor_plane,
                ObjectKind::Plane,
                device.property(PropertyId::CrtcY).clone(),
                req.y as u64,
            ));
        }
        if assignments.is_empty() {
            return Ok(());
        }
        commit::commit_sync(device, &assignments)?;
        Ok(())
    }

    // ----- page flip -----

    pub fn mode_page_flip(&self, req: &DrmModePageFlip) -> Result<()> {
        trace!("dispatch: MODE_PAGE_FLIP crtc={}", req.crtc_id);
        let device = self.device();
        let crtc = device.crtc(req.crtc_id).ok_or(Error::NoSuchObject(req.crtc_id))?;

        let assignments = vec![
            Assignment::object(
                crtc.primary_plane,
                ObjectKind::Plane,
                device.property(PropertyId::FbId).clone(),
                ObjectKind::Framebuffer,
                req.fb_id,
            ),
            Assignment::object(
                crtc.primary_plane,
                ObjectKind::Plane,
                device.property(PropertyId::CrtcId).clone(),
                ObjectKind::Crtc,
                crtc.id,
            ),
        ];

        let want_event = req.flags & DRM_MODE_PAGE_FLIP_EVENT != 0;
        let touched = commit::commit_sync(device, &assignments)?;
        if want_event {
            let timestamp_ns = self.transport.monotonic_now_ns();
            for crtc_id in touched {
                self.file.post_event(FlipCompleteEvent {
                    crtc_id,
                    user_data: req.user_data,
                    timestamp_ns,
                });
            }
        }
        Ok(())
    }

    // ----- generic property access -----

    pub fn mode_obj_getproperties(
        &self,
        req: &mut DrmModeObjectGetProps,
        prop_ids: &mut [u32],
        prop_values: &mut [u64],
    ) -> Result<()> {
        trace!("dispatch: MODE_OBJ_GETPROPERTIES {}", req.obj_id);
        let device = self.device();
        let props = match device.lookup_generic(req.obj_id) {
            Some((_, props)) => props,
            None if device.encoder(req.obj_id).is_some()
                || device.framebuffer(req.obj_id).is_some() =>
            {
                debug!("object {} carries no queryable properties", req.obj_id);
                std::collections::HashMap::new()
            }
            None => return Err(Error::NoSuchObject(req.obj_id)),
        };

        req.count_props = props.len() as u32;
        let pairs: Vec<(u32, u64)> = props
            .iter()
            .map(|(id, value)| (device.property(*id).object_id, *value))
            .collect();
        let ids: Vec<u32> = pairs.iter().map(|(id, _)| *id).collect();
        let values: Vec<u64> = pairs.iter().map(|(_, v)| *v).collect();
        copy_into(&ids, prop_ids);
        copy_into(&values, prop_values);
        Ok(())
    }

    /// `values_out` mirrors the wire `values_ptr` array: a range property's
    /// `[min, max]`, or (redundantly with `enum_out`) an enum's raw values.
    /// `enum_out` mirrors `enum_blob_ptr`'s array of `(value, name)` pairs.
    pub fn mode_getproperty(
        &self,
        req: &mut DrmModeGetProperty,
        values_out: &mut [u64],
        enum_out: &mut [(u64, [u8; DRM_PROP_NAME_LEN])],
    ) -> Result<()> {
        trace!("dispatch: MODE_GETPROPERTY {}", req.prop_id);
        let device = self.device();
        let property = device.property_by_object_id(req.prop_id).ok_or(Error::NoSuchObject(req.prop_id))?;
        req.name = property.name_bytes();
        req.flags = property.flags();
        req.count_values = property.count_values();
        req.count_enum_blobs = property.count_enum_blobs();

        match property.kind() {
            PropertyKind::IntRange { min, max } => copy_into(&[*min, *max], values_out),
            PropertyKind::IntSignedRange { min, max } => copy_into(&[*min as u64, *max as u64], values_out),
            PropertyKind::Enum(entries) => {
                let values: Vec<u64> = entries.iter().map(|(v, _)| *v).collect();
                copy_into(&values, values_out);
                let pairs: Vec<(u64, [u8; DRM_PROP_NAME_LEN])> = entries
                    .iter()
                    .map(|(value, name)| {
                        let mut buf = [0u8; DRM_PROP_NAME_LEN];
                        let bytes = name.as_bytes();
                        let len = bytes.len().min(DRM_PROP_NAME_LEN - 1);
                        buf[..len].copy_from_slice(&bytes[..len]);
                        (*value, buf)
                    })
                    .collect();
                copy_into(&pairs, enum_out);
            }
            PropertyKind::Object(allowed) => copy_into(&[allowed.wire_value() as u64], values_out),
            PropertyKind::Blob => {}
        }
        Ok(())
    }

    pub fn mode_setproperty(&self, req: &DrmModeConnectorSetProperty) -> Result<()> {
        trace!("dispatch: MODE_SETPROPERTY connector={} prop={}", req.connector_id, req.prop_id);
        let device = self.device();
        let connector = device.connector(req.connector_id).ok_or(Error::NoSuchObject(req.connector_id))?;
        let property = device.property_by_object_id(req.prop_id).ok_or(Error::NoSuchObject(req.prop_id))?.clone();
        let value = to_assignment_value(device, &property, req.value)?;
        let assignment = Assignment {
            object_id: connector.id,
            object_kind: ObjectKind::Connector,
            property,
            value,
        };
        commit::commit_sync(device, &[assignment])?;
        Ok(())
    }

    // ----- blobs -----

    pub fn mode_getpropblob(&self, req: &mut DrmModeGetBlob, data_out: &mut [u8]) -> Result<()> {
        trace!("dispatch: MODE_GETPROPBLOB {}", req.blob_id);
        let blob = self.device().find_blob(req.blob_id).ok_or(Error::NoSuchBlob(req.blob_id))?;
        req.length = blob.data.len() as u32;
        copy_into(&blob.data, data_out);
        Ok(())
    }

    pub fn mode_createpropblob(&self, req: &mut DrmModeCreateBlob, data: &[u8]) -> Result<()> {
        trace!("dispatch: MODE_CREATEPROPBLOB len={}", req.length);
        if req.length == 0 || data.is_empty() {
            return Err(Error::EmptyBlob);
        }
        let bytes: Arc<[u8]> = Arc::from(data.to_vec().into_boxed_slice());
        let blob = self.device().register_blob(bytes)?;
        req.blob_id = blob.id;
        Ok(())
    }

    pub fn mode_destroypropblob(&self, req: &DrmModeDestroyBlob) -> Result<()> {
        trace!("dispatch: MODE_DESTROYPROPBLOB {}", req.blob_id);
        if !self.device().delete_blob(req.blob_id) {
            return Err(Error::NoSuchBlob(req.blob_id));
        }
        Ok(())
    }

    // ----- atomic commit -----

    /// `obj_ids`/`prop_counts`/`prop_ids`/`prop_values` are the host-resolved
    /// flat arrays `req.objs_ptr`/`req.count_props_ptr`/`req.props_ptr`/
    /// `req.prop_values_ptr` point to on the wire: one entry per object in
    /// `obj_ids`/`prop_counts`, and `prop_counts[i]` consecutive entries in
    /// `prop_ids`/`prop_values` for that object.
    pub fn mode_atomic(
        &self,
        req: &DrmModeAtomic,
        obj_ids: &[u32],
        prop_counts: &[u32],
        prop_ids: &[u32],
        prop_values: &[u64],
    ) -> Result<()> {
        trace!("dispatch: MODE_ATOMIC flags={:#x} objs={}", req.flags, obj_ids.len());
        if !self.file.atomic() {
            return Err(Error::AtomicNotEnabled);
        }
        if req.flags & !DRM_MODE_ATOMIC_FLAG_MASK != 0 {
            return Err(Error::InvalidFlags("unknown atomic commit flag bit set"));
        }
        let test_only = req.flags & DRM_MODE_ATOMIC_TEST_ONLY != 0;
        let want_event = req.flags & DRM_MODE_PAGE_FLIP_EVENT != 0;
        let nonblock = req.flags & DRM_MODE_ATOMIC_NONBLOCK != 0;
        if test_only && want_event {
            return Err(Error::InvalidFlags("TEST_ONLY cannot be combined with PAGE_FLIP_EVENT"));
        }

        let device = self.device();
        let mut assignments = Vec::with_capacity(prop_ids.len());
        let mut cursor = 0usize;
        for (i, &obj_id) in obj_ids.iter().enumerate() {
            let (kind, _) = device.lookup_generic(obj_id).ok_or(Error::NoSuchObject(obj_id))?;
            let count = prop_counts[i] as usize;
            for _ in 0..count {
                let prop_id = prop_ids[cursor];
                let raw_value = prop_values[cursor];
                cursor += 1;
                let property = device.property_by_object_id(prop_id).ok_or(Error::NoSuchObject(prop_id))?.clone();
                let value = to_assignment_value(device, &property, raw_value)?;
                assignments.push(Assignment {
                    object_id: obj_id,
                    object_kind: kind,
                    property,
                    value,
                });
            }
        }

        // Captured here (rather than inside `commit::commit_sync`/
        // `commit_async`) so the touched-CRTC set used to validate
        // `PAGE_FLIP_EVENT` below is the same one the event gets armed
        // against, and so `TEST_ONLY` never drives a driver at all.
        let mut state = device.fresh_atomic_state();
        commit::capture(&assignments, &mut state)?;
        let touched = state.referenced_crtcs();

        if want_event && touched.is_empty() {
            return Err(Error::ValidationFailed(
                "PAGE_FLIP_EVENT requires at least one CRTC touched by the commit",
            ));
        }

        if test_only {
            return Ok(());
        }

        if nonblock {
            let file = self.file.clone();
            let transport = self.transport.clone();
            let user_data = req.user_data;
            commit::apply_async(device.clone(), state, touched, move |crtc_ids| {
                if want_event {
                    let timestamp_ns = transport.monotonic_now_ns();
                    for &crtc_id in crtc_ids {
                        file.post_event(FlipCompleteEvent {
                            crtc_id,
                            user_data,
                            timestamp_ns,
                        });
                    }
                }
            })?;
        } else {
            commit::apply_sync(device, state, &touched)?;
            if want_event {
                let timestamp_ns = self.transport.monotonic_now_ns();
                for crtc_id in touched {
                    self.file.post_event(FlipCompleteEvent {
                        crtc_id,
                        user_data: req.user_data,
                        timestamp_ns,
                    });
                }
            }
        }
        Ok(())
    }

    // ----- PRIME -----

    pub fn prime_handle_to_fd(&self, req: &mut DrmPrimeHandle) -> Result<()> {
        trace!("dispatch: PRIME_HANDLE_TO_FD {}", req.handle);
        let bo = self.file.resolve_handle(req.handle).ok_or(Error::UnknownHandle(req.handle))?;
        let prime = Arc::new(PrimeFile::new(bo));
        let served = self.transport.serve_prime_file(prime)?;
        self.file.export_buffer_object(req.handle, served.credentials)?;
        req.fd = served.fd;
        Ok(())
    }

    pub fn prime_fd_to_handle(&self, req: &mut DrmPrimeHandle) -> Result<()> {
        trace!("dispatch: PRIME_FD_TO_HANDLE");
        let creds: PrimeCredential = self.transport.credentials();
        let (_, handle) = self.file.import_buffer_object(&creds)?;
        req.handle = handle;
        Ok(())
    }
}
