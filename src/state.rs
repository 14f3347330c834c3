// SPDX-License-Identifier: MPL-2.0

//! Mutable substate for CRTCs, Planes and Connectors, and the copy-on-write
//! [`AtomicState`] a [`Configuration`](crate::commit::Configuration) stages
//! assignments into before handing them to a driver.

use std::collections::HashMap;
use std::sync::Arc;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::object::ObjectKind;
use crate::property::{Assignment, AssignmentValue, PropertyId};

bitflags::bitflags! {
    /// Which parts of a CRTC's substate changed during the in-flight commit.
    /// The driver consults these to decide what hardware work a commit
    /// actually requires (e.g. skip a modeset if only planes changed).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct CrtcChangeFlags: u32 {
        const PLANES     = 1 << 0;
        const MODE       = 1 << 1;
        const ACTIVE     = 1 << 2;
        const CONNECTORS = 1 << 3;
    }
}

/// Mutable substate of a CRTC, cloned into an [`AtomicState`] on first touch.
#[derive(Debug, Clone, Default)]
pub struct CrtcState {
    pub active: bool,
    /// The mode blob currently bound, interpreted as a `drm_mode_modeinfo`.
    pub mode: Option<Arc<[u8]>>,
    pub changed: CrtcChangeFlags,
    pub plane_mask: u64,
    pub connector_mask: u64,
    pub encoder_mask: u64,
}

/// Mutable substate of a Plane.
#[derive(Debug, Clone, Default)]
pub struct PlaneState {
    pub crtc: Option<u32>,
    pub fb: Option<u32>,
    pub crtc_x: i32,
    pub crtc_y: i32,
    pub crtc_w: u32,
    pub crtc_h: u32,
    /// 16.16 fixed point, per the wire ABI.
    pub src_x: u32,
    pub src_y: u32,
    pub src_w: u32,
    pub src_h: u32,
    pub in_formats: Option<Arc<[u8]>>,
}

/// Mutable substate of a Connector.
#[derive(Debug, Clone, Default)]
pub struct ConnectorState {
    pub crtc: Option<u32>,
    pub encoder: Option<u32>,
    /// `DPMS` value, `0..=3`; see [`PropertyId::Dpms`] for the ordering.
    pub dpms: u8,
}

/// A scratch mapping from object id to a cloned state record, used by a
/// single in-flight commit. The first touch of any object id deep-copies
/// its live substate in; later touches return the same clone. Dropping an
/// `AtomicState` without committing it is how a failed `capture` rolls
/// back: nothing was ever written to a live object.
pub struct AtomicState {
    device: Arc<Device>,
    crtcs: HashMap<u32, CrtcState>,
    planes: HashMap<u32, PlaneState>,
    connectors: HashMap<u32, ConnectorState>,
}

impl AtomicState {
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            crtcs: HashMap::new(),
            planes: HashMap::new(),
            connectors: HashMap::new(),
        }
    }

    pub fn crtc(&mut self, id: u32) -> Result<&mut CrtcState> {
        if !self.crtcs.contains_key(&id) {
            let crtc = self.device.crtc(id).ok_or(Error::NoSuchObject(id))?;
            let live = crtc.state.lock().unwrap().clone();
            self.crtcs.insert(id, live);
        }
        Ok(self.crtcs.get_mut(&id).unwrap())
    }

    pub fn plane(&mut self, id: u32) -> Result<&mut PlaneState> {
        if !self.planes.contains_key(&id) {
            let plane = self.device.plane(id).ok_or(Error::NoSuchObject(id))?;
            let live = plane.state.lock().unwrap().clone();
            self.planes.insert(id, live);
        }
        Ok(self.planes.get_mut(&id).unwrap())
    }

    pub fn connector(&mut self, id: u32) -> Result<&mut ConnectorState> {
        if !self.connectors.contains_key(&id) {
            let connector = self.device.connector(id).ok_or(Error::NoSuchObject(id))?;
            let live = connector.state.lock().unwrap().clone();
            self.connectors.insert(id, live);
        }
        Ok(self.connectors.get_mut(&id).unwrap())
    }

    pub fn touched_crtcs(&self) -> impl Iterator<Item = (&u32, &CrtcState)> {
        self.crtcs.iter()
    }

    pub fn touched_planes(&self) -> impl Iterator<Item = (&u32, &PlaneState)> {
        self.planes.iter()
    }

    pub fn touched_connectors(&self) -> impl Iterator<Item = (&u32, &ConnectorState)> {
        self.connectors.iter()
    }

    /// Every CRTC this state touches, directly or by reference. A commit
    /// that only rebinds a Plane's or Connector's `CRTC_ID` never calls
    /// [`AtomicState::crtc`] for that id — the CRTC's own substate is
    /// untouched — but it still needs that CRTC armed for page-flip
    /// events. This unions the CRTCs touched directly with the `crtc`
    /// field of every touched plane and connector.
    pub fn referenced_crtcs(&self) -> Vec<u32> {
        let mut ids: std::collections::BTreeSet<u32> = self.crtcs.keys().copied().collect();
        ids.extend(self.planes.values().filter_map(|plane| plane.crtc));
        ids.extend(self.connectors.values().filter_map(|connector| connector.crtc));
        ids.into_iter().collect()
    }

    /// Replaces each touched object's live substate with its clone from
    /// this `AtomicState`. Called only after the driver has reported a
    /// successful apply.
    pub fn publish(self) {
        for (id, state) in self.crtcs {
            if let Some(crtc) = self.device.crtc(id) {
                *crtc.state.lock().unwrap() = state;
            }
        }
        for (id, state) in self.planes {
            if let Some(plane) = self.device.plane(id) {
                *plane.state.lock().unwrap() = state;
            }
        }
        for (id, state) in self.connectors {
            if let Some(connector) = self.device.connector(id) {
                *connector.state.lock().unwrap() = state;
            }
        }
    }
}

/// Projects a single assignment's value onto the substate of the object
/// it targets. A property whose target state kind doesn't match the
/// assigned object's kind (a plane property pointed at a CRTC) is a
/// validation error, not a panic.
pub fn write_assignment(state: &mut AtomicState, assignment: &Assignment) -> Result<()> {
    let Assignment {
        object_id,
        object_kind,
        property,
        value,
    } = assignment;

    match object_kind {
        ObjectKind::Crtc => {
            let crtc = state.crtc(*object_id)?;
            match (property.id, value) {
                (PropertyId::Active, AssignmentValue::Int(v)) => {
                    crtc.active = *v != 0;
                    crtc.changed |= CrtcChangeFlags::ACTIVE;
                }
                (PropertyId::ModeId, AssignmentValue::Blob(blob)) => {
                    crtc.mode = blob.clone();
                    crtc.changed |= CrtcChangeFlags::MODE;
                }
                _ => return Err(Error::ValidationFailed("property does not target CrtcState")),
            }
        }
        ObjectKind::Plane => {
            let plane = state.plane(*object_id)?;
            match (property.id, value) {
                (PropertyId::CrtcId, AssignmentValue::Object(ObjectKind::Crtc, id)) => {
                    plane.crtc = Some(*id);
                }
                (PropertyId::CrtcId, AssignmentValue::Null) => plane.crtc = None,
                (PropertyId::FbId, AssignmentValue::Object(ObjectKind::Framebuffer, id)) => {
                    plane.fb = Some(*id);
                }
                (PropertyId::FbId, AssignmentValue::Null) => plane.fb = None,
                (PropertyId::CrtcX, AssignmentValue::Int(v)) => plane.crtc_x = *v as i32,
                (PropertyId::CrtcY, AssignmentValue::Int(v)) => plane.crtc_y = *v as i32,
                (PropertyId::CrtcW, AssignmentValue::Int(v)) => plane.crtc_w = *v as u32,
                (PropertyId::CrtcH, AssignmentValue::Int(v)) => plane.crtc_h = *v as u32,
                (PropertyId::SrcX, AssignmentValue::Int(v)) => plane.src_x = *v as u32,
                (PropertyId::SrcY, AssignmentValue::Int(v)) => plane.src_y = *v as u32,
                (PropertyId::SrcW, AssignmentValue::Int(v)) => plane.src_w = *v as u32,
                (PropertyId::SrcH, AssignmentValue::Int(v)) => plane.src_h = *v as u32,
                _ => return Err(Error::ValidationFailed("property does not target PlaneState")),
            }
        }
        ObjectKind::Connector => {
            let connector = state.connector(*object_id)?;
            match (property.id, value) {
                (PropertyId::CrtcId, AssignmentValue::Object(ObjectKind::Crtc, id)) => {
                    connector.crtc = Some(*id);
                }
                (PropertyId::CrtcId, AssignmentValue::Null) => connector.crtc = None,
                (PropertyId::Dpms, AssignmentValue::Int(v)) => connector.dpms = *v as u8,
                _ => {
                    return Err(Error::ValidationFailed(
                        "property does not target ConnectorState",
                    ))
                }
            }
        }
        _ => return Err(Error::ValidationFailed("property's object kind cannot be assigned to")),
    }

    Ok(())
}
