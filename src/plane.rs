// SPDX-License-Identifier: MPL-2.0

//! Plane mode objects: OVERLAY, PRIMARY and CURSOR planes, each restricted
//! to a fixed set of CRTCs and pixel formats.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::object::{ModeObject, ObjectKind};
use crate::property::PropertyId;
use crate::state::PlaneState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneType {
    Overlay,
    Primary,
    Cursor,
}

impl PlaneType {
    /// The fixed enum value exposed through the immutable `type` property.
    pub fn property_value(self) -> u64 {
        match self {
            PlaneType::Overlay => 0,
            PlaneType::Primary => 1,
            PlaneType::Cursor => 2,
        }
    }
}

#[derive(Debug)]
pub struct Plane {
    pub id: u32,
    pub plane_type: PlaneType,
    /// Bitmask of CRTC indices this plane may be bound to, mirroring
    /// each CRTC's `mask_bit`.
    pub possible_crtcs: u32,
    pub formats: Vec<u32>,
    /// Serialized `drm_format_modifier_blob`, set once at construction.
    pub in_formats_blob: Option<Vec<u8>>,
    pub state: Mutex<PlaneState>,
}

impl Plane {
    pub fn new(id: u32, plane_type: PlaneType, possible_crtcs: u32, formats: Vec<u32>) -> Self {
        Self {
            id,
            plane_type,
            possible_crtcs,
            formats,
            in_formats_blob: None,
            state: Mutex::new(PlaneState::default()),
        }
    }
}

impl ModeObject for Plane {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Plane
    }

    fn properties(&self) -> HashMap<PropertyId, u64> {
        let state = self.state.lock().unwrap();
        let mut props = HashMap::new();
        props.insert(PropertyId::PlaneType, self.plane_type.property_value());
        props.insert(PropertyId::CrtcId, state.crtc.unwrap_or(0) as u64);
        props.insert(PropertyId::FbId, state.fb.unwrap_or(0) as u64);
        props
    }
}
