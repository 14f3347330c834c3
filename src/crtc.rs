// SPDX-License-Identifier: MPL-2.0

//! CRTC mode objects: a scanout engine bound to a primary plane and,
//! optionally, a cursor plane.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::object::{ModeObject, ObjectKind};
use crate::property::PropertyId;
use crate::state::CrtcState;

/// A CRTC: owns exactly one primary plane and, optionally, one cursor
/// plane. `index` is the dense 0-based slot used to build the
/// `possible_crtcs` bitmasks on Encoders and Planes.
#[derive(Debug)]
pub struct Crtc {
    pub id: u32,
    pub index: u8,
    pub primary_plane: u32,
    pub cursor_plane: Option<u32>,
    pub gamma_size: u32,
    pub state: Mutex<CrtcState>,
}

impl Crtc {
    pub fn new(id: u32, index: u8, primary_plane: u32, cursor_plane: Option<u32>) -> Self {
        Self {
            id,
            index,
            primary_plane,
            cursor_plane,
            gamma_size: 0,
            state: Mutex::new(CrtcState::default()),
        }
    }

    /// `1 << index`, the bit this CRTC occupies in a Plane's or Encoder's
    /// `possible_crtcs` mask.
    pub fn mask_bit(&self) -> u32 {
        1 << self.index
    }
}

impl ModeObject for Crtc {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Crtc
    }

    fn properties(&self) -> HashMap<PropertyId, u64> {
        let state = self.state.lock().unwrap();
        let mut props = HashMap::new();
        props.insert(PropertyId::Active, state.active as u64);
        props
    }
}
