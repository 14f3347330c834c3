// SPDX-License-Identifier: MPL-2.0

//! Connector mode objects: the display-attachment point a client probes
//! for status, supported modes and physical dimensions.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::modes::ModeInfo;
use crate::object::{ModeObject, ObjectKind};
use crate::property::PropertyId;
use crate::state::ConnectorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl ConnectorStatus {
    pub fn wire_value(self) -> u32 {
        match self {
            ConnectorStatus::Connected => 1,
            ConnectorStatus::Disconnected => 2,
            ConnectorStatus::Unknown => 3,
        }
    }
}

#[derive(Debug)]
pub struct Connector {
    pub id: u32,
    pub connector_type: u32,
    pub possible_encoders: Vec<u32>,
    pub current_encoder: Mutex<Option<u32>>,
    pub modes: Vec<ModeInfo>,
    pub mm_width: u32,
    pub mm_height: u32,
    pub subpixel: u32,
    pub status: Mutex<ConnectorStatus>,
    pub state: Mutex<ConnectorState>,
}

impl Connector {
    pub fn new(
        id: u32,
        connector_type: u32,
        possible_encoders: Vec<u32>,
        modes: Vec<ModeInfo>,
        mm_width: u32,
        mm_height: u32,
    ) -> Self {
        Self {
            id,
            connector_type,
            possible_encoders,
            current_encoder: Mutex::new(None),
            modes,
            mm_width,
            mm_height,
            subpixel: 0,
            status: Mutex::new(ConnectorStatus::Unknown),
            state: Mutex::new(ConnectorState::default()),
        }
    }
}

impl ModeObject for Connector {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Connector
    }

    fn properties(&self) -> HashMap<PropertyId, u64> {
        let state = self.state.lock().unwrap();
        let mut props = HashMap::new();
        props.insert(PropertyId::CrtcId, state.crtc.unwrap_or(0) as u64);
        props.insert(PropertyId::Dpms, state.dpms as u64);
        props
    }
}
