// SPDX-License-Identifier: MPL-2.0

//! Framebuffer mode objects: a pixel-format-and-pitch view over a buffer
//! object, attached to planes via their `FB_ID` property.

use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::BufferObject;
use crate::object::{ModeObject, ObjectKind};
use crate::property::PropertyId;

#[derive(Debug)]
pub struct Framebuffer {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub pitch: u32,
    pub fourcc: u32,
    pub modifier: u64,
    pub bo: Arc<BufferObject>,
}

impl Framebuffer {
    pub fn new(
        id: u32,
        width: u32,
        height: u32,
        pitch: u32,
        fourcc: u32,
        modifier: u64,
        bo: Arc<BufferObject>,
    ) -> Self {
        Self {
            id,
            width,
            height,
            pitch,
            fourcc,
            modifier,
            bo,
        }
    }
}

impl ModeObject for Framebuffer {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Framebuffer
    }

    fn properties(&self) -> HashMap<PropertyId, u64> {
        HashMap::new()
    }
}
