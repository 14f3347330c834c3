// SPDX-License-Identifier: MPL-2.0

//! Blob mode objects: opaque, immutable byte buffers referenced by id,
//! used for mode-info and in-formats property values.

use std::collections::HashMap;
use std::sync::Arc;

use crate::object::{ModeObject, ObjectKind};
use crate::property::PropertyId;

#[derive(Debug)]
pub struct Blob {
    pub id: u32,
    pub data: Arc<[u8]>,
}

impl Blob {
    pub fn new(id: u32, data: Arc<[u8]>) -> Self {
        Self { id, data }
    }
}

impl ModeObject for Blob {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Blob
    }

    fn properties(&self) -> HashMap<PropertyId, u64> {
        HashMap::new()
    }
}
