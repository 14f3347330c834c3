// SPDX-License-Identifier: MPL-2.0

//! The Device: the single strong owner of every mode-object, the property
//! registry, and the allocators (mode-object ids, blob ids, mmap slots)
//! that hand out identity within this server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::blob::Blob;
use crate::buffer::BufferObject;
use crate::connector::Connector;
use crate::crtc::Crtc;
use crate::driver::Driver;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::framebuffer::Framebuffer;
use crate::id_alloc::IdAllocator;
use crate::object::{ModeObject, ObjectKind};
use crate::plane::Plane;
use crate::property::{Property, PropertyId};
use crate::state::AtomicState;

/// Resource limits and feature toggles supplied by the caller at
/// construction, instead of hardcoded constants, so the same core can
/// serve differently-shaped backends without forking it.
#[derive(Debug, Clone, Copy)]
pub struct DeviceLimits {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub cursor_width: u32,
    pub cursor_height: u32,
    pub addfb2_modifiers_supported: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            min_width: 1,
            max_width: 8192,
            min_height: 1,
            max_height: 8192,
            cursor_width: 64,
            cursor_height: 64,
            addfb2_modifiers_supported: false,
        }
    }
}

/// Credential under which a buffer object is exported via PRIME: an
/// opaque 16-byte value derived from the served lane, per the transport's
/// `extract credentials` primitive.
pub type PrimeCredential = [u8; 16];

#[derive(Default)]
struct ObjectTables {
    crtcs: HashMap<u32, Arc<Crtc>>,
    planes: HashMap<u32, Arc<Plane>>,
    connectors: HashMap<u32, Arc<Connector>>,
    encoders: HashMap<u32, Arc<Encoder>>,
    framebuffers: HashMap<u32, Arc<Framebuffer>>,
    blobs: HashMap<u32, Arc<Blob>>,
    prime_table: HashMap<PrimeCredential, Arc<BufferObject>>,
}

/// Everything about a Device that mutates. Protected by a single mutex:
/// per the concurrency model, the object graph's mutable operations
/// (framebuffer creation, blob register/delete, mmap installation, PRIME
/// registration) are infrequent enough that Device-wide serialization is
/// the right first cut; finer per-CRTC locking for commits happens at
/// the object level (each Crtc/Plane/Connector carries its own state
/// mutex), not here.
struct DeviceInner {
    tables: ObjectTables,
    object_ids: IdAllocator,
    blob_ids: IdAllocator,
    mmap_slots: IdAllocator,
    bo_ids: IdAllocator,
}

pub struct Device {
    driver: Arc<dyn Driver>,
    pub limits: DeviceLimits,
    properties: HashMap<PropertyId, Arc<Property>>,
    inner: Mutex<DeviceInner>,
}

impl Device {
    pub fn new(driver: Arc<dyn Driver>, limits: DeviceLimits) -> Arc<Self> {
        let mut next = 1u32;
        let properties = crate::property::build_standard_properties(&mut move || {
            let id = next;
            next += 1;
            id
        });

        Arc::new(Self {
            driver,
            limits,
            properties,
            inner: Mutex::new(DeviceInner {
                tables: ObjectTables::default(),
                object_ids: IdAllocator::starting_at_one(),
                blob_ids: IdAllocator::starting_at_one(),
                mmap_slots: IdAllocator::starting_at_one(),
                bo_ids: IdAllocator::starting_at_one(),
            }),
        })
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn driver_version(&self) -> (u16, u16, u16) {
        self.driver.driver_version()
    }

    pub fn driver_info(&self) -> (String, String, String) {
        self.driver.driver_info()
    }

    pub fn property(&self, id: PropertyId) -> &Arc<Property> {
        self.properties
            .get(&id)
            .expect("standard property ids are always registered")
    }

    pub fn property_by_object_id(&self, object_id: u32) -> Option<&Arc<Property>> {
        self.properties.values().find(|p| p.object_id == object_id)
    }

    pub fn properties(&self) -> impl Iterator<Item = &Arc<Property>> {
        self.properties.values()
    }

    pub fn fresh_atomic_state(self: &Arc<Self>) -> AtomicState {
        AtomicState::new(self.clone())
    }

    pub fn create_configuration(&self) -> Box<dyn crate::commit::Configuration> {
        self.driver.create_configuration()
    }

    // ----- object registration (called during device bring-up) -----

    pub fn register_crtc(&self, primary_plane: u32, cursor_plane: Option<u32>) -> Result<Arc<Crtc>> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.object_ids.allocate()?;
        let index = inner.tables.crtcs.len() as u8;
        let crtc = Arc::new(Crtc::new(id, index, primary_plane, cursor_plane));
        inner.tables.crtcs.insert(id, crtc.clone());
        Ok(crtc)
    }

    pub fn register_plane(
        &self,
        plane_type: crate::plane::PlaneType,
        possible_crtcs: u32,
        formats: Vec<u32>,
    ) -> Result<Arc<Plane>> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.object_ids.allocate()?;
        let plane = Arc::new(Plane::new(id, plane_type, possible_crtcs, formats));
        inner.tables.planes.insert(id, plane.clone());
        Ok(plane)
    }

    pub fn register_encoder(&self, possible_crtcs: u32) -> Result<Arc<Encoder>> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.object_ids.allocate()?;
        let index = inner.tables.encoders.len() as u8;
        let encoder = Arc::new(Encoder::new(id, index, possible_crtcs));
        inner.tables.encoders.insert(id, encoder.clone());
        Ok(encoder)
    }

    pub fn register_connector(
        &self,
        connector_type: u32,
        possible_encoders: Vec<u32>,
        modes: Vec<crate::modes::ModeInfo>,
        mm_width: u32,
        mm_height: u32,
    ) -> Result<Arc<Connector>> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.object_ids.allocate()?;
        let connector = Arc::new(Connector::new(
            id,
            connector_type,
            possible_encoders,
            modes,
            mm_width,
            mm_height,
        ));
        inner.tables.connectors.insert(id, connector.clone());
        Ok(connector)
    }

    // ----- accessors the AtomicState and dispatcher use -----

    pub fn crtc(&self, id: u32) -> Option<Arc<Crtc>> {
        self.inner.lock().unwrap().tables.crtcs.get(&id).cloned()
    }

    pub fn plane(&self, id: u32) -> Option<Arc<Plane>> {
        self.inner.lock().unwrap().tables.planes.get(&id).cloned()
    }

    pub fn connector(&self, id: u32) -> Option<Arc<Connector>> {
        self.inner.lock().unwrap().tables.connectors.get(&id).cloned()
    }

    pub fn encoder(&self, id: u32) -> Option<Arc<Encoder>> {
        self.inner.lock().unwrap().tables.encoders.get(&id).cloned()
    }

    pub fn framebuffer(&self, id: u32) -> Option<Arc<Framebuffer>> {
        self.inner.lock().unwrap().tables.framebuffers.get(&id).cloned()
    }

    pub fn crtc_ids(&self) -> Vec<u32> {
        self.inner.lock().unwrap().tables.crtcs.keys().copied().collect()
    }

    pub fn plane_ids(&self) -> Vec<u32> {
        self.inner.lock().unwrap().tables.planes.keys().copied().collect()
    }

    pub fn encoder_ids(&self) -> Vec<u32> {
        self.inner.lock().unwrap().tables.encoders.keys().copied().collect()
    }

    pub fn connector_ids(&self) -> Vec<u32> {
        self.inner.lock().unwrap().tables.connectors.keys().copied().collect()
    }

    pub fn framebuffer_ids(&self) -> Vec<u32> {
        self.inner.lock().unwrap().tables.framebuffers.keys().copied().collect()
    }

    /// Generic lookup by id and expected kind, used by `MODE_OBJ_GETPROPERTIES`
    /// and by the `Object` property validator.
    pub fn lookup_generic(&self, id: u32) -> Option<(ObjectKind, HashMap<PropertyId, u64>)> {
        let inner = self.inner.lock().unwrap();
        if let Some(o) = inner.tables.crtcs.get(&id) {
            return Some((o.kind(), o.properties()));
        }
        if let Some(o) = inner.tables.planes.get(&id) {
            return Some((o.kind(), o.properties()));
        }
        if let Some(o) = inner.tables.connectors.get(&id) {
            return Some((o.kind(), o.properties()));
        }
        None
    }

    // ----- buffer / framebuffer lifecycle -----

    pub fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> Result<Arc<BufferObject>> {
        let (size, pitch) = self.driver.create_dumb(width, height, bpp)?;
        let mut inner = self.inner.lock().unwrap();
        let id = inner.bo_ids.allocate()?;
        Ok(Arc::new(BufferObject::new(id, size, pitch, height)))
    }

    pub fn create_framebuffer(
        &self,
        bo: Arc<BufferObject>,
        width: u32,
        height: u32,
        pitch: u32,
        fourcc: u32,
        modifier: u64,
    ) -> Result<Arc<Framebuffer>> {
        let fb = self
            .driver
            .create_framebuffer(bo, width, height, pitch, fourcc, modifier)?;
        let mut inner = self.inner.lock().unwrap();
        let id = inner.object_ids.allocate()?;
        let fb = Arc::new(Framebuffer { id, ..fb });
        inner.tables.framebuffers.insert(id, fb.clone());
        debug!("created framebuffer {id} ({width}x{height}, fourcc {fourcc:#x})");
        Ok(fb)
    }

    pub fn remove_framebuffer(&self, id: u32) -> Option<Arc<Framebuffer>> {
        self.inner.lock().unwrap().tables.framebuffers.remove(&id)
    }

    // ----- blobs -----

    pub fn register_blob(&self, bytes: Arc<[u8]>) -> Result<Arc<Blob>> {
        if bytes.is_empty() {
            return Err(Error::EmptyBlob);
        }
        let mut inner = self.inner.lock().unwrap();
        let id = inner.blob_ids.allocate()?;
        let blob = Arc::new(Blob::new(id, bytes));
        inner.tables.blobs.insert(id, blob.clone());
        Ok(blob)
    }

    pub fn find_blob(&self, id: u32) -> Option<Arc<Blob>> {
        self.inner.lock().unwrap().tables.blobs.get(&id).cloned()
    }

    /// Removes a blob by id. Absent is not an error at this layer; the
    /// dispatcher decides whether that should surface as `ILLEGAL_ARGUMENT`
    /// for `MODE_DESTROYPROPBLOB`.
    pub fn delete_blob(&self, id: u32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let existed = inner.tables.blobs.remove(&id).is_some();
        if existed {
            inner.blob_ids.free(id);
        }
        existed
    }

    // ----- mmap offsets -----

    /// Assigns a fresh memory slot to `bo` if it doesn't already have one
    /// and returns the resulting mmap offset. Idempotent: a BO that
    /// already has a slot just has its existing offset re-derived.
    pub fn install_mapping(&self, bo: &BufferObject) -> Result<u64> {
        if let Some(offset) = bo.mmap_offset() {
            return Ok(offset);
        }
        let slot = self.inner.lock().unwrap().mmap_slots.allocate()?;
        let in_effect = bo.assign_mmap_slot(slot);
        if in_effect != slot {
            // Lost the race to another caller; give our slot back.
            self.inner.lock().unwrap().mmap_slots.free(slot);
        }
        Ok((in_effect as u64) << 32)
    }

    // ----- PRIME export table -----

    pub fn register_buffer_object(&self, creds: PrimeCredential, bo: Arc<BufferObject>) {
        self.inner.lock().unwrap().tables.prime_table.insert(creds, bo);
    }

    pub fn find_buffer_object(&self, creds: &PrimeCredential) -> Option<Arc<BufferObject>> {
        self.inner.lock().unwrap().tables.prime_table.get(creds).cloned()
    }
}
