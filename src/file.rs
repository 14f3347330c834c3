// SPDX-License-Identifier: MPL-2.0

//! `File`: the per-open-fd session. Everything here is private to one
//! client's conversation with the device — handle table, attached
//! framebuffers, event queue, client-cap flags — as opposed to the
//! [`Device`](crate::device::Device), which every `File` shares.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use log::{debug, info};

use crate::buffer::BufferObject;
use crate::device::{Device, PrimeCredential};
use crate::error::{Error, Result};
use crate::id_alloc::IdAllocator;
use crate::wire::DrmEventVblank;

/// `EPOLLIN`, the only poll bit this crate ever reports (a readable event
/// queue). Kept as a named constant since the dispatcher and `File` both
/// need it and the wire value is part of the external contract.
pub const EPOLLIN: u32 = 0x0001;

/// A queued flip-complete event, as posted by the commit engine once a
/// page flip (legacy or atomic) has been confirmed by the driver.
#[derive(Debug, Clone, Copy)]
pub struct FlipCompleteEvent {
    pub crtc_id: u32,
    pub user_data: u64,
    pub timestamp_ns: u64,
}

impl FlipCompleteEvent {
    /// Serializes this event into the wire `drm_event_vblank` layout a
    /// client's `read` call receives.
    pub fn to_wire(self) -> DrmEventVblank {
        DrmEventVblank {
            base_type: crate::wire::DRM_EVENT_FLIP_COMPLETE,
            base_length: std::mem::size_of::<DrmEventVblank>() as u32,
            user_data: self.user_data,
            tv_sec: (self.timestamp_ns / 1_000_000_000) as u32,
            tv_usec: ((self.timestamp_ns % 1_000_000_000) / 1_000) as u32,
            sequence: 0,
            crtc_id: self.crtc_id,
        }
    }
}

#[derive(Default)]
struct HandleTable {
    ids: Option<IdAllocator>,
    map: std::collections::HashMap<u32, Arc<BufferObject>>,
}

impl HandleTable {
    fn new() -> Self {
        Self {
            ids: Some(IdAllocator::starting_at_one()),
            map: std::collections::HashMap::new(),
        }
    }
}

/// The event queue plus the sequence/readiness bookkeeping a client polls
/// or reads against. Wrapped in a single mutex/condvar pair so `post_event`
/// and the blocking `read`/`poll_wait` paths can't race on partial state.
struct EventState {
    queue: VecDeque<FlipCompleteEvent>,
    sequence: u64,
}

/// Per-open-fd session state. One `File` exists per successful `OPEN`
/// accepted by the transport; closing it drops the handle table and event
/// queue but never touches the shared `Device`'s object graph beyond
/// detaching this file's framebuffers.
pub struct File {
    device: Arc<Device>,
    handles: Mutex<HandleTable>,
    framebuffers: Mutex<Vec<u32>>,
    events: Mutex<EventState>,
    events_cv: Condvar,
    nonblocking: AtomicBool,
    atomic_cap: AtomicBool,
    universal_planes_cap: AtomicBool,
}

impl File {
    pub fn new(device: Arc<Device>, nonblocking: bool) -> Arc<Self> {
        Arc::new(Self {
            device,
            handles: Mutex::new(HandleTable::new()),
            framebuffers: Mutex::new(Vec::new()),
            events: Mutex::new(EventState {
                queue: VecDeque::new(),
                sequence: 0,
            }),
            events_cv: Condvar::new(),
            nonblocking: AtomicBool::new(nonblocking),
            atomic_cap: AtomicBool::new(false),
            universal_planes_cap: AtomicBool::new(false),
        })
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking.load(Ordering::Relaxed)
    }

    // ----- client capability flags -----

    pub fn atomic(&self) -> bool {
        self.atomic_cap.load(Ordering::Relaxed)
    }

    pub fn universal_planes(&self) -> bool {
        self.universal_planes_cap.load(Ordering::Relaxed)
    }

    /// `SET_CLIENT_CAP(ATOMIC, 1)` implicitly turns on universal planes
    /// too. Turning atomic off leaves universal planes alone:
    /// only the enabling direction is coupled.
    pub fn set_atomic(&self, enabled: bool) {
        self.atomic_cap.store(enabled, Ordering::Relaxed);
        if enabled {
            self.universal_planes_cap.store(true, Ordering::Relaxed);
        }
    }

    pub fn set_universal_planes(&self, enabled: bool) {
        self.universal_planes_cap.store(enabled, Ordering::Relaxed);
    }

    // ----- BO handle table -----

    pub fn create_handle(&self, bo: Arc<BufferObject>) -> Result<u32> {
        let mut table = self.handles.lock().unwrap();
        let handle = table.ids.as_mut().unwrap().allocate()?;
        bo.ref_handle();
        table.map.insert(handle, bo);
        Ok(handle)
    }

    pub fn resolve_handle(&self, handle: u32) -> Option<Arc<BufferObject>> {
        self.handles.lock().unwrap().map.get(&handle).cloned()
    }

    /// Linear scan: fine since a file's handle count
    /// is always small.
    pub fn get_handle(&self, bo: &Arc<BufferObject>) -> Option<u32> {
        self.handles
            .lock()
            .unwrap()
            .map
            .iter()
            .find(|(_, v)| Arc::ptr_eq(v, bo))
            .map(|(h, _)| *h)
    }

    /// Removes a handle, freeing its slot in this file's allocator. The
    /// underlying BO lives on as long as any other reference (another
    /// file's handle, an attached framebuffer, the PRIME table) exists.
    pub fn close_handle(&self, handle: u32) -> Option<Arc<BufferObject>> {
        let mut table = self.handles.lock().unwrap();
        let bo = table.map.remove(&handle)?;
        table.ids.as_mut().unwrap().free(handle);
        bo.unref_handle();
        Some(bo)
    }

    // ----- attached framebuffers -----

    pub fn attach_framebuffer(&self, fb_id: u32) {
        self.framebuffers.lock().unwrap().push(fb_id);
    }

    /// Detaches `fb_id` from this file's list. The framebuffer object
    /// itself outlives this call; any
    /// plane still referencing it keeps doing so until the next commit
    /// rebinds or clears `FB_ID`.
    pub fn detach_framebuffer(&self, fb_id: u32) -> bool {
        let mut fbs = self.framebuffers.lock().unwrap();
        if let Some(pos) = fbs.iter().position(|&id| id == fb_id) {
            fbs.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn framebuffer_ids(&self) -> Vec<u32> {
        self.framebuffers.lock().unwrap().clone()
    }

    // ----- event queue -----

    /// Appends an event and wakes any `read`/`poll_wait` sleeper. The
    /// sequence counter only bumps on the empty-to-non-empty transition:
    /// a burst of events posted while the queue is already non-empty
    /// drains under a single sequence value, matching `poll_wait`'s
    /// `while sequence == current` loop, which only needs to observe
    /// that *something* is pending, not count individual events.
    pub fn post_event(&self, event: FlipCompleteEvent) {
        let mut state = self.events.lock().unwrap();
        let was_empty = state.queue.is_empty();
        state.queue.push_back(event);
        if was_empty {
            state.sequence += 1;
        }
        debug!(
            "posted flip-complete event for crtc {} (sequence {})",
            event.crtc_id, state.sequence
        );
        self.events_cv.notify_all();
    }

    /// Dequeues one event and serializes it into `buf`. Returns the
    /// number of bytes written. `WouldBlock` is returned (not a wire
    /// error) when the file is non-blocking and the queue is empty.
    pub fn read_event(&self, buf: &mut [u8]) -> Result<usize> {
        let wire_size = std::mem::size_of::<DrmEventVblank>();
        if buf.len() < wire_size {
            return Err(Error::BufferTooSmall);
        }

        let mut state = self.events.lock().unwrap();
        loop {
            if let Some(event) = state.queue.pop_front() {
                let wire = event.to_wire();
                buf[..wire_size].copy_from_slice(bytemuck::bytes_of(&wire));
                return Ok(wire_size);
            }
            if self.is_nonblocking() {
                return Err(Error::WouldBlock);
            }
            state = self.events_cv.wait(state).unwrap();
        }
    }

    /// Blocks until the event sequence advances past `since`, or `cancel`
    /// observes a cancellation request. Returns the current sequence and
    /// `EPOLLIN` if any event is still pending.
    pub fn poll_wait(&self, since: u64, cancel: &dyn Fn() -> bool) -> Result<(u64, u32)> {
        let mut state = self.events.lock().unwrap();
        if since > state.sequence {
            return Err(Error::ValidationFailed(
                "poll_wait sequence is ahead of the file's current sequence",
            ));
        }
        while state.sequence <= since {
            if cancel() {
                break;
            }
            let (next, timed_out) = self
                .events_cv
                .wait_timeout(state, std::time::Duration::from_millis(50))
                .unwrap();
            state = next;
            let _ = timed_out;
        }
        let ready = if state.queue.is_empty() { 0 } else { EPOLLIN };
        Ok((state.sequence, ready))
    }

    /// Non-blocking snapshot of `(sequence, ready_mask)`.
    pub fn poll_status(&self) -> (u64, u32) {
        let state = self.events.lock().unwrap();
        let ready = if state.queue.is_empty() { 0 } else { EPOLLIN };
        (state.sequence, ready)
    }

    // ----- PRIME export/import -----

    pub fn export_buffer_object(&self, handle: u32, creds: PrimeCredential) -> Result<Arc<BufferObject>> {
        let bo = self
            .resolve_handle(handle)
            .ok_or(Error::UnknownHandle(handle))?;
        self.device.register_buffer_object(creds, bo.clone());
        Ok(bo)
    }

    /// Looks the credential up in the device's PRIME table; if this file
    /// already holds a handle for that BO, reuses it rather than minting
    /// a fresh one (so `get_handle`/`resolve_handle` stay consistent).
    pub fn import_buffer_object(&self, creds: &PrimeCredential) -> Result<(Arc<BufferObject>, u32)> {
        let bo = self
            .device
            .find_buffer_object(creds)
            .ok_or(Error::UnknownPrimeCredential)?;
        let handle = match self.get_handle(&bo) {
            Some(h) => h,
            None => self.create_handle(bo.clone())?,
        };
        Ok((bo, handle))
    }
}

impl Drop for File {
    /// Closing a file drops its event queue and handles and detaches
    /// (without destroying) its attached framebuffers, per the
    /// concurrency model's cancellation rules.
    fn drop(&mut self) {
        info!("drm file closed: releasing handles and event queue");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Driver;
    use std::sync::Arc;

    fn test_device() -> Arc<Device> {
        struct NullDriver;
        impl Driver for NullDriver {
            fn driver_version(&self) -> (u16, u16, u16) {
                (1, 0, 0)
            }
            fn driver_info(&self) -> (String, String, String) {
                ("null".into(), "null driver".into(), "2026-01-01".into())
            }
            fn features(&self) -> crate::driver::DriverFeatures {
                crate::driver::DriverFeatures::empty()
            }
            fn cursor_width(&self) -> u32 {
                64
            }
            fn cursor_height(&self) -> u32 {
                64
            }
            fn addfb2_modifiers_supported(&self) -> bool {
                false
            }
            fn create_dumb(&self, _w: u32, _h: u32, _bpp: u32) -> Result<(u64, u32)> {
                unimplemented!()
            }
            fn create_framebuffer(
                &self,
                _bo: Arc<BufferObject>,
                _w: u32,
                _h: u32,
                _pitch: u32,
                _fourcc: u32,
                _modifier: u64,
            ) -> Result<crate::framebuffer::Framebuffer> {
                unimplemented!()
            }
            fn create_configuration(&self) -> Box<dyn crate::commit::Configuration> {
                unimplemented!()
            }
            fn probe_connector(&self, _id: u32) -> Result<crate::driver::ConnectorProbe> {
                unimplemented!()
            }
            fn notify_dirty(&self, _id: u32) -> Result<()> {
                unimplemented!()
            }
        }
        Device::new(Arc::new(NullDriver), crate::device::DeviceLimits::default())
    }

    #[test]
    fn create_handle_then_get_handle_round_trips() {
        let file = File::new(test_device(), true);
        let bo = Arc::new(BufferObject::new(1, 4096, 64, 64));
        let handle = file.create_handle(bo.clone()).unwrap();
        assert_eq!(file.get_handle(&bo), Some(handle));
        assert!(Arc::ptr_eq(&file.resolve_handle(handle).unwrap(), &bo));
    }

    #[test]
    fn closing_a_handle_invalidates_it() {
        let file = File::new(test_device(), true);
        let bo = Arc::new(BufferObject::new(1, 4096, 64, 64));
        let handle = file.create_handle(bo.clone()).unwrap();
        assert!(file.close_handle(handle).is_some());
        assert!(file.resolve_handle(handle).is_none());
    }

    #[test]
    fn nonblocking_read_on_empty_queue_would_block() {
        let file = File::new(test_device(), true);
        let mut buf = [0u8; 32];
        assert!(matches!(file.read_event(&mut buf), Err(Error::WouldBlock)));
    }

    #[test]
    fn posting_then_reading_an_event_round_trips_crtc_id() {
        let file = File::new(test_device(), true);
        file.post_event(FlipCompleteEvent {
            crtc_id: 7,
            user_data: 0xdead_beef,
            timestamp_ns: 1_500_000_000,
        });
        let mut buf = [0u8; 32];
        let n = file.read_event(&mut buf).unwrap();
        let wire: DrmEventVblank = *bytemuck::from_bytes(&buf[..n]);
        assert_eq!(wire.crtc_id, 7);
        assert_eq!(wire.user_data, 0xdead_beef);
        assert_eq!(wire.tv_sec, 1);
        assert_eq!(wire.base_type, crate::wire::DRM_EVENT_FLIP_COMPLETE);
    }

    #[test]
    fn a_burst_posted_before_the_first_drain_bumps_the_sequence_once() {
        let file = File::new(test_device(), true);
        file.post_event(FlipCompleteEvent {
            crtc_id: 1,
            user_data: 0,
            timestamp_ns: 0,
        });
        let (seq_after_first, _) = file.poll_status();
        file.post_event(FlipCompleteEvent {
            crtc_id: 2,
            user_data: 0,
            timestamp_ns: 0,
        });
        let (seq_after_second, _) = file.poll_status();
        assert_eq!(seq_after_first, seq_after_second);

        let mut buf = [0u8; 32];
        file.read_event(&mut buf).unwrap();
        file.read_event(&mut buf).unwrap();
        assert!(matches!(file.read_event(&mut buf), Err(Error::WouldBlock)));

        file.post_event(FlipCompleteEvent {
            crtc_id: 3,
            user_data: 0,
            timestamp_ns: 0,
        });
        let (seq_after_drain, _) = file.poll_status();
        assert_eq!(seq_after_drain, seq_after_second + 1);
    }

    #[test]
    fn queue_draining_clears_the_readable_hint() {
        let file = File::new(test_device(), true);
        file.post_event(FlipCompleteEvent {
            crtc_id: 1,
            user_data: 0,
            timestamp_ns: 0,
        });
        assert_eq!(file.poll_status().1, EPOLLIN);
        let mut buf = [0u8; 32];
        file.read_event(&mut buf).unwrap();
        assert_eq!(file.poll_status().1, 0);
    }

    #[test]
    fn set_atomic_implicitly_enables_universal_planes() {
        let file = File::new(test_device(), true);
        assert!(!file.universal_planes());
        file.set_atomic(true);
        assert!(file.universal_planes());
    }

    #[test]
    fn poll_wait_rejects_a_sequence_ahead_of_current() {
        let file = File::new(test_device(), true);
        assert!(file.poll_wait(5, &|| false).is_err());
    }
}
