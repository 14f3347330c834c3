// SPDX-License-Identifier: MPL-2.0

//! Shared black-box test fixtures: an in-memory [`Driver`]/[`Transport`]
//! pair and a one-CRTC/one-plane-pair/one-connector device, so each
//! integration test exercises the real [`Dispatcher`] without touching
//! hardware or host IPC.

use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use drmcore::buffer::BufferObject;
use drmcore::commit::Configuration;
use drmcore::connector::ConnectorStatus;
use drmcore::device::{Device, DeviceLimits, PrimeCredential};
use drmcore::dispatcher::Dispatcher;
use drmcore::driver::{ConnectorProbe, Driver, DriverFeatures};
use drmcore::error::Result;
use drmcore::file::File;
use drmcore::format;
use drmcore::framebuffer::Framebuffer;
use drmcore::modes;
use drmcore::plane::PlaneType;
use drmcore::prime::PrimeFile;
use drmcore::state::AtomicState;
use drmcore::transport::{ServedPrimeFile, Transport};

/// A `Configuration` that accepts every commit immediately, as if the
/// hardware retired it the instant it was submitted. There is nothing
/// here to fake a vblank delay: every caller in this crate already
/// separates `commit` from `wait_for_completion`, so an immediate
/// completion exercises the exact same ordering a real driver would.
pub struct InstantConfiguration;

impl Configuration for InstantConfiguration {
    fn commit(&mut self, state: AtomicState) -> Result<AtomicState> {
        Ok(state)
    }

    fn wait_for_completion(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A driver backed by plain `Vec<u8>`-less bookkeeping: dumb buffers are
/// sized but never actually allocated, since nothing in this crate reads
/// pixel bytes.
pub struct MockDriver {
    connector_status: Mutex<ConnectorStatus>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            connector_status: Mutex::new(ConnectorStatus::Connected),
        }
    }
}

impl Driver for MockDriver {
    fn driver_version(&self) -> (u16, u16, u16) {
        (1, 0, 0)
    }

    fn driver_info(&self) -> (String, String, String) {
        ("mockdrm".into(), "in-memory test driver".into(), "2026-01-01".into())
    }

    fn features(&self) -> DriverFeatures {
        DriverFeatures::GEM | DriverFeatures::MODESET | DriverFeatures::ATOMIC
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

    fn create_dumb(&self, width: u32, height: u32, bpp: u32) -> Result<(u64, u32)> {
        let pitch = width * (bpp / 8);
        let size = (pitch as u64) * (height as u64);
        Ok((size, pitch))
    }

    fn create_framebuffer(
        &self,
        bo: Arc<BufferObject>,
        width: u32,
        height: u32,
        pitch: u32,
        fourcc: u32,
        modifier: u64,
    ) -> Result<Framebuffer> {
        // `id` is overwritten by `Device::create_framebuffer` once this
        // returns; 0 here is just a placeholder.
        Ok(Framebuffer::new(0, width, height, pitch, fourcc, modifier, bo))
    }

    fn create_configuration(&self) -> Box<dyn Configuration> {
        Box::new(InstantConfiguration)
    }

    fn probe_connector(&self, _connector_id: u32) -> Result<ConnectorProbe> {
        Ok(ConnectorProbe {
            status: *self.connector_status.lock().unwrap(),
            modes: Vec::new(),
        })
    }

    fn notify_dirty(&self, _framebuffer_id: u32) -> Result<()> {
        Ok(())
    }
}

/// A transport standing in for the host's lane/credential machinery.
/// `set_next_credentials` lets a test simulate "this fd arrived on a
/// conversation the host already resolved to these credentials" without
/// actually passing a descriptor between processes.
pub struct MockTransport {
    next_fd: AtomicI32,
    clock_ns: AtomicU64,
    next_credentials: Mutex<PrimeCredential>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            next_fd: AtomicI32::new(100),
            clock_ns: AtomicU64::new(0),
            next_credentials: Mutex::new([0u8; 16]),
        }
    }

    pub fn set_next_credentials(&self, creds: PrimeCredential) {
        *self.next_credentials.lock().unwrap() = creds;
    }
}

impl Transport for MockTransport {
    fn credentials(&self) -> PrimeCredential {
        *self.next_credentials.lock().unwrap()
    }

    fn serve_prime_file(&self, _prime: Arc<PrimeFile>) -> Result<ServedPrimeFile> {
        let fd = self.next_fd.fetch_add(1, Ordering::SeqCst);
        let mut credentials = [0u8; 16];
        credentials[..4].copy_from_slice(&fd.to_le_bytes());
        Ok(ServedPrimeFile { fd, credentials })
    }

    fn monotonic_now_ns(&self) -> u64 {
        self.clock_ns.fetch_add(16_666_667, Ordering::SeqCst)
    }
}

/// A device with one CRTC, a primary+cursor plane pair, one encoder and
/// one always-connected connector carrying the standard mode table —
/// enough surface to drive every dispatcher path these tests need.
pub struct Fixture {
    pub device: Arc<Device>,
    pub crtc_id: u32,
    pub connector_id: u32,
    pub encoder_id: u32,
    pub primary_plane_id: u32,
    pub cursor_plane_id: u32,
}

pub fn build_fixture() -> Fixture {
    let driver = Arc::new(MockDriver::new());
    let device = Device::new(driver, DeviceLimits::default());

    let primary = device
        .register_plane(
            PlaneType::Primary,
            0b1,
            vec![format::FOURCC_XRGB8888, format::FOURCC_ARGB8888],
        )
        .unwrap();
    let cursor = device
        .register_plane(PlaneType::Cursor, 0b1, vec![format::FOURCC_ARGB8888])
        .unwrap();
    let crtc = device.register_crtc(primary.id, Some(cursor.id)).unwrap();
    let encoder = device.register_encoder(crtc.mask_bit()).unwrap();

    let mut modes = Vec::new();
    modes::add_standard_modes(&mut modes, 4096, 4096);
    let connector = device
        .register_connector(0, vec![encoder.id], modes, 300, 200)
        .unwrap();

    Fixture {
        device,
        crtc_id: crtc.id,
        connector_id: connector.id,
        encoder_id: encoder.id,
        primary_plane_id: primary.id,
        cursor_plane_id: cursor.id,
    }
}

/// Opens a fresh dispatcher against `fixture`'s device. `nonblocking`
/// controls the `File`'s event-read behaviour, matching the real
/// `OPEN`-time choice a transport makes.
pub fn open_dispatcher(fixture: &Fixture, transport: Arc<MockTransport>, nonblocking: bool) -> Dispatcher {
    let file = File::new(fixture.device.clone(), nonblocking);
    Dispatcher::new(file, transport)
}

/// The standard 1024x768 mode from the built-in table, already satisfying
/// `validate_mode_blob`'s timing-chain-ordered invariant.
pub fn mode_1024x768() -> drmcore::modes::ModeInfo {
    let mut modes = Vec::new();
    modes::add_standard_modes(&mut modes, 4096, 4096);
    modes
        .into_iter()
        .find(|m| m.hdisplay == 1024 && m.vdisplay == 768)
        .expect("the standard mode table always carries 1024x768")
}
