// SPDX-License-Identifier: MPL-2.0

//! `PRIME_HANDLE_TO_FD` / `PRIME_FD_TO_HANDLE` across two independent
//! `File`s sharing one device, the way two processes sharing a buffer
//! over a DRM fd would.

mod support;

use std::sync::Arc;

use drmcore::wire::{DrmModeCreateDumb, DrmModeMapDumb, DrmPrimeHandle};

use support::{build_fixture, open_dispatcher, MockTransport};

#[test]
fn prime_export_then_import_yields_the_same_underlying_buffer() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let exporter = open_dispatcher(&fixture, transport.clone(), true);
    let importer = open_dispatcher(&fixture, transport.clone(), true);

    let mut create_dumb = DrmModeCreateDumb {
        width: 256,
        height: 256,
        bpp: 32,
        ..Default::default()
    };
    exporter.mode_create_dumb(&mut create_dumb).unwrap();

    let mut export = DrmPrimeHandle {
        handle: create_dumb.handle,
        ..Default::default()
    };
    exporter.prime_handle_to_fd(&mut export).unwrap();
    assert_ne!(export.fd, 0);

    // Simulate the fd having been handed to the importing process: the
    // host now resolves that process's next ioctl to the credentials the
    // export minted.
    let served_credentials = {
        // `prime_handle_to_fd` registered the BO under whatever credentials
        // `Transport::serve_prime_file` returned; re-derive them the same
        // way `MockTransport` would have for this fd.
        let mut creds = [0u8; 16];
        creds[..4].copy_from_slice(&(export.fd).to_le_bytes());
        creds
    };
    transport.set_next_credentials(served_credentials);

    let mut import = DrmPrimeHandle::default();
    importer.prime_fd_to_handle(&mut import).unwrap();
    assert_ne!(import.handle, 0);

    let mut map_exporter = DrmModeMapDumb {
        handle: create_dumb.handle,
        ..Default::default()
    };
    exporter.mode_map_dumb(&mut map_exporter).unwrap();

    let mut map_importer = DrmModeMapDumb {
        handle: import.handle,
        ..Default::default()
    };
    importer.mode_map_dumb(&mut map_importer).unwrap();

    assert_eq!(
        map_exporter.offset, map_importer.offset,
        "both handles resolve to the same BO, so they must share one mmap slot"
    );
}

#[test]
fn reimporting_the_same_credential_in_one_file_reuses_its_existing_handle() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let exporter = open_dispatcher(&fixture, transport.clone(), true);
    let importer = open_dispatcher(&fixture, transport.clone(), true);

    let mut create_dumb = DrmModeCreateDumb {
        width: 64,
        height: 64,
        bpp: 32,
        ..Default::default()
    };
    exporter.mode_create_dumb(&mut create_dumb).unwrap();
    let mut export = DrmPrimeHandle {
        handle: create_dumb.handle,
        ..Default::default()
    };
    exporter.prime_handle_to_fd(&mut export).unwrap();

    let mut creds = [0u8; 16];
    creds[..4].copy_from_slice(&(export.fd).to_le_bytes());
    transport.set_next_credentials(creds);

    let mut first_import = DrmPrimeHandle::default();
    importer.prime_fd_to_handle(&mut first_import).unwrap();

    let mut second_import = DrmPrimeHandle::default();
    importer.prime_fd_to_handle(&mut second_import).unwrap();

    assert_eq!(first_import.handle, second_import.handle);
}
