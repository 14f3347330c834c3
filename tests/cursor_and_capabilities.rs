// SPDX-License-Identifier: MPL-2.0

//! `MODE_CURSOR` desugaring into a plane assignment, `GET_CAP` for an
//! unknown capability, `SET_CLIENT_CAP(ATOMIC)` idempotence, and the
//! prop-blob create/get/destroy round trip.

mod support;

use std::sync::Arc;

use drmcore::error::Error;
use drmcore::format;
use drmcore::object::ObjectKind;
use drmcore::property::PropertyId;
use drmcore::wire::{
    DrmGetCap, DrmModeCreateBlob, DrmModeCreateDumb, DrmModeCursor, DrmModeDestroyBlob,
    DrmModeGetBlob, DrmModeGetProperty, DrmSetClientCap, DRM_CLIENT_CAP_ATOMIC, DRM_MODE_CURSOR_BO,
};

use support::{build_fixture, open_dispatcher, MockTransport};

#[test]
fn mode_cursor_bo_desugars_into_a_fresh_argb8888_framebuffer_on_the_cursor_plane() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, true);

    let mut create_dumb = DrmModeCreateDumb {
        width: 32,
        height: 32,
        bpp: 32,
        ..Default::default()
    };
    dispatcher.mode_create_dumb(&mut create_dumb).unwrap();

    let cursor = DrmModeCursor {
        flags: DRM_MODE_CURSOR_BO,
        crtc_id: fixture.crtc_id,
        width: 32,
        height: 32,
        handle: create_dumb.handle,
        ..Default::default()
    };
    dispatcher.mode_cursor(&cursor).unwrap();

    let plane = fixture.device.plane(fixture.cursor_plane_id).unwrap();
    let fb_id = plane.state.lock().unwrap().fb.expect("cursor plane should have a bound fb");
    let fb = fixture.device.framebuffer(fb_id).unwrap();
    assert_eq!(fb.fourcc, format::FOURCC_ARGB8888);
    assert_eq!(fb.width, 32);
    assert_eq!(fb.height, 32);
}

#[test]
fn mode_cursor_bo_with_a_zero_handle_clears_the_cursor_plane() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, true);

    let mut create_dumb = DrmModeCreateDumb {
        width: 32,
        height: 32,
        bpp: 32,
        ..Default::default()
    };
    dispatcher.mode_create_dumb(&mut create_dumb).unwrap();
    let set = DrmModeCursor {
        flags: DRM_MODE_CURSOR_BO,
        crtc_id: fixture.crtc_id,
        width: 32,
        height: 32,
        handle: create_dumb.handle,
        ..Default::default()
    };
    dispatcher.mode_cursor(&set).unwrap();

    let clear = DrmModeCursor {
        flags: DRM_MODE_CURSOR_BO,
        crtc_id: fixture.crtc_id,
        handle: 0,
        ..Default::default()
    };
    dispatcher.mode_cursor(&clear).unwrap();

    let plane = fixture.device.plane(fixture.cursor_plane_id).unwrap();
    assert!(plane.state.lock().unwrap().fb.is_none());
}

#[test]
fn get_cap_for_an_unknown_capability_is_illegal_argument_with_a_zeroed_value() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, true);

    let mut req = DrmGetCap {
        capability: 0xdead_beef,
        value: 0xffff_ffff,
    };
    let err = dispatcher.get_cap(&mut req).unwrap_err();
    assert!(matches!(err, Error::UnknownCapability(0xdead_beef)));
    assert_eq!(err.wire_code(), drmcore::error::WireCode::IllegalArgument);
    assert_eq!(req.value, 0);
}

#[test]
fn set_client_cap_atomic_is_idempotent() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, true);

    for _ in 0..2 {
        dispatcher
            .set_client_cap(&DrmSetClientCap {
                capability: DRM_CLIENT_CAP_ATOMIC,
                value: 1,
            })
            .unwrap();
        assert!(dispatcher.file().atomic());
        assert!(dispatcher.file().universal_planes());
    }
}

#[test]
fn createpropblob_getpropblob_destroypropblob_round_trips() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, true);

    let payload = [1u8, 2, 3, 4, 5, 6, 7, 8];
    let mut create = DrmModeCreateBlob {
        length: payload.len() as u32,
        ..Default::default()
    };
    dispatcher.mode_createpropblob(&mut create, &payload).unwrap();
    assert_ne!(create.blob_id, 0);

    let mut get = DrmModeGetBlob {
        blob_id: create.blob_id,
        ..Default::default()
    };
    let mut data_out = [0u8; 8];
    dispatcher.mode_getpropblob(&mut get, &mut data_out).unwrap();
    assert_eq!(get.length, payload.len() as u32);
    assert_eq!(data_out, payload);

    dispatcher
        .mode_destroypropblob(&DrmModeDestroyBlob { blob_id: create.blob_id })
        .unwrap();

    let err = dispatcher
        .mode_destroypropblob(&DrmModeDestroyBlob { blob_id: create.blob_id })
        .unwrap_err();
    assert!(matches!(err, Error::NoSuchBlob(_)));
}

#[test]
fn getproperty_on_an_object_property_reports_its_allowed_type_in_values_out() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, true);

    let fb_id_property = fixture.device.property(PropertyId::FbId);
    let mut req = DrmModeGetProperty {
        prop_id: fb_id_property.object_id,
        ..Default::default()
    };
    let mut values_out = [0u64; 4];
    let mut enum_out = [(0u64, [0u8; 32]); 4];
    dispatcher.mode_getproperty(&mut req, &mut values_out, &mut enum_out).unwrap();

    assert_eq!(req.count_values, 1);
    assert_eq!(values_out[0], ObjectKind::Framebuffer.wire_value() as u64);
}
