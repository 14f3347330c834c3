// SPDX-License-Identifier: MPL-2.0

//! End-to-end legacy mode-set: dumb buffer, `ADDFB`, `SETCRTC`, `GETCRTC`.

mod support;

use std::sync::Arc;

use drmcore::format;
use drmcore::wire::{
    DrmModeCreateDumb, DrmModeCrtc, DrmModeFbCmd, DrmModeFbCmd2, DrmModeGetFb2, DRM_MODE_FB_MODIFIERS,
};

use support::{build_fixture, mode_1024x768, open_dispatcher, MockTransport};

#[test]
fn dumb_buffer_addfb_setcrtc_getcrtc_round_trips() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, false);

    let mut create_dumb = DrmModeCreateDumb {
        width: 1024,
        height: 768,
        bpp: 32,
        ..Default::default()
    };
    dispatcher.mode_create_dumb(&mut create_dumb).unwrap();
    assert_ne!(create_dumb.handle, 0);
    assert_eq!(create_dumb.pitch, 1024 * 4);
    assert_eq!(create_dumb.size, (1024 * 4 * 768) as u64);

    let mut addfb = DrmModeFbCmd {
        width: 1024,
        height: 768,
        pitch: create_dumb.pitch,
        bpp: 32,
        depth: 24,
        handle: create_dumb.handle,
        ..Default::default()
    };
    dispatcher.mode_addfb(&mut addfb).unwrap();
    assert_ne!(addfb.fb_id, 0);

    let mode = mode_1024x768();
    let setcrtc = DrmModeCrtc {
        crtc_id: fixture.crtc_id,
        fb_id: addfb.fb_id,
        x: 0,
        y: 0,
        mode_valid: 1,
        mode,
        ..Default::default()
    };
    dispatcher
        .mode_setcrtc(&setcrtc, &[fixture.connector_id])
        .unwrap();

    let mut getcrtc = DrmModeCrtc {
        crtc_id: fixture.crtc_id,
        ..Default::default()
    };
    dispatcher.mode_getcrtc(&mut getcrtc).unwrap();
    assert_eq!(getcrtc.mode_valid, 1);
    assert_eq!(getcrtc.fb_id, addfb.fb_id);
    assert_eq!(getcrtc.mode.hdisplay, 1024);
    assert_eq!(getcrtc.mode.vdisplay, 768);
}

#[test]
fn setcrtc_with_mode_valid_zero_disables_the_crtc() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, false);

    let mut create_dumb = DrmModeCreateDumb {
        width: 640,
        height: 480,
        bpp: 32,
        ..Default::default()
    };
    dispatcher.mode_create_dumb(&mut create_dumb).unwrap();
    let mut addfb = DrmModeFbCmd {
        width: 640,
        height: 480,
        pitch: create_dumb.pitch,
        bpp: 32,
        depth: 24,
        handle: create_dumb.handle,
        ..Default::default()
    };
    dispatcher.mode_addfb(&mut addfb).unwrap();

    let mode = mode_1024x768();
    let setcrtc = DrmModeCrtc {
        crtc_id: fixture.crtc_id,
        fb_id: addfb.fb_id,
        mode_valid: 1,
        mode,
        ..Default::default()
    };
    dispatcher
        .mode_setcrtc(&setcrtc, &[fixture.connector_id])
        .unwrap();

    let disable = DrmModeCrtc {
        crtc_id: fixture.crtc_id,
        mode_valid: 0,
        ..Default::default()
    };
    dispatcher.mode_setcrtc(&disable, &[]).unwrap();

    let mut getcrtc = DrmModeCrtc {
        crtc_id: fixture.crtc_id,
        ..Default::default()
    };
    dispatcher.mode_getcrtc(&mut getcrtc).unwrap();
    assert_eq!(getcrtc.mode_valid, 0);
    assert_eq!(getcrtc.fb_id, 0);
}

#[test]
fn addfb2_with_a_non_linear_modifier_round_trips_through_getfb2() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, false);

    let mut create_dumb = DrmModeCreateDumb {
        width: 256,
        height: 256,
        bpp: 32,
        ..Default::default()
    };
    dispatcher.mode_create_dumb(&mut create_dumb).unwrap();

    const SOME_TILED_MODIFIER: u64 = 0x0100_0000_0000_0001;
    let mut addfb2 = DrmModeFbCmd2 {
        width: 256,
        height: 256,
        pixel_format: format::FOURCC_XRGB8888,
        flags: DRM_MODE_FB_MODIFIERS,
        handles: [create_dumb.handle, 0, 0, 0],
        pitches: [create_dumb.pitch, 0, 0, 0],
        modifier: [SOME_TILED_MODIFIER, 0, 0, 0],
        ..Default::default()
    };
    dispatcher.mode_addfb2(&mut addfb2).unwrap();
    assert_ne!(addfb2.fb_id, 0);

    let mut getfb2 = DrmModeGetFb2 {
        fb_id: addfb2.fb_id,
        ..Default::default()
    };
    dispatcher.mode_getfb2(&mut getfb2).unwrap();
    assert_eq!(getfb2.modifier[0], SOME_TILED_MODIFIER);
    assert_eq!(getfb2.pixel_format, format::FOURCC_XRGB8888);
}

#[test]
fn addfb2_without_the_modifiers_flag_overrides_to_linear() {
    let fixture = build_fixture();
    let transport = Arc::new(MockTransport::new());
    let dispatcher = open_dispatcher(&fixture, transport, false);

    let mut create_dumb = DrmModeCreateDumb {
        width: 128,
        height: 128,
        bpp: 32,
        ..Default::default()
    };
    dispatcher.mode_create_dumb(&mut create_dumb).unwrap();

    let mut addfb2 = DrmModeFbCmd2 {
        width: 128,
        height: 128,
        pixel_format: format::FOURCC_XRGB8888,
        handles: [create_dumb.handle, 0, 0, 0],
        pitches: [create_dumb.pitch, 0, 0, 0],
        modifier: [0xdead_beef, 0, 0, 0],
        ..Default::default()
    };
    dispatcher.mode_addfb2(&mut addfb2).unwrap();

    let mut getfb2 = DrmModeGetFb2 {
        fb_id: addfb2.fb_id,
        ..Default::default()
    };
    dispatcher.mode_getfb2(&mut getfb2).unwrap();
    assert_eq!(getfb2.modifier[0], drmcore::wire::DRM_FORMAT_MOD_LINEAR);
}
