// SPDX-License-Identifier: MPL-2.0

//! Pixel-format helpers: four-CC metadata and the legacy `(bpp, depth)` table.

use crate::error::{Error, Result};

/// Four-character-code pixel format identifiers, packed the way DRM and
/// V4L2 pack them: four ASCII bytes read little-endian as a `u32`.
macro_rules! fourcc {
    ($a:expr, $b:expr, $c:expr, $d:expr) => {
        ($a as u32) | ($b as u32) << 8 | ($c as u32) << 16 | ($d as u32) << 24
    };
}

pub const FOURCC_C8: u32 = fourcc!(b'C', b'8', b' ', b' ');
pub const FOURCC_XRGB1555: u32 = fourcc!(b'X', b'R', b'1', b'5');
pub const FOURCC_RGB565: u32 = fourcc!(b'R', b'G', b'1', b'6');
pub const FOURCC_RGB888: u32 = fourcc!(b'R', b'G', b'2', b'4');
pub const FOURCC_XRGB8888: u32 = fourcc!(b'X', b'R', b'2', b'4');
pub const FOURCC_XRGB2101010: u32 = fourcc!(b'X', b'R', b'3', b'0');
pub const FOURCC_ARGB8888: u32 = fourcc!(b'A', b'R', b'2', b'4');

/// Metadata about a pixel format that this core cares about: only the
/// storage size is needed, since the core never touches pixel bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub cpp: u32,
}

/// Looks up the bytes-per-pixel of a known four-CC.
pub fn format_info(fourcc: u32) -> Option<FormatInfo> {
    let cpp = match fourcc {
        FOURCC_C8 => 1,
        FOURCC_XRGB1555 | FOURCC_RGB565 => 2,
        FOURCC_RGB888 => 3,
        FOURCC_XRGB8888 | FOURCC_XRGB2101010 | FOURCC_ARGB8888 => 4,
        _ => return None,
    };
    Some(FormatInfo { cpp })
}

/// Maps a legacy `(bpp, depth)` pair, as used by `ADDFB` and dumb-buffer
/// creation, to the four-CC it denotes. Any pair outside the fixed table
/// is an error: there is no general (bpp, depth) -> fourcc rule.
pub fn convert_legacy_format(bpp: u32, depth: u32) -> Result<u32> {
    let fourcc = match (bpp, depth) {
        (8, 8) => FOURCC_C8,
        (16, 15) => FOURCC_XRGB1555,
        (16, 16) => FOURCC_RGB565,
        (24, 24) => FOURCC_RGB888,
        (32, 24) => FOURCC_XRGB8888,
        (32, 30) => FOURCC_XRGB2101010,
        (32, 32) => FOURCC_ARGB8888,
        _ => return Err(Error::ValidationFailed("unsupported (bpp, depth) pair")),
    };
    Ok(fourcc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_legacy_entry_round_trips_to_its_natural_cpp() {
        let table = [
            (8, 8, 1),
            (16, 15, 2),
            (16, 16, 2),
            (24, 24, 3),
            (32, 24, 4),
            (32, 30, 4),
            (32, 32, 4),
        ];
        for (bpp, depth, expected_cpp) in table {
            let fourcc = convert_legacy_format(bpp, depth).unwrap();
            assert_eq!(format_info(fourcc).unwrap().cpp, expected_cpp);
        }
    }

    #[test]
    fn unknown_bpp_depth_pair_is_an_error() {
        assert!(convert_legacy_format(32, 8).is_err());
    }

    #[test]
    fn unknown_fourcc_has_no_format_info() {
        assert!(format_info(0xdead_beef).is_none());
    }
}
