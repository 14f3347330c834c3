// SPDX-License-Identifier: MPL-2.0

//! The property registry: typed property descriptors and the Assignment
//! value they bind to an object during a commit.
//!
//! The `Property` hierarchy in the reference implementation is a small
//! open class hierarchy (`validate`, `write_to_state` as virtual methods).
//! Here it is modeled as data: a sealed [`PropertyKind`] plus a closure-free
//! [`Property`] that the commit engine interprets structurally, so the
//! built-in property table is a table, not a set of trait impls.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::modes::ModeInfo;
use crate::object::ObjectKind;
use crate::state::AtomicState;

pub const DRM_PROP_NAME_LEN: usize = 32;

fn name_to_bytes(name: &str) -> [u8; DRM_PROP_NAME_LEN] {
    let mut buf = [0u8; DRM_PROP_NAME_LEN];
    let bytes = name.as_bytes();
    let len = bytes.len().min(DRM_PROP_NAME_LEN - 1);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

bitflags::bitflags! {
    /// `DRM_MODE_PROP_*` flag bits, preserved bit-for-bit since clients
    /// inspect them directly via `MODE_GETPROPERTY`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PropertyFlags: u32 {
        const PENDING        = 1 << 0;
        const RANGE          = 1 << 1;
        const IMMUTABLE       = 1 << 2;
        const ENUM           = 1 << 3;
        const BLOB           = 1 << 4;
        const BITMASK        = 1 << 5;
        const LEGACY_TYPE     = Self::RANGE.bits() | Self::ENUM.bits() | Self::BLOB.bits() | Self::BITMASK.bits();
        const EXTENDED_TYPE  = 0x0000_ffc0;
        const OBJECT         = 1 << 6 | Self::EXTENDED_TYPE.bits() & (1 << 6);
        const SIGNED_RANGE   = 1 << 7 | Self::EXTENDED_TYPE.bits() & (1 << 7);
        const ATOMIC         = 0x8000_0000;
    }
}

/// Closed set of mode-object kinds a `Property { Object }` may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectPropertyType {
    Any,
    Crtc,
    Connector,
    Encoder,
    Framebuffer,
    Plane,
}

impl ObjectPropertyType {
    pub fn accepts(self, kind: ObjectKind) -> bool {
        match self {
            ObjectPropertyType::Any => true,
            ObjectPropertyType::Crtc => kind == ObjectKind::Crtc,
            ObjectPropertyType::Connector => kind == ObjectKind::Connector,
            ObjectPropertyType::Encoder => kind == ObjectKind::Encoder,
            ObjectPropertyType::Framebuffer => kind == ObjectKind::Framebuffer,
            ObjectPropertyType::Plane => kind == ObjectKind::Plane,
        }
    }

    /// The `DRM_MODE_OBJECT_*` wire value `MODE_GETPROPERTY` places in
    /// `values_out[0]` for an `Object`-kind property. `Any` has no single
    /// object kind, so it reports the wire's `DRM_MODE_OBJECT_ANY`
    /// sentinel rather than any one kind's tag.
    pub fn wire_value(self) -> u32 {
        match self {
            ObjectPropertyType::Any => crate::wire::DRM_MODE_OBJECT_ANY,
            ObjectPropertyType::Crtc => ObjectKind::Crtc.wire_value(),
            ObjectPropertyType::Connector => ObjectKind::Connector.wire_value(),
            ObjectPropertyType::Encoder => ObjectKind::Encoder.wire_value(),
            ObjectPropertyType::Framebuffer => ObjectKind::Framebuffer.wire_value(),
            ObjectPropertyType::Plane => ObjectKind::Plane.wire_value(),
        }
    }
}

/// The kind-specific payload of a property descriptor. Sealed: every
/// variant here is a wire-visible DRM property type and no others exist.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    IntRange { min: u64, max: u64 },
    IntSignedRange { min: i64, max: i64 },
    Enum(Vec<(u64, String)>),
    Object(ObjectPropertyType),
    Blob,
}

/// Well-known property identifiers registered on every [`Device`](crate::device::Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    SrcX,
    SrcY,
    SrcW,
    SrcH,
    CrtcX,
    CrtcY,
    CrtcW,
    CrtcH,
    FbId,
    CrtcId,
    ModeId,
    Active,
    Dpms,
    PlaneType,
    InFormats,
}

/// A registered property: its wire metadata plus the two projection hooks
/// that decide, at commit time, whether an assignment is legal and where
/// it lands in the touched object's substate.
#[derive(Debug, Clone)]
pub struct Property {
    pub id: PropertyId,
    pub object_id: u32,
    name: [u8; DRM_PROP_NAME_LEN],
    flags: PropertyFlags,
    kind: PropertyKind,
}

impl Property {
    pub fn new(
        id: PropertyId,
        object_id: u32,
        name: &str,
        flags: PropertyFlags,
        kind: PropertyKind,
    ) -> Self {
        let extra = match &kind {
            PropertyKind::IntRange { .. } => PropertyFlags::RANGE,
            PropertyKind::IntSignedRange { .. } => PropertyFlags::SIGNED_RANGE,
            PropertyKind::Enum(_) => PropertyFlags::ENUM,
            PropertyKind::Object(_) => PropertyFlags::OBJECT,
            PropertyKind::Blob => PropertyFlags::BLOB,
        };
        Self {
            id,
            object_id,
            name: name_to_bytes(name),
            flags: flags | extra,
            kind,
        }
    }

    pub fn name_bytes(&self) -> [u8; DRM_PROP_NAME_LEN] {
        self.name
    }

    pub fn flags(&self) -> u32 {
        self.flags.bits()
    }

    pub fn is_immutable(&self) -> bool {
        self.flags.contains(PropertyFlags::IMMUTABLE)
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn count_values(&self) -> u32 {
        match &self.kind {
            PropertyKind::IntRange { .. } | PropertyKind::IntSignedRange { .. } => 2,
            PropertyKind::Enum(entries) => entries.len() as u32,
            PropertyKind::Object(_) => 1,
            // A blob property carries its payload through the blob-id
            // list, not `values`; DRM reports zero values for it.
            PropertyKind::Blob => 0,
        }
    }

    pub fn count_enum_blobs(&self) -> u32 {
        match &self.kind {
            PropertyKind::Enum(entries) => entries.len() as u32,
            _ => 0,
        }
    }

    /// Validates a candidate value against this property's kind, per
    /// the rules laid out for the property registry: range membership,
    /// enum membership, object-kind compatibility, and the mode-info
    /// blob shape check for `MODE_ID`.
    pub fn validate(&self, value: &AssignmentValue) -> Result<()> {
        if self.is_immutable() {
            return Err(Error::ValidationFailed("property is immutable"));
        }

        match (&self.kind, value) {
            (PropertyKind::IntRange { min, max }, AssignmentValue::Int(v)) => {
                if *v < *min || *v > *max {
                    return Err(Error::ValidationFailed("integer out of range"));
                }
                if self.id == PropertyId::Dpms && *v >= 4 {
                    return Err(Error::ValidationFailed("dpms value out of range"));
                }
                Ok(())
            }
            (PropertyKind::IntSignedRange { min, max }, AssignmentValue::Int(v)) => {
                let signed = *v as i64;
                if signed < *min || signed > *max {
                    return Err(Error::ValidationFailed("signed integer out of range"));
                }
                Ok(())
            }
            (PropertyKind::Enum(entries), AssignmentValue::Int(v)) => {
                if entries.iter().any(|(value, _)| value == v) {
                    Ok(())
                } else {
                    Err(Error::ValidationFailed("value is not a member of the enum"))
                }
            }
            (PropertyKind::Object(allowed), AssignmentValue::Object(kind, _)) => {
                if allowed.accepts(*kind) {
                    Ok(())
                } else {
                    Err(Error::ValidationFailed("object kind not accepted by property"))
                }
            }
            (PropertyKind::Object(_), AssignmentValue::Null) => Ok(()),
            (PropertyKind::Blob, AssignmentValue::Blob(Some(bytes))) => {
                if self.id == PropertyId::ModeId {
                    validate_mode_blob(bytes)?;
                }
                Ok(())
            }
            (PropertyKind::Blob, AssignmentValue::Blob(None)) => Ok(()),
            _ => Err(Error::ValidationFailed(
                "assignment value shape does not match property kind",
            )),
        }
    }
}

fn validate_mode_blob(bytes: &[u8]) -> Result<()> {
    if bytes.len() != std::mem::size_of::<ModeInfo>() {
        return Err(Error::ValidationFailed("mode blob has the wrong size"));
    }
    let mode: ModeInfo = *bytemuck::from_bytes(bytes);
    if !(mode.hdisplay <= mode.hsync_start
        && mode.hsync_start <= mode.hsync_end
        && mode.hsync_end <= mode.htotal)
    {
        return Err(Error::ValidationFailed("horizontal timing chain is not ordered"));
    }
    if !(mode.vdisplay <= mode.vsync_start
        && mode.vsync_start <= mode.vsync_end
        && mode.vsync_end <= mode.vtotal)
    {
        return Err(Error::ValidationFailed("vertical timing chain is not ordered"));
    }
    Ok(())
}

/// One concrete value carried by an [`Assignment`].
#[derive(Debug, Clone)]
pub enum AssignmentValue {
    Int(u64),
    Object(ObjectKind, u32),
    Null,
    Blob(Option<Arc<[u8]>>),
}

/// A single (object, property, value) triple queued into a [`Configuration`](crate::commit::Configuration).
#[derive(Debug, Clone)]
pub struct Assignment {
    pub object_id: u32,
    pub object_kind: ObjectKind,
    pub property: Arc<Property>,
    pub value: AssignmentValue,
}

impl Assignment {
    pub fn int(object_id: u32, object_kind: ObjectKind, property: Arc<Property>, value: u64) -> Self {
        Self {
            object_id,
            object_kind,
            property,
            value: AssignmentValue::Int(value),
        }
    }

    pub fn object(
        object_id: u32,
        object_kind: ObjectKind,
        property: Arc<Property>,
        target_kind: ObjectKind,
        target_id: u32,
    ) -> Self {
        Self {
            object_id,
            object_kind,
            property,
            value: AssignmentValue::Object(target_kind, target_id),
        }
    }

    pub fn null_object(object_id: u32, object_kind: ObjectKind, property: Arc<Property>) -> Self {
        Self {
            object_id,
            object_kind,
            property,
            value: AssignmentValue::Null,
        }
    }

    pub fn blob(
        object_id: u32,
        object_kind: ObjectKind,
        property: Arc<Property>,
        blob: Option<Arc<[u8]>>,
    ) -> Self {
        Self {
            object_id,
            object_kind,
            property,
            value: AssignmentValue::Blob(blob),
        }
    }

    /// Projects this assignment's value onto the touched object's substate
    /// inside `state`. Returns an error if the property's target state
    /// does not exist for this object kind (e.g. a plane property aimed
    /// at a CRTC object).
    pub fn write_to_state(&self, state: &mut AtomicState) -> Result<()> {
        crate::state::write_assignment(state, self)
    }
}

/// Builds the fixed battery of properties registered on every `Device`,
/// keyed by [`PropertyId`] for fast lookup from the dispatcher and by
/// DRM object id for the wire-visible `MODE_GETPROPERTY` lookup.
pub fn build_standard_properties(
    next_id: &mut impl FnMut() -> u32,
) -> HashMap<PropertyId, Arc<Property>> {
    let mut table = HashMap::new();

    let mut reg = |id: PropertyId, name: &str, flags: PropertyFlags, kind: PropertyKind| {
        let object_id = next_id();
        table.insert(id, Arc::new(Property::new(id, object_id, name, flags, kind)));
    };

    reg(
        PropertyId::SrcX,
        "SRC_X",
        PropertyFlags::ATOMIC,
        PropertyKind::IntRange { min: 0, max: u32::MAX as u64 },
    );
    reg(
        PropertyId::SrcY,
        "SRC_Y",
        PropertyFlags::ATOMIC,
        PropertyKind::IntRange { min: 0, max: u32::MAX as u64 },
    );
    reg(
        PropertyId::SrcW,
        "SRC_W",
        PropertyFlags::ATOMIC,
        PropertyKind::IntRange { min: 0, max: u32::MAX as u64 },
    );
    reg(
        PropertyId::SrcH,
        "SRC_H",
        PropertyFlags::ATOMIC,
        PropertyKind::IntRange { min: 0, max: u32::MAX as u64 },
    );
    reg(
        PropertyId::CrtcX,
        "CRTC_X",
        PropertyFlags::ATOMIC,
        PropertyKind::IntSignedRange { min: i32::MIN as i64, max: i32::MAX as i64 },
    );
    reg(
        PropertyId::CrtcY,
        "CRTC_Y",
        PropertyFlags::ATOMIC,
        PropertyKind::IntSignedRange { min: i32::MIN as i64, max: i32::MAX as i64 },
    );
    reg(
        PropertyId::CrtcW,
        "CRTC_W",
        PropertyFlags::ATOMIC,
        PropertyKind::IntRange { min: 0, max: u32::MAX as u64 },
    );
    reg(
        PropertyId::CrtcH,
        "CRTC_H",
        PropertyFlags::ATOMIC,
        PropertyKind::IntRange { min: 0, max: u32::MAX as u64 },
    );
    reg(
        PropertyId::FbId,
        "FB_ID",
        PropertyFlags::ATOMIC,
        PropertyKind::Object(ObjectPropertyType::Framebuffer),
    );
    reg(
        PropertyId::CrtcId,
        "CRTC_ID",
        PropertyFlags::ATOMIC,
        PropertyKind::Object(ObjectPropertyType::Crtc),
    );
    reg(
        PropertyId::ModeId,
        "MODE_ID",
        PropertyFlags::ATOMIC,
        PropertyKind::Blob,
    );
    reg(
        PropertyId::Active,
        "ACTIVE",
        PropertyFlags::ATOMIC,
        PropertyKind::IntRange { min: 0, max: 1 },
    );
    // The reference table's DPMS ordering is non-standard: On=0, Standby=1,
    // Suspend=2, Off=3. Preserved here rather than mainline Linux's
    // Off/Standby/Suspend/On ordering; see the design notes.
    reg(
        PropertyId::Dpms,
        "DPMS",
        PropertyFlags::empty(),
        PropertyKind::Enum(vec![
            (0, "On".to_string()),
            (1, "Standby".to_string()),
            (2, "Suspend".to_string()),
            (3, "Off".to_string()),
        ]),
    );
    reg(
        PropertyId::PlaneType,
        "type",
        PropertyFlags::IMMUTABLE,
        PropertyKind::Enum(vec![
            (0, "Overlay".to_string()),
            (1, "Primary".to_string()),
            (2, "Cursor".to_string()),
        ]),
    );
    reg(
        PropertyId::InFormats,
        "IN_FORMATS",
        PropertyFlags::IMMUTABLE,
        PropertyKind::Blob,
    );

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties() -> HashMap<PropertyId, Arc<Property>> {
        let mut next = 1u32;
        build_standard_properties(&mut move || {
            let id = next;
            next += 1;
            id
        })
    }

    #[test]
    fn dpms_rejects_values_at_or_above_four() {
        let props = properties();
        let dpms = &props[&PropertyId::Dpms];
        assert!(dpms.validate(&AssignmentValue::Int(3)).is_ok());
        assert!(dpms.validate(&AssignmentValue::Int(4)).is_err());
    }

    #[test]
    fn dpms_enum_preserves_the_non_standard_ordering() {
        let props = properties();
        let dpms = &props[&PropertyId::Dpms];
        match dpms.kind() {
            PropertyKind::Enum(entries) => {
                assert_eq!(entries[0], (0, "On".to_string()));
                assert_eq!(entries[3], (3, "Off".to_string()));
            }
            _ => panic!("DPMS should be an enum property"),
        }
    }

    #[test]
    fn fb_id_rejects_non_framebuffer_objects() {
        let props = properties();
        let fb_id = &props[&PropertyId::FbId];
        assert!(fb_id
            .validate(&AssignmentValue::Object(ObjectKind::Framebuffer, 1))
            .is_ok());
        assert!(fb_id
            .validate(&AssignmentValue::Object(ObjectKind::Crtc, 1))
            .is_err());
        assert!(fb_id.validate(&AssignmentValue::Null).is_ok());
    }

    #[test]
    fn mode_id_rejects_wrongly_sized_blobs() {
        let props = properties();
        let mode_id = &props[&PropertyId::ModeId];
        let bad: Arc<[u8]> = Arc::from(vec![0u8; 4].into_boxed_slice());
        assert!(mode_id
            .validate(&AssignmentValue::Blob(Some(bad)))
            .is_err());
    }

    #[test]
    fn mode_id_rejects_unordered_horizontal_timing() {
        let props = properties();
        let mode_id = &props[&PropertyId::ModeId];
        let mut mode = ModeInfo::default();
        mode.hdisplay = 100;
        mode.hsync_start = 50; // hsync_start < hdisplay: invalid chain
        mode.hsync_end = 200;
        mode.htotal = 300;
        let bytes: Arc<[u8]> = Arc::from(bytemuck::bytes_of(&mode).to_vec().into_boxed_slice());
        assert!(mode_id
            .validate(&AssignmentValue::Blob(Some(bytes)))
            .is_err());
    }
}
