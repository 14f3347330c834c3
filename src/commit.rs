// SPDX-License-Identifier: MPL-2.0

//! The commit engine: `capture` runs the generic validate/project loop
//! over a batch of assignments; `Configuration` is the driver-supplied
//! half that actually programs hardware and reports completion.
//!
//! Commit is a two-phase protocol. `capture` never touches a live object:
//! it only writes into the scratch `AtomicState`, so a validation failure
//! costs nothing beyond dropping that scratch value. `commit`/
//! `wait_for_completion` are fire-and-forget plus a blocking wait,
//! deliberately split so a caller can avoid holding any lock across the
//! wait.

use std::sync::Arc;

use log::{debug, warn};

use crate::device::Device;
use crate::error::Result;
use crate::property::Assignment;
use crate::state::AtomicState;

/// Runs every assignment's `validate` then `write_to_state` against
/// `state`. Stops at the first failing assignment and returns its error;
/// the caller is expected to discard `state` in that case, since up to
/// that point only the scratch state (never a live object) was touched.
pub fn capture(assignments: &[Assignment], state: &mut AtomicState) -> Result<()> {
    for assignment in assignments {
        if let Err(err) = assignment
            .property
            .validate(&assignment.value)
            .and_then(|_| assignment.write_to_state(state))
        {
            warn!(
                "commit rejected assignment on object {} ({:?}): {err}",
                assignment.object_id, assignment.object_kind
            );
            return Err(err);
        }
    }
    Ok(())
}

/// The driver-supplied half of a commit: applying a captured
/// `AtomicState` to hardware and reporting when that has actually taken
/// effect. A fresh `Configuration` is requested from the `Driver` for
/// every commit; none of this crate's state is shared across instances.
pub trait Configuration: Send {
    /// Hands `state` to the driver for hardware programming and returns
    /// it back to the caller once the driver has accepted the batch
    /// (synchronously; the actual hardware apply may still be pending).
    /// This call itself must not block past acceptance. `state` becomes
    /// the new live substate for every object it touched only once the
    /// caller calls [`AtomicState::publish`] on the returned value,
    /// which must not happen before `wait_for_completion` confirms
    /// success.
    fn commit(&mut self, state: AtomicState) -> Result<AtomicState>;

    /// Blocks until the commit submitted via `commit` has fully taken
    /// effect (e.g. the hardware retired the modeset at a vblank).
    fn wait_for_completion(&mut self) -> Result<()>;
}

/// Runs the full synchronous commit protocol used by every dispatcher
/// path except a `NONBLOCK` atomic commit: capture, hand off to the
/// driver, wait for the hardware to retire the change, then publish the
/// new substate onto the live objects. Returns the ids of every CRTC the
/// commit touched, for the caller to arm page-flip events against.
pub fn commit_sync(device: &Arc<Device>, assignments: &[Assignment]) -> Result<Vec<u32>> {
    let mut state = device.fresh_atomic_state();
    capture(assignments, &mut state)?;
    let touched_crtcs = state.referenced_crtcs();
    apply_sync(device, state, &touched_crtcs)?;
    Ok(touched_crtcs)
}

/// Runs the commit protocol without blocking the caller: `capture` and
/// the driver's (synchronous) acceptance of the batch still happen
/// inline, but `wait_for_completion` and the resulting `publish` happen
/// on a background thread. `on_complete` runs after publish, with the
/// ids of every CRTC the commit touched, so the caller can arm
/// page-flip-complete events.
pub fn commit_async(
    device: Arc<Device>,
    assignments: Vec<Assignment>,
    on_complete: impl FnOnce(&[u32]) + Send + 'static,
) -> Result<Vec<u32>> {
    let mut state = device.fresh_atomic_state();
    capture(&assignments, &mut state)?;
    let touched_crtcs = state.referenced_crtcs();
    apply_async(device, state, touched_crtcs.clone(), on_complete)?;
    Ok(touched_crtcs)
}

/// The tail half of [`commit_sync`], split out so a caller that needs the
/// touched-CRTC set *before* committing (to validate a `PAGE_FLIP_EVENT`
/// request, say) can call [`capture`] itself, inspect
/// [`AtomicState::referenced_crtcs`], and only then drive the apply.
pub fn apply_sync(device: &Arc<Device>, state: AtomicState, touched_crtcs: &[u32]) -> Result<()> {
    let mut configuration = device.create_configuration();
    debug!("submitting commit touching crtcs {touched_crtcs:?}");
    let state = configuration.commit(state)?;
    configuration.wait_for_completion()?;
    state.publish();
    debug!("commit touching crtcs {touched_crtcs:?} completed");
    Ok(())
}

/// The tail half of [`commit_async`]; see [`apply_sync`] for why a caller
/// would reach for this instead.
pub fn apply_async(
    device: Arc<Device>,
    state: AtomicState,
    touched_crtcs: Vec<u32>,
    on_complete: impl FnOnce(&[u32]) + Send + 'static,
) -> Result<()> {
    let mut configuration = device.create_configuration();
    let state = configuration.commit(state)?;
    std::thread::spawn(move || match configuration.wait_for_completion() {
        Ok(()) => {
            state.publish();
            debug!("async commit touching crtcs {touched_crtcs:?} completed");
            on_complete(&touched_crtcs);
        }
        Err(err) => {
            warn!("async commit touching crtcs {touched_crtcs:?} failed: {err}");
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;
    use crate::property::{AssignmentValue, Property, PropertyId, PropertyKind};
    use std::sync::Arc;

    #[test]
    fn capture_stops_at_the_first_validation_failure() {
        let active = Arc::new(Property::new(
            PropertyId::Active,
            1,
            "ACTIVE",
            crate::property::PropertyFlags::empty(),
            PropertyKind::IntRange { min: 0, max: 1 },
        ));
        let bad = Assignment {
            object_id: 1,
            object_kind: ObjectKind::Crtc,
            property: active,
            value: AssignmentValue::Int(7),
        };
        // capture() is exercised end to end in device/dispatcher integration
        // tests; here we only check the validate-first-short-circuit shape
        // holds for a lone failing assignment.
        assert!(bad.property.validate(&bad.value).is_err());
    }
}
