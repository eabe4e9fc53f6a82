//! Device SDK boundary.
//!
//! Everything the session needs from a depth camera goes through
//! `DeviceBackend`: a source of frames and queued events plus a
//! coordinate transform. Nothing here depends on a device model; the
//! shipped implementation is [`crate::sim::SimulatedDevice`].

use crate::error::Result;
use crate::events::Event;
use crate::skeleton::{Joint, JointPosition, SkeletonProfile};
use crate::types::{
    ColorFrame, DepthFrame, GeneratorKind, Gesture, HandId, OutputMode, Point3, Projective, UserId,
};

/// Polling contract for one update call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateWait {
    /// Block until new data is available for every running generator.
    Blocking,
    /// Take whatever is latest without waiting.
    None,
}

pub trait DeviceBackend: Send {
    // -- lifecycle ----------------------------------------------------------

    fn init(&mut self) -> Result<()>;
    fn create_generator(&mut self, kind: GeneratorKind) -> Result<()>;
    fn set_output_mode(&mut self, kind: GeneratorKind, mode: OutputMode) -> Result<()>;
    fn set_mirror(&mut self, mirror: bool) -> Result<()>;

    /// Shift the depth generator's viewpoint onto the color generator so
    /// projective coordinates land on the color image.
    fn align_depth_to_color(&mut self) -> Result<()>;

    fn set_skeleton_profile(&mut self, profile: SkeletonProfile) -> Result<()>;
    fn set_hand_smoothing(&mut self, factor: f32) -> Result<()>;
    fn start_all(&mut self) -> Result<()>;
    fn stop_all(&mut self) -> Result<()>;
    fn shutdown(&mut self) -> Result<()>;

    // -- per-poll -----------------------------------------------------------

    fn wait_update(&mut self, wait: UpdateWait) -> Result<()>;
    fn copy_color(&self, out: &mut ColorFrame) -> Result<()>;
    fn copy_depth(&self, out: &mut DepthFrame) -> Result<()>;

    /// Events generated since the previous drain, in generation order.
    fn drain_events(&mut self) -> Vec<Event>;

    // -- live subject state -------------------------------------------------

    fn users(&self) -> Vec<UserId>;
    fn is_tracking(&self, user: UserId) -> bool;
    fn joint(&self, user: UserId, joint: Joint) -> Result<JointPosition>;

    // -- capability control -------------------------------------------------

    fn start_pose_detection(&mut self, pose: &str, user: UserId) -> Result<()>;
    fn stop_pose_detection(&mut self, user: UserId) -> Result<()>;
    fn request_calibration(&mut self, user: UserId, force: bool) -> Result<()>;
    fn start_tracking(&mut self, user: UserId) -> Result<()>;
    fn add_gesture(&mut self, gesture: Gesture) -> Result<()>;
    fn remove_gesture(&mut self, gesture: Gesture) -> Result<()>;
    fn start_hand_tracking(&mut self, position: Point3) -> Result<()>;
    fn stop_hand_tracking(&mut self, hand: HandId) -> Result<()>;

    // -- coordinate conversion ----------------------------------------------

    /// Real-world to projective through the depth generator's calibration.
    /// Overlays on the color image are only correct after
    /// [`DeviceBackend::align_depth_to_color`].
    fn to_projective(&self, points: &[Point3]) -> Result<Vec<Projective>>;
}
