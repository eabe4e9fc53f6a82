//! Typed session layer for depth-camera user, skeleton, gesture and hand
//! tracking, plus a scripted simulator and software overlay rendering.
//!
//! The heavy lifting (sensing, skeleton solving, gesture recognition)
//! belongs to the device behind [`backend::DeviceBackend`]; this crate
//! owns the glue the demos are built from: the create → configure →
//! start → poll → shutdown lifecycle, typed event dispatch, the
//! calibration/tracking flow, and real-world → projective overlays.
//!
//! A `Session` is assembled from a `SessionBuilder`; configuration and
//! handler registration close when `start()` consumes the builder, so
//! callbacks can never be registered after generation begins.

pub mod backend;
pub mod error;
pub mod events;
pub mod render;
pub mod session;
pub mod sim;
pub mod skeleton;
pub mod tracker;
pub mod types;

pub use backend::{DeviceBackend, UpdateWait};
pub use error::{Error, Result};
pub use events::{CalibrationStatus, Event, EventHandler};
pub use session::{Control, ErrorPolicy, PollOutcome, Session, SessionBuilder};
pub use sim::{Script, ScriptStep, SimulatedDevice};
pub use skeleton::{
    FULL_BODY_SEGMENTS, Joint, JointPosition, SkeletonProfile, UPPER_BODY_SEGMENTS,
};
pub use tracker::{SubjectPhase, TrackingFlow, UserTracker};
pub use types::{
    ColorFrame, DepthFrame, GeneratorKind, Gesture, HandId, OutputMode, Point3, Projective, UserId,
};
