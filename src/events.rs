use crate::session::Control;
use crate::types::{Gesture, HandId, Point3, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibrationStatus {
    Ok,
    Failed,
}

/// Every asynchronous device event, delivered synchronously during
/// `Session::poll` in the order the device generated them.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    NewUser {
        user: UserId,
    },
    LostUser {
        user: UserId,
    },
    CalibrationStart {
        user: UserId,
    },
    CalibrationComplete {
        user: UserId,
        status: CalibrationStatus,
    },
    PoseDetected {
        user: UserId,
        pose: String,
    },
    GestureRecognized {
        gesture: Gesture,
        id_position: Point3,
        end_position: Point3,
    },
    GestureProgress {
        gesture: Gesture,
        position: Point3,
        progress: f32,
    },
    HandCreated {
        hand: HandId,
        position: Point3,
        time: f64,
    },
    HandUpdated {
        hand: HandId,
        position: Point3,
        time: f64,
    },
    HandDestroyed {
        hand: HandId,
        time: f64,
    },
}

/// Replaces the raw callback-with-cookie pattern: the handler reaches
/// shared state through `self` and drives the device through `Control`.
/// Handlers run on the polling thread, exactly once per event.
pub trait EventHandler {
    fn on_event(&mut self, event: &Event, ctl: &mut Control<'_>);
}

impl<F> EventHandler for F
where
    F: FnMut(&Event, &mut Control<'_>),
{
    fn on_event(&mut self, event: &Event, ctl: &mut Control<'_>) {
        self(event, ctl)
    }
}
