//! Per-subject calibration/tracking flow.
//!
//! The device owns the real state machine; this module reacts to its
//! events and issues the follow-up requests (pose detection, calibration,
//! tracking start) so a subject never sits in an unrecognized state
//! without a retry pending.

use std::collections::HashMap;

use crate::events::{CalibrationStatus, Event};
use crate::session::Control;
use crate::types::UserId;

/// How a new subject is taken from detection to a tracked skeleton.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TrackingFlow {
    /// Wait for a calibration pose, then calibrate. Calibration failure
    /// restarts pose detection.
    PoseThenCalibrate { pose: String },
    /// Request calibration as soon as the subject appears; failure
    /// re-requests calibration.
    #[default]
    DirectCalibrate,
    /// The event handler drives everything itself.
    Manual,
}

impl TrackingFlow {
    pub fn psi_pose() -> Self {
        TrackingFlow::PoseThenCalibrate {
            pose: "Psi".to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubjectPhase {
    Detected,
    PoseRequested,
    Calibrating,
    Tracking,
}

pub struct UserTracker {
    flow: TrackingFlow,
    phases: HashMap<UserId, SubjectPhase>,
}

impl UserTracker {
    pub fn new(flow: TrackingFlow) -> Self {
        Self {
            flow,
            phases: HashMap::new(),
        }
    }

    pub fn phase(&self, user: UserId) -> Option<SubjectPhase> {
        self.phases.get(&user).copied()
    }

    pub fn tracked(&self) -> impl Iterator<Item = UserId> + '_ {
        self.phases
            .iter()
            .filter(|(_, phase)| **phase == SubjectPhase::Tracking)
            .map(|(user, _)| *user)
    }

    /// Advance the flow for one device event. Request failures are logged
    /// and the phase left as-is; the next event for the subject retries.
    pub fn apply(&mut self, event: &Event, ctl: &mut Control<'_>) {
        match event {
            Event::NewUser { user } => {
                self.phases.insert(*user, SubjectPhase::Detected);
                match &self.flow {
                    TrackingFlow::PoseThenCalibrate { pose } => {
                        if self.request(ctl.start_pose_detection(pose, *user)) {
                            self.phases.insert(*user, SubjectPhase::PoseRequested);
                        }
                    }
                    TrackingFlow::DirectCalibrate => {
                        if self.request(ctl.request_calibration(*user, true)) {
                            self.phases.insert(*user, SubjectPhase::Calibrating);
                        }
                    }
                    TrackingFlow::Manual => {}
                }
            }
            Event::LostUser { user } => {
                // Unknown ids are a no-op, not an error.
                if self.phases.remove(user).is_none() {
                    log::debug!("lost event for untracked {user}, ignoring");
                }
            }
            Event::PoseDetected { user, .. } => {
                if self.flow == TrackingFlow::Manual {
                    return;
                }
                self.request(ctl.stop_pose_detection(*user));
                if self.request(ctl.request_calibration(*user, false)) {
                    self.phases.insert(*user, SubjectPhase::Calibrating);
                }
            }
            Event::CalibrationStart { user } => {
                if self.flow != TrackingFlow::Manual && self.phases.contains_key(user) {
                    self.phases.insert(*user, SubjectPhase::Calibrating);
                }
            }
            Event::CalibrationComplete { user, status } => {
                if self.flow == TrackingFlow::Manual {
                    return;
                }
                match status {
                    CalibrationStatus::Ok => {
                        if self.request(ctl.start_tracking(*user)) {
                            self.phases.insert(*user, SubjectPhase::Tracking);
                        }
                    }
                    CalibrationStatus::Failed => match &self.flow {
                        TrackingFlow::PoseThenCalibrate { pose } => {
                            if self.request(ctl.start_pose_detection(pose, *user)) {
                                self.phases.insert(*user, SubjectPhase::PoseRequested);
                            }
                        }
                        TrackingFlow::DirectCalibrate => {
                            if self.request(ctl.request_calibration(*user, true)) {
                                self.phases.insert(*user, SubjectPhase::Calibrating);
                            }
                        }
                        TrackingFlow::Manual => {}
                    },
                }
            }
            _ => {}
        }
    }

    fn request(&self, result: crate::error::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                log::warn!("tracking request failed: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceBackend, UpdateWait};
    use crate::sim::{Script, ScriptStep, SimulatedDevice};
    use crate::types::{GeneratorKind, Point3};

    fn sim_with_user(user: UserId) -> SimulatedDevice {
        let script = Script::new().at(1, ScriptStep::UserEnters {
            user,
            torso: Point3::new(0.0, 0.0, 2000.0),
        });
        let mut sim = SimulatedDevice::new(script).unpaced();
        sim.init().unwrap();
        sim.create_generator(GeneratorKind::User).unwrap();
        sim.start_all().unwrap();
        sim.wait_update(UpdateWait::Blocking).unwrap();
        sim.drain_events();
        sim
    }

    #[test]
    fn failure_then_success_ends_in_tracking() {
        let user = UserId(1);
        let mut sim = sim_with_user(user);
        let mut tracker = UserTracker::new(TrackingFlow::DirectCalibrate);

        let mut ctl = Control::new(&mut sim);
        tracker.apply(&Event::NewUser { user }, &mut ctl);
        assert_eq!(tracker.phase(user), Some(SubjectPhase::Calibrating));

        let mut ctl = Control::new(&mut sim);
        tracker.apply(
            &Event::CalibrationComplete {
                user,
                status: CalibrationStatus::Failed,
            },
            &mut ctl,
        );
        // Failure retried, never parked.
        assert_eq!(tracker.phase(user), Some(SubjectPhase::Calibrating));

        let mut ctl = Control::new(&mut sim);
        tracker.apply(
            &Event::CalibrationComplete {
                user,
                status: CalibrationStatus::Ok,
            },
            &mut ctl,
        );
        assert_eq!(tracker.phase(user), Some(SubjectPhase::Tracking));
        assert!(sim.is_tracking(user));
        assert_eq!(tracker.tracked().collect::<Vec<_>>(), vec![user]);
    }

    #[test]
    fn pose_flow_restarts_pose_detection_on_failure() {
        let user = UserId(1);
        let mut sim = sim_with_user(user);
        let mut tracker = UserTracker::new(TrackingFlow::psi_pose());

        let mut ctl = Control::new(&mut sim);
        tracker.apply(&Event::NewUser { user }, &mut ctl);
        assert_eq!(tracker.phase(user), Some(SubjectPhase::PoseRequested));

        let mut ctl = Control::new(&mut sim);
        tracker.apply(
            &Event::PoseDetected {
                user,
                pose: "Psi".into(),
            },
            &mut ctl,
        );
        assert_eq!(tracker.phase(user), Some(SubjectPhase::Calibrating));

        let mut ctl = Control::new(&mut sim);
        tracker.apply(
            &Event::CalibrationComplete {
                user,
                status: CalibrationStatus::Failed,
            },
            &mut ctl,
        );
        assert_eq!(tracker.phase(user), Some(SubjectPhase::PoseRequested));
    }

    #[test]
    fn lost_event_for_unknown_subject_is_a_no_op() {
        let mut sim = sim_with_user(UserId(1));
        let mut tracker = UserTracker::new(TrackingFlow::DirectCalibrate);

        let mut ctl = Control::new(&mut sim);
        tracker.apply(&Event::LostUser { user: UserId(42) }, &mut ctl);
        assert_eq!(tracker.phase(UserId(42)), None);
    }

    #[test]
    fn manual_flow_issues_no_requests() {
        let user = UserId(1);
        let mut sim = sim_with_user(user);
        let mut tracker = UserTracker::new(TrackingFlow::Manual);

        let mut ctl = Control::new(&mut sim);
        tracker.apply(&Event::NewUser { user }, &mut ctl);
        assert_eq!(tracker.phase(user), Some(SubjectPhase::Detected));

        // No calibration was requested, so nothing is delivered later.
        sim.wait_update(UpdateWait::Blocking).unwrap();
        sim.wait_update(UpdateWait::Blocking).unwrap();
        assert!(sim.drain_events().is_empty());
    }
}
