//! Device session: owns the context, the generators and the frame
//! buffers, and drives callback dispatch from its poll step.
//!
//! Configuration and handler registration happen on `SessionBuilder`;
//! `start()` consumes the builder, so registering anything after
//! generation has started is impossible by construction.

use crate::backend::{DeviceBackend, UpdateWait};
use crate::error::{Error, Result};
use crate::events::{Event, EventHandler};
use crate::skeleton::{Joint, JointPosition, SkeletonProfile};
use crate::tracker::{SubjectPhase, TrackingFlow, UserTracker};
use crate::types::{
    ColorFrame, DepthFrame, GeneratorKind, Gesture, HandId, OutputMode, Point3, Projective, UserId,
};

/// What to do when the device reports a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Any setup or poll failure aborts the session.
    FailFast,
    /// Setup failures past context init are logged and skipped; poll
    /// failures are tolerated until `max_consecutive_failures` in a row.
    BestEffort { max_consecutive_failures: u32 },
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::BestEffort {
            max_consecutive_failures: 30,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Fresh data was copied and all queued events dispatched.
    Updated,
    /// A transient failure was tolerated; buffers hold the previous frame.
    Skipped,
}

/// Capability control surface handed to event handlers and the tracker
/// while the session dispatches events.
pub struct Control<'a> {
    backend: &'a mut dyn DeviceBackend,
}

impl<'a> Control<'a> {
    pub(crate) fn new(backend: &'a mut dyn DeviceBackend) -> Self {
        Self { backend }
    }

    pub fn start_pose_detection(&mut self, pose: &str, user: UserId) -> Result<()> {
        self.backend.start_pose_detection(pose, user)
    }

    pub fn stop_pose_detection(&mut self, user: UserId) -> Result<()> {
        self.backend.stop_pose_detection(user)
    }

    pub fn request_calibration(&mut self, user: UserId, force: bool) -> Result<()> {
        self.backend.request_calibration(user, force)
    }

    pub fn start_tracking(&mut self, user: UserId) -> Result<()> {
        self.backend.start_tracking(user)
    }

    pub fn add_gesture(&mut self, gesture: Gesture) -> Result<()> {
        self.backend.add_gesture(gesture)
    }

    pub fn remove_gesture(&mut self, gesture: Gesture) -> Result<()> {
        self.backend.remove_gesture(gesture)
    }

    pub fn start_hand_tracking(&mut self, position: Point3) -> Result<()> {
        self.backend.start_hand_tracking(position)
    }

    pub fn stop_hand_tracking(&mut self, hand: HandId) -> Result<()> {
        self.backend.stop_hand_tracking(hand)
    }

    pub fn to_projective(&self, points: &[Point3]) -> Result<Vec<Projective>> {
        self.backend.to_projective(points)
    }

    pub fn joint(&self, user: UserId, joint: Joint) -> Result<JointPosition> {
        self.backend.joint(user, joint)
    }
}

pub struct SessionBuilder {
    backend: Box<dyn DeviceBackend>,
    generators: Vec<GeneratorKind>,
    output_mode: OutputMode,
    mirror: bool,
    align_viewpoints: bool,
    skeleton_profile: Option<SkeletonProfile>,
    hand_smoothing: Option<f32>,
    gestures: Vec<Gesture>,
    flow: TrackingFlow,
    policy: ErrorPolicy,
    handler: Option<Box<dyn EventHandler>>,
}

impl SessionBuilder {
    pub fn new(backend: Box<dyn DeviceBackend>) -> Self {
        Self {
            backend,
            generators: Vec::new(),
            output_mode: OutputMode::vga(),
            mirror: false,
            align_viewpoints: false,
            skeleton_profile: None,
            hand_smoothing: None,
            gestures: Vec::new(),
            flow: TrackingFlow::Manual,
            policy: ErrorPolicy::default(),
            handler: None,
        }
    }

    pub fn generator(mut self, kind: GeneratorKind) -> Self {
        if !self.generators.contains(&kind) {
            self.generators.push(kind);
        }
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// Align the depth viewpoint onto the color image so overlays drawn
    /// from projective coordinates land where the subject appears.
    pub fn align_viewpoints(mut self) -> Self {
        self.align_viewpoints = true;
        self
    }

    pub fn skeleton_profile(mut self, profile: SkeletonProfile) -> Self {
        self.skeleton_profile = Some(profile);
        self
    }

    pub fn hand_smoothing(mut self, factor: f32) -> Self {
        self.hand_smoothing = Some(factor);
        self
    }

    pub fn gesture(mut self, gesture: Gesture) -> Self {
        if !self.gestures.contains(&gesture) {
            self.gestures.push(gesture);
        }
        self
    }

    pub fn tracking_flow(mut self, flow: TrackingFlow) -> Self {
        self.flow = flow;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn on_event(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Initialize, create and configure every generator, then start
    /// generation. Consumes the builder: there is no way to register a
    /// handler once generation runs.
    pub fn start(mut self) -> Result<Session> {
        self.validate()?;

        // Context init failure is fatal under either policy; nothing
        // below can work without a context.
        self.backend.init()?;

        let fail_fast = self.policy == ErrorPolicy::FailFast;

        Self::setup(fail_fast, "set mirror", self.backend.set_mirror(self.mirror))?;

        for kind in &self.generators {
            Self::setup(
                fail_fast,
                "create generator",
                self.backend.create_generator(*kind),
            )?;
        }

        // Spatially correlated generators share one output mode.
        for kind in [GeneratorKind::Depth, GeneratorKind::Color] {
            if self.generators.contains(&kind) {
                Self::setup(
                    fail_fast,
                    "set output mode",
                    self.backend.set_output_mode(kind, self.output_mode),
                )?;
            }
        }

        if self.align_viewpoints {
            Self::setup(
                fail_fast,
                "align viewpoints",
                self.backend.align_depth_to_color(),
            )?;
        }

        if let Some(profile) = self.skeleton_profile {
            Self::setup(
                fail_fast,
                "set skeleton profile",
                self.backend.set_skeleton_profile(profile),
            )?;
        }

        if let Some(factor) = self.hand_smoothing {
            Self::setup(
                fail_fast,
                "set hand smoothing",
                self.backend.set_hand_smoothing(factor),
            )?;
        }

        for gesture in &self.gestures {
            Self::setup(fail_fast, "add gesture", self.backend.add_gesture(*gesture))?;
        }

        self.backend.start_all()?;

        let color = self
            .generators
            .contains(&GeneratorKind::Color)
            .then(|| ColorFrame::empty(self.output_mode));
        let depth = self
            .generators
            .contains(&GeneratorKind::Depth)
            .then(|| DepthFrame::empty(self.output_mode));

        Ok(Session {
            backend: self.backend,
            handler: self.handler,
            tracker: UserTracker::new(self.flow),
            color,
            depth,
            policy: self.policy,
            consecutive_failures: 0,
            shut_down: false,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.generators.is_empty() {
            return Err(Error::InvalidConfig("no generators selected".into()));
        }
        if self.align_viewpoints
            && !(self.generators.contains(&GeneratorKind::Depth)
                && self.generators.contains(&GeneratorKind::Color))
        {
            return Err(Error::InvalidConfig(
                "viewpoint alignment needs both the depth and color generators".into(),
            ));
        }
        if self.skeleton_profile.is_some() && !self.generators.contains(&GeneratorKind::User) {
            return Err(Error::InvalidConfig(
                "skeleton profile needs the user generator".into(),
            ));
        }
        if self.hand_smoothing.is_some() && !self.generators.contains(&GeneratorKind::Hand) {
            return Err(Error::InvalidConfig(
                "hand smoothing needs the hand generator".into(),
            ));
        }
        if !self.gestures.is_empty() && !self.generators.contains(&GeneratorKind::Gesture) {
            return Err(Error::InvalidConfig(
                "gestures need the gesture generator".into(),
            ));
        }
        Ok(())
    }

    fn setup(fail_fast: bool, what: &str, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if fail_fast => Err(err),
            Err(err) => {
                log::error!("{what} failed, continuing without: {err}");
                Ok(())
            }
        }
    }
}

pub struct Session {
    backend: Box<dyn DeviceBackend>,
    handler: Option<Box<dyn EventHandler>>,
    tracker: UserTracker,
    color: Option<ColorFrame>,
    depth: Option<DepthFrame>,
    policy: ErrorPolicy,
    consecutive_failures: u32,
    shut_down: bool,
}

impl Session {
    /// One poll iteration: update the device, refresh the frame buffers
    /// in place, then dispatch every queued event.
    pub fn poll(&mut self, wait: UpdateWait) -> Result<PollOutcome> {
        match self.backend.wait_update(wait) {
            Ok(()) => self.consecutive_failures = 0,
            Err(err @ Error::EndOfStream) => return Err(err),
            Err(err) => match self.policy {
                ErrorPolicy::FailFast => return Err(err),
                ErrorPolicy::BestEffort {
                    max_consecutive_failures,
                } => {
                    self.consecutive_failures += 1;
                    if self.consecutive_failures >= max_consecutive_failures {
                        return Err(Error::PersistentFailure {
                            failures: self.consecutive_failures,
                            last: err.to_string(),
                        });
                    }
                    log::warn!(
                        "device update failed ({} in a row): {err}",
                        self.consecutive_failures
                    );
                    return Ok(PollOutcome::Skipped);
                }
            },
        }

        if let Some(frame) = self.color.as_mut() {
            self.backend.copy_color(frame)?;
        }
        if let Some(frame) = self.depth.as_mut() {
            self.backend.copy_depth(frame)?;
        }

        for event in self.backend.drain_events() {
            log_event(&event);
            let mut ctl = Control::new(self.backend.as_mut());
            self.tracker.apply(&event, &mut ctl);
            if let Some(handler) = self.handler.as_mut() {
                let mut ctl = Control::new(self.backend.as_mut());
                handler.on_event(&event, &mut ctl);
            }
        }

        Ok(PollOutcome::Updated)
    }

    /// Latest color frame; valid until the next poll overwrites it.
    pub fn color_frame(&self) -> Option<&ColorFrame> {
        self.color.as_ref()
    }

    pub fn depth_frame(&self) -> Option<&DepthFrame> {
        self.depth.as_ref()
    }

    pub fn users(&self) -> Vec<UserId> {
        self.backend.users()
    }

    pub fn is_tracking(&self, user: UserId) -> bool {
        self.backend.is_tracking(user)
    }

    /// Users the calibration flow has brought into tracking.
    pub fn tracked_users(&self) -> Vec<UserId> {
        self.tracker.tracked().collect()
    }

    pub fn phase(&self, user: UserId) -> Option<SubjectPhase> {
        self.tracker.phase(user)
    }

    pub fn joint(&self, user: UserId, joint: Joint) -> Result<JointPosition> {
        self.backend.joint(user, joint)
    }

    pub fn joints(&self, user: UserId, joints: &[Joint]) -> Result<Vec<JointPosition>> {
        joints
            .iter()
            .map(|joint| self.backend.joint(user, *joint))
            .collect()
    }

    pub fn to_projective(&self, points: &[Point3]) -> Result<Vec<Projective>> {
        self.backend.to_projective(points)
    }

    /// Runtime gesture set changes are still allowed; only handler
    /// registration is locked down after start.
    pub fn add_gesture(&mut self, gesture: Gesture) -> Result<()> {
        self.backend.add_gesture(gesture)
    }

    pub fn remove_gesture(&mut self, gesture: Gesture) -> Result<()> {
        self.backend.remove_gesture(gesture)
    }

    /// Stop generation and release the context. Idempotent; also runs on
    /// drop so teardown is reachable on every exit path.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.backend.stop_all()?;
        self.backend.shutdown()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::warn!("session shutdown failed: {err}");
        }
    }
}

fn log_event(event: &Event) {
    match event {
        Event::NewUser { user } => log::info!("new {user} identified"),
        Event::LostUser { user } => log::info!("{user} lost"),
        Event::CalibrationStart { user } => log::info!("calibration start for {user}"),
        Event::CalibrationComplete { user, status } => {
            log::info!("calibration complete for {user}: {status:?}")
        }
        Event::PoseDetected { user, pose } => log::info!("pose {pose} detected for {user}"),
        Event::GestureRecognized {
            gesture,
            id_position,
            end_position,
        } => log::info!("{gesture} from {id_position} to {end_position}"),
        Event::GestureProgress {
            gesture,
            position,
            progress,
        } => log::debug!("{gesture}: {progress:.2} at {position}"),
        Event::HandCreated { hand, position, .. } => {
            log::info!("new {hand} detected at {position}")
        }
        Event::HandUpdated { .. } => {}
        Event::HandDestroyed { hand, .. } => log::info!("lost {hand}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Backend that fails every update, for error policy tests.
    struct FlakyBackend {
        stopped: Arc<AtomicBool>,
        shutdowns: Arc<AtomicU32>,
    }

    impl FlakyBackend {
        fn new() -> Self {
            Self {
                stopped: Arc::new(AtomicBool::new(false)),
                shutdowns: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl DeviceBackend for FlakyBackend {
        fn init(&mut self) -> Result<()> {
            Ok(())
        }
        fn create_generator(&mut self, _kind: GeneratorKind) -> Result<()> {
            Ok(())
        }
        fn set_output_mode(&mut self, _kind: GeneratorKind, _mode: OutputMode) -> Result<()> {
            Ok(())
        }
        fn set_mirror(&mut self, _mirror: bool) -> Result<()> {
            Ok(())
        }
        fn align_depth_to_color(&mut self) -> Result<()> {
            Ok(())
        }
        fn set_skeleton_profile(&mut self, _profile: SkeletonProfile) -> Result<()> {
            Ok(())
        }
        fn set_hand_smoothing(&mut self, _factor: f32) -> Result<()> {
            Ok(())
        }
        fn start_all(&mut self) -> Result<()> {
            Ok(())
        }
        fn stop_all(&mut self) -> Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn shutdown(&mut self) -> Result<()> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn wait_update(&mut self, _wait: UpdateWait) -> Result<()> {
            Err(Error::UpdateFailed("simulated fault".into()))
        }
        fn copy_color(&self, _out: &mut ColorFrame) -> Result<()> {
            Ok(())
        }
        fn copy_depth(&self, _out: &mut DepthFrame) -> Result<()> {
            Ok(())
        }
        fn drain_events(&mut self) -> Vec<Event> {
            Vec::new()
        }
        fn users(&self) -> Vec<UserId> {
            Vec::new()
        }
        fn is_tracking(&self, _user: UserId) -> bool {
            false
        }
        fn joint(&self, user: UserId, _joint: Joint) -> Result<JointPosition> {
            Err(Error::NotTracking(user))
        }
        fn start_pose_detection(&mut self, _pose: &str, _user: UserId) -> Result<()> {
            Ok(())
        }
        fn stop_pose_detection(&mut self, _user: UserId) -> Result<()> {
            Ok(())
        }
        fn request_calibration(&mut self, _user: UserId, _force: bool) -> Result<()> {
            Ok(())
        }
        fn start_tracking(&mut self, _user: UserId) -> Result<()> {
            Ok(())
        }
        fn add_gesture(&mut self, _gesture: Gesture) -> Result<()> {
            Ok(())
        }
        fn remove_gesture(&mut self, _gesture: Gesture) -> Result<()> {
            Ok(())
        }
        fn start_hand_tracking(&mut self, _position: Point3) -> Result<()> {
            Ok(())
        }
        fn stop_hand_tracking(&mut self, _hand: HandId) -> Result<()> {
            Ok(())
        }
        fn to_projective(&self, _points: &[Point3]) -> Result<Vec<Projective>> {
            Err(Error::GeneratorUnavailable {
                kind: GeneratorKind::Depth,
            })
        }
    }

    fn flaky_session(policy: ErrorPolicy) -> (Session, Arc<AtomicBool>, Arc<AtomicU32>) {
        let backend = FlakyBackend::new();
        let stopped = backend.stopped.clone();
        let shutdowns = backend.shutdowns.clone();
        let session = SessionBuilder::new(Box::new(backend))
            .generator(GeneratorKind::Depth)
            .error_policy(policy)
            .start()
            .unwrap();
        (session, stopped, shutdowns)
    }

    #[test]
    fn fail_fast_surfaces_first_poll_error() {
        let (mut session, _, _) = flaky_session(ErrorPolicy::FailFast);
        assert!(matches!(
            session.poll(UpdateWait::Blocking),
            Err(Error::UpdateFailed(_))
        ));
    }

    #[test]
    fn best_effort_tolerates_then_escalates() {
        let (mut session, _, _) = flaky_session(ErrorPolicy::BestEffort {
            max_consecutive_failures: 3,
        });
        assert_eq!(
            session.poll(UpdateWait::Blocking).unwrap(),
            PollOutcome::Skipped
        );
        assert_eq!(
            session.poll(UpdateWait::Blocking).unwrap(),
            PollOutcome::Skipped
        );
        match session.poll(UpdateWait::Blocking) {
            Err(Error::PersistentFailure { failures, .. }) => assert_eq!(failures, 3),
            other => panic!("expected persistent failure, got {other:?}"),
        }
    }

    #[test]
    fn drop_stops_and_releases_exactly_once() {
        let (mut session, stopped, shutdowns) = flaky_session(ErrorPolicy::FailFast);
        session.shutdown().unwrap();
        drop(session);
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn alignment_requires_both_correlated_generators() {
        // Session is not Debug, so unwrap the error side only.
        let err = SessionBuilder::new(Box::new(FlakyBackend::new()))
            .generator(GeneratorKind::Depth)
            .align_viewpoints()
            .start()
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn empty_generator_set_is_rejected() {
        let err = SessionBuilder::new(Box::new(FlakyBackend::new()))
            .start()
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
