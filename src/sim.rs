//! Scripted stand-in for a physical depth camera.
//!
//! `SimulatedDevice` implements the full backend boundary against a
//! frame-indexed script of subject behavior. Behavior only turns into
//! events when the matching capability was engaged first: a pose is only
//! "detected" while pose detection runs for that subject, a gesture only
//! recognized while it is in the active set, a hand only reported after
//! hand tracking started. That gating mirrors the real SDK and is what
//! the session and demos are written against.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, bounded};

use crate::backend::{DeviceBackend, UpdateWait};
use crate::error::{Error, Result};
use crate::events::{CalibrationStatus, Event};
use crate::skeleton::{Joint, JointPosition, SkeletonProfile};
use crate::types::{
    ColorFrame, DepthFrame, GeneratorKind, Gesture, HandId, OutputMode, Point3, Projective, UserId,
};

/// Frames between a calibration request and its completion event.
const CALIBRATION_DELAY_FRAMES: u64 = 2;

/// Horizontal pixel disparity between the depth and color viewpoints
/// until alignment is requested.
const DEFAULT_VIEWPOINT_DISPARITY: f32 = 16.0;

/// Pinhole focal length in pixels at 640 wide, Kinect-like.
const FOCAL_PX_AT_VGA: f32 = 525.0;

#[derive(Clone, Debug)]
pub enum ScriptStep {
    UserEnters { user: UserId, torso: Point3 },
    UserLeaves { user: UserId },
    /// Moves without leaving view; no event, the live state just changes.
    UserMoves { user: UserId, torso: Point3 },
    PerformsPose { user: UserId, pose: String },
    CalibrationOutcome { user: UserId, status: CalibrationStatus },
    PerformsGesture { gesture: Gesture, from: Point3, to: Point3 },
    GestureInProgress { gesture: Gesture, position: Point3, progress: f32 },
    MovesHand { to: Point3 },
    HandExits,
}

/// Subject behavior keyed by frame index (first polled frame is 1).
#[derive(Clone, Debug, Default)]
pub struct Script {
    steps: Vec<(u64, ScriptStep)>,
    end_frame: Option<u64>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, frame: u64, step: ScriptStep) -> Self {
        self.steps.push((frame, step));
        self
    }

    /// After this frame the device reports end of stream.
    pub fn ends_at(mut self, frame: u64) -> Self {
        self.end_frame = Some(frame);
        self
    }
}

struct Ticker {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    rx: Receiver<()>,
}

impl Ticker {
    fn spawn(mode: OutputMode) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let (tx, rx) = bounded(1);
        let interval = mode.frame_interval();

        let handle = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                thread::sleep(interval);
                // Drop the tick if the consumer has not caught up.
                let _ = tx.try_send(());
            }
        });

        Self {
            stop,
            handle: Some(handle),
            rx,
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct SimulatedDevice {
    script: Script,
    cursor: usize,
    mode: OutputMode,
    paced: bool,
    viewpoint_disparity: f32,

    initialized: bool,
    started: bool,
    generators: HashSet<GeneratorKind>,
    mirror: bool,
    aligned: bool,
    smoothing: f32,
    profile: SkeletonProfile,

    frame_index: u64,
    pending: Vec<Event>,
    delayed: Vec<(u64, Event)>,

    users: BTreeMap<UserId, Point3>,
    tracking: HashSet<UserId>,
    pose_watch: HashMap<UserId, String>,
    planned_calibrations: HashMap<UserId, VecDeque<CalibrationStatus>>,
    active_gestures: HashSet<Gesture>,
    hands: BTreeMap<HandId, Point3>,
    next_hand: u32,

    ticker: Option<Ticker>,
}

impl SimulatedDevice {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            cursor: 0,
            mode: OutputMode::vga(),
            paced: true,
            viewpoint_disparity: DEFAULT_VIEWPOINT_DISPARITY,
            initialized: false,
            started: false,
            generators: HashSet::new(),
            mirror: false,
            aligned: false,
            smoothing: 0.0,
            profile: SkeletonProfile::All,
            frame_index: 0,
            pending: Vec::new(),
            delayed: Vec::new(),
            users: BTreeMap::new(),
            tracking: HashSet::new(),
            pose_watch: HashMap::new(),
            planned_calibrations: HashMap::new(),
            active_gestures: HashSet::new(),
            hands: BTreeMap::new(),
            next_hand: 1,
            ticker: None,
        }
    }

    /// Advance on every update call instead of pacing to the frame rate.
    /// Tests use this; demos keep real-time pacing.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn viewpoint_disparity(mut self, pixels: f32) -> Self {
        self.viewpoint_disparity = pixels;
        self
    }

    fn require_init(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::InitFailed("init was not called".into()))
        }
    }

    fn require_generator(&self, kind: GeneratorKind) -> Result<()> {
        if self.generators.contains(&kind) {
            Ok(())
        } else {
            Err(Error::GeneratorUnavailable { kind })
        }
    }

    fn now(&self) -> f64 {
        self.frame_index as f64 / self.mode.fps as f64
    }

    fn latest_hand(&self) -> Option<HandId> {
        self.hands.keys().next_back().copied()
    }

    fn advance_frame(&mut self) {
        self.frame_index += 1;
        let frame = self.frame_index;

        let mut due = Vec::new();
        self.delayed.retain(|(at, event)| {
            if *at <= frame {
                due.push(event.clone());
                false
            } else {
                true
            }
        });
        self.pending.extend(due);

        while self.cursor < self.script.steps.len() && self.script.steps[self.cursor].0 <= frame {
            let step = self.script.steps[self.cursor].1.clone();
            self.cursor += 1;
            self.run_step(step);
        }
    }

    fn run_step(&mut self, step: ScriptStep) {
        match step {
            ScriptStep::UserEnters { user, torso } => {
                self.users.insert(user, torso);
                if self.generators.contains(&GeneratorKind::User) {
                    self.pending.push(Event::NewUser { user });
                }
            }
            ScriptStep::UserLeaves { user } => {
                self.users.remove(&user);
                self.tracking.remove(&user);
                self.pose_watch.remove(&user);
                if self.generators.contains(&GeneratorKind::User) {
                    self.pending.push(Event::LostUser { user });
                }
            }
            ScriptStep::UserMoves { user, torso } => {
                if self.users.contains_key(&user) {
                    self.users.insert(user, torso);
                }
            }
            ScriptStep::PerformsPose { user, pose } => {
                if self.pose_watch.get(&user) == Some(&pose) {
                    self.pending.push(Event::PoseDetected { user, pose });
                }
            }
            ScriptStep::CalibrationOutcome { user, status } => {
                self.planned_calibrations
                    .entry(user)
                    .or_default()
                    .push_back(status);
            }
            ScriptStep::PerformsGesture { gesture, from, to } => {
                if self.active_gestures.contains(&gesture) {
                    self.pending.push(Event::GestureRecognized {
                        gesture,
                        id_position: from,
                        end_position: to,
                    });
                }
            }
            ScriptStep::GestureInProgress {
                gesture,
                position,
                progress,
            } => {
                if self.active_gestures.contains(&gesture) {
                    self.pending.push(Event::GestureProgress {
                        gesture,
                        position,
                        progress,
                    });
                }
            }
            ScriptStep::MovesHand { to } => {
                if let Some(hand) = self.latest_hand() {
                    self.hands.insert(hand, to);
                    self.pending.push(Event::HandUpdated {
                        hand,
                        position: to,
                        time: self.now(),
                    });
                }
            }
            ScriptStep::HandExits => {
                if let Some(hand) = self.latest_hand() {
                    self.hands.remove(&hand);
                    self.pending.push(Event::HandDestroyed {
                        hand,
                        time: self.now(),
                    });
                }
            }
        }
    }

    /// Deterministic stick figure around the scripted torso position.
    fn joint_offset(joint: Joint) -> Point3 {
        let (x, y, z) = match joint {
            Joint::Head => (0.0, 600.0, 0.0),
            Joint::Neck => (0.0, 450.0, 0.0),
            Joint::Torso => (0.0, 0.0, 0.0),
            Joint::Waist => (0.0, -150.0, 0.0),
            Joint::LeftCollar => (-80.0, 420.0, 0.0),
            Joint::LeftShoulder => (-200.0, 400.0, 0.0),
            Joint::LeftElbow => (-330.0, 180.0, 20.0),
            Joint::LeftWrist => (-420.0, 0.0, 40.0),
            Joint::LeftHand => (-450.0, -40.0, 50.0),
            Joint::LeftFingertip => (-470.0, -80.0, 55.0),
            Joint::RightCollar => (80.0, 420.0, 0.0),
            Joint::RightShoulder => (200.0, 400.0, 0.0),
            Joint::RightElbow => (330.0, 180.0, 20.0),
            Joint::RightWrist => (420.0, 0.0, 40.0),
            Joint::RightHand => (450.0, -40.0, 50.0),
            Joint::RightFingertip => (470.0, -80.0, 55.0),
            Joint::LeftHip => (-120.0, -250.0, 0.0),
            Joint::LeftKnee => (-130.0, -650.0, 0.0),
            Joint::LeftAnkle => (-140.0, -1000.0, 0.0),
            Joint::LeftFoot => (-150.0, -1050.0, -80.0),
            Joint::RightHip => (120.0, -250.0, 0.0),
            Joint::RightKnee => (130.0, -650.0, 0.0),
            Joint::RightAnkle => (140.0, -1000.0, 0.0),
            Joint::RightFoot => (150.0, -1050.0, -80.0),
        };
        Point3::new(x, y, z)
    }

    fn project(&self, point: Point3) -> Projective {
        let focal = FOCAL_PX_AT_VGA * self.mode.width as f32 / 640.0;
        let z = point.z.max(1.0);
        let mut x = self.mode.width as f32 / 2.0 + point.x * focal / z;
        let y = self.mode.height as f32 / 2.0 - point.y * focal / z;
        if !self.aligned {
            x += self.viewpoint_disparity;
        }
        if self.mirror {
            x = self.mode.width as f32 - x;
        }
        Projective { x, y, depth: z }
    }
}

impl DeviceBackend for SimulatedDevice {
    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        self.script.steps.sort_by_key(|(frame, _)| *frame);
        Ok(())
    }

    fn create_generator(&mut self, kind: GeneratorKind) -> Result<()> {
        self.require_init()?;
        self.generators.insert(kind);
        Ok(())
    }

    fn set_output_mode(&mut self, kind: GeneratorKind, mode: OutputMode) -> Result<()> {
        self.require_generator(kind)?;
        self.mode = mode;
        Ok(())
    }

    fn set_mirror(&mut self, mirror: bool) -> Result<()> {
        self.require_init()?;
        self.mirror = mirror;
        Ok(())
    }

    fn align_depth_to_color(&mut self) -> Result<()> {
        self.require_generator(GeneratorKind::Depth)?;
        self.require_generator(GeneratorKind::Color)?;
        self.aligned = true;
        Ok(())
    }

    fn set_skeleton_profile(&mut self, profile: SkeletonProfile) -> Result<()> {
        self.require_generator(GeneratorKind::User)?;
        self.profile = profile;
        Ok(())
    }

    fn set_hand_smoothing(&mut self, factor: f32) -> Result<()> {
        self.require_generator(GeneratorKind::Hand)?;
        self.smoothing = factor;
        Ok(())
    }

    fn start_all(&mut self) -> Result<()> {
        self.require_init()?;
        if self.generators.is_empty() {
            return Err(Error::Backend("no generators created".into()));
        }
        self.started = true;
        if self.paced && self.ticker.is_none() {
            self.ticker = Some(Ticker::spawn(self.mode));
        }
        Ok(())
    }

    fn stop_all(&mut self) -> Result<()> {
        self.started = false;
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop_all()?;
        self.initialized = false;
        Ok(())
    }

    fn wait_update(&mut self, wait: UpdateWait) -> Result<()> {
        if !self.started {
            return Err(Error::Backend("generation not started".into()));
        }
        if let Some(end) = self.script.end_frame
            && self.frame_index >= end
        {
            return Err(Error::EndOfStream);
        }

        if let Some(ticker) = &self.ticker {
            match wait {
                UpdateWait::Blocking => {
                    ticker
                        .rx
                        .recv()
                        .map_err(|_| Error::UpdateFailed("frame clock stopped".into()))?;
                }
                UpdateWait::None => {
                    // Latest-only contract: without a fresh tick the
                    // previous frame stays current.
                    if ticker.rx.try_recv().is_err() {
                        return Ok(());
                    }
                }
            }
        }

        self.advance_frame();
        Ok(())
    }

    fn copy_color(&self, out: &mut ColorFrame) -> Result<()> {
        self.require_generator(GeneratorKind::Color)?;
        let (w, h) = (self.mode.width as usize, self.mode.height as usize);
        out.width = self.mode.width;
        out.height = self.mode.height;
        out.data.resize(w * h * ColorFrame::CHANNELS, 0);
        out.frame_index = self.frame_index;
        out.timestamp = self.now();

        let frame = self.frame_index as usize;
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 3;
                out.data[i] = ((x + frame) & 0xff) as u8;
                out.data[i + 1] = ((y + frame) & 0xff) as u8;
                out.data[i + 2] = ((x + y) & 0xff) as u8;
            }
        }
        Ok(())
    }

    fn copy_depth(&self, out: &mut DepthFrame) -> Result<()> {
        self.require_generator(GeneratorKind::Depth)?;
        let (w, h) = (self.mode.width as usize, self.mode.height as usize);
        out.width = self.mode.width;
        out.height = self.mode.height;
        out.data.resize(w * h, 0);
        out.frame_index = self.frame_index;
        out.timestamp = self.now();

        for y in 0..h {
            let sample = (500 + y * 3000 / h.max(1)).min(DepthFrame::MAX_DEPTH_MM as usize - 1);
            let row = &mut out.data[y * w..(y + 1) * w];
            row.fill(sample as u16);
        }
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    fn users(&self) -> Vec<UserId> {
        self.users.keys().copied().collect()
    }

    fn is_tracking(&self, user: UserId) -> bool {
        self.tracking.contains(&user)
    }

    fn joint(&self, user: UserId, joint: Joint) -> Result<JointPosition> {
        if !self.tracking.contains(&user) {
            return Err(Error::NotTracking(user));
        }
        let torso = self.users.get(&user).copied().unwrap_or_default();
        let offset = Self::joint_offset(joint);
        Ok(JointPosition {
            position: Point3::new(torso.x + offset.x, torso.y + offset.y, torso.z + offset.z),
            confidence: 1.0,
        })
    }

    fn start_pose_detection(&mut self, pose: &str, user: UserId) -> Result<()> {
        self.require_generator(GeneratorKind::User)?;
        self.pose_watch.insert(user, pose.to_owned());
        Ok(())
    }

    fn stop_pose_detection(&mut self, user: UserId) -> Result<()> {
        self.require_generator(GeneratorKind::User)?;
        self.pose_watch.remove(&user);
        Ok(())
    }

    fn request_calibration(&mut self, user: UserId, _force: bool) -> Result<()> {
        self.require_generator(GeneratorKind::User)?;
        if !self.users.contains_key(&user) {
            return Err(Error::Backend(format!("{user} is not in view")));
        }
        let status = self
            .planned_calibrations
            .get_mut(&user)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(CalibrationStatus::Ok);
        self.pending.push(Event::CalibrationStart { user });
        self.delayed.push((
            self.frame_index + CALIBRATION_DELAY_FRAMES,
            Event::CalibrationComplete { user, status },
        ));
        Ok(())
    }

    fn start_tracking(&mut self, user: UserId) -> Result<()> {
        self.require_generator(GeneratorKind::User)?;
        if !self.users.contains_key(&user) {
            return Err(Error::Backend(format!("{user} is not in view")));
        }
        self.tracking.insert(user);
        Ok(())
    }

    fn add_gesture(&mut self, gesture: Gesture) -> Result<()> {
        self.require_generator(GeneratorKind::Gesture)?;
        self.active_gestures.insert(gesture);
        Ok(())
    }

    fn remove_gesture(&mut self, gesture: Gesture) -> Result<()> {
        self.require_generator(GeneratorKind::Gesture)?;
        self.active_gestures.remove(&gesture);
        Ok(())
    }

    fn start_hand_tracking(&mut self, position: Point3) -> Result<()> {
        self.require_generator(GeneratorKind::Hand)?;
        let hand = HandId(self.next_hand);
        self.next_hand += 1;
        self.hands.insert(hand, position);
        self.pending.push(Event::HandCreated {
            hand,
            position,
            time: self.now(),
        });
        Ok(())
    }

    fn stop_hand_tracking(&mut self, hand: HandId) -> Result<()> {
        self.require_generator(GeneratorKind::Hand)?;
        if self.hands.remove(&hand).is_some() {
            self.pending.push(Event::HandDestroyed {
                hand,
                time: self.now(),
            });
        }
        Ok(())
    }

    fn to_projective(&self, points: &[Point3]) -> Result<Vec<Projective>> {
        self.require_generator(GeneratorKind::Depth)?;
        Ok(points.iter().map(|p| self.project(*p)).collect())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}
