//! Gesture-armed hand tracker: a raised hand starts point tracking, a
//! push acts as a button while tracking, and losing the hand re-arms the
//! starting gesture. The tracked path is drawn over the depth view.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use depthkit::render::{self, Canvas};
use depthkit::{
    Control, Event, EventHandler, GeneratorKind, Gesture, Point3, Script, ScriptStep,
    SessionBuilder, SimulatedDevice, UpdateWait,
};

const RUN_FRAMES: u64 = 80;
const SNAPSHOT_EVERY: u64 = 20;

const TRAIL_COLOR: [u8; 4] = [255, 128, 0, 255];

struct HandApp {
    gesture_to_use: Gesture,
    gesture_to_press: Gesture,
    trail: Arc<Mutex<Vec<(f32, f32)>>>,
}

impl EventHandler for HandApp {
    fn on_event(&mut self, event: &Event, ctl: &mut Control<'_>) {
        match event {
            Event::GestureRecognized {
                gesture,
                end_position,
                ..
            } => {
                if *gesture == self.gesture_to_press {
                    log::info!("button pressed");
                } else if *gesture == self.gesture_to_use {
                    log::info!("start tracking from {end_position}");
                    self.must(ctl.remove_gesture(self.gesture_to_use));
                    self.must(ctl.start_hand_tracking(*end_position));
                }
            }
            Event::HandCreated { hand, position, .. } => {
                log::info!("{hand} created at {position}");
                self.must(ctl.add_gesture(self.gesture_to_press));
                if let Ok(mut trail) = self.trail.lock() {
                    trail.clear();
                }
                self.record(*position, ctl);
            }
            Event::HandUpdated { position, .. } => {
                self.record(*position, ctl);
            }
            Event::HandDestroyed { hand, .. } => {
                log::info!("{hand} lost, re-arming");
                self.must(ctl.add_gesture(self.gesture_to_use));
                self.must(ctl.remove_gesture(self.gesture_to_press));
            }
            _ => {}
        }
    }
}

impl HandApp {
    fn record(&mut self, position: Point3, ctl: &mut Control<'_>) {
        match ctl.to_projective(&[position]) {
            Ok(projected) => {
                if let Ok(mut trail) = self.trail.lock() {
                    trail.push((projected[0].x, projected[0].y));
                }
            }
            Err(err) => log::warn!("projection failed: {err}"),
        }
    }

    fn must(&self, result: depthkit::Result<()>) {
        if let Err(err) = result {
            log::warn!("hand flow request failed: {err}");
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let script = Script::new()
        .at(5, ScriptStep::PerformsGesture {
            gesture: Gesture::RaiseHand,
            from: Point3::new(250.0, 200.0, 1500.0),
            to: Point3::new(250.0, 250.0, 1500.0),
        })
        .at(12, ScriptStep::MovesHand {
            to: Point3::new(150.0, 250.0, 1500.0),
        })
        .at(18, ScriptStep::MovesHand {
            to: Point3::new(0.0, 180.0, 1450.0),
        })
        .at(24, ScriptStep::MovesHand {
            to: Point3::new(-150.0, 100.0, 1400.0),
        })
        .at(30, ScriptStep::PerformsGesture {
            gesture: Gesture::Click,
            from: Point3::new(-150.0, 100.0, 1400.0),
            to: Point3::new(-150.0, 100.0, 1200.0),
        })
        .at(45, ScriptStep::HandExits)
        .ends_at(RUN_FRAMES);

    let trail = Arc::new(Mutex::new(Vec::new()));
    let app = HandApp {
        gesture_to_use: Gesture::RaiseHand,
        gesture_to_press: Gesture::Click,
        trail: trail.clone(),
    };

    let mut session = SessionBuilder::new(Box::new(SimulatedDevice::new(script)))
        .generator(GeneratorKind::Depth)
        .generator(GeneratorKind::Gesture)
        .generator(GeneratorKind::Hand)
        .hand_smoothing(0.5)
        .gesture(Gesture::RaiseHand)
        .on_event(app)
        .start()?;

    loop {
        match session.poll(UpdateWait::Blocking) {
            Ok(_) => {}
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(err.into()),
        }

        let depth = session.depth_frame().context("no depth buffer")?;
        let frame_index = depth.frame_index;

        if frame_index > 0 && frame_index % SNAPSHOT_EVERY == 0 {
            let mut canvas = Canvas::from_depth_frame(depth);
            if let Ok(trail) = trail.lock() {
                render::draw_trail(&mut canvas, &trail, TRAIL_COLOR, 4);
            }
            std::fs::create_dir_all("snapshots")?;
            let path = format!("snapshots/hand_{frame_index:04}.png");
            canvas.to_image().save(&path)?;
            log::info!("wrote {path}");
        }
    }

    session.shutdown()?;
    Ok(())
}
