//! Gesture painter: recognized gestures leave markers on a persistent
//! drawing canvas while the live color view runs alongside it.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use depthkit::render::{self, Canvas};
use depthkit::{
    Event, GeneratorKind, Gesture, Point3, Script, ScriptStep, SessionBuilder, SimulatedDevice,
    UpdateWait,
};

const RUN_FRAMES: u64 = 120;
const SNAPSHOT_EVERY: u64 = 30;

fn main() -> Result<()> {
    env_logger::init();

    let script = Script::new()
        .at(10, ScriptStep::GestureInProgress {
            gesture: Gesture::Wave,
            position: Point3::new(-200.0, 100.0, 1800.0),
            progress: 0.5,
        })
        .at(15, ScriptStep::PerformsGesture {
            gesture: Gesture::Wave,
            from: Point3::new(-200.0, 100.0, 1800.0),
            to: Point3::new(200.0, 120.0, 1800.0),
        })
        .at(40, ScriptStep::PerformsGesture {
            gesture: Gesture::RaiseHand,
            from: Point3::new(0.0, 300.0, 1600.0),
            to: Point3::new(0.0, 300.0, 1600.0),
        })
        .at(70, ScriptStep::PerformsGesture {
            gesture: Gesture::Click,
            from: Point3::new(100.0, -50.0, 1500.0),
            to: Point3::new(100.0, -50.0, 1300.0),
        })
        .ends_at(RUN_FRAMES);

    let drawing = Arc::new(Mutex::new(Canvas::new(640, 480)));
    if let Ok(mut canvas) = drawing.lock() {
        canvas.fill([255, 255, 255, 255]);
        canvas.draw_rect(0.0, 0.0, 639.0, 479.0, [0, 0, 0, 255], 2);
    }

    let painter = drawing.clone();
    let mut session = SessionBuilder::new(Box::new(SimulatedDevice::new(script)))
        .generator(GeneratorKind::Depth)
        .generator(GeneratorKind::Color)
        .generator(GeneratorKind::Gesture)
        .align_viewpoints()
        .gesture(Gesture::Wave)
        .gesture(Gesture::Click)
        .gesture(Gesture::RaiseHand)
        .on_event(move |event: &Event, ctl: &mut depthkit::Control<'_>| {
            let Event::GestureRecognized {
                gesture,
                id_position,
                end_position,
            } = event
            else {
                return;
            };
            let projected = match ctl.to_projective(&[*id_position, *end_position]) {
                Ok(points) => points,
                Err(err) => {
                    log::warn!("projection failed: {err}");
                    return;
                }
            };
            if let Ok(mut canvas) = painter.lock() {
                render::draw_gesture_marker(
                    &mut canvas,
                    *gesture,
                    (projected[0].x, projected[0].y),
                    (projected[1].x, projected[1].y),
                );
            }
        })
        .start()?;

    loop {
        match session.poll(UpdateWait::Blocking) {
            Ok(_) => {}
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(err.into()),
        }

        let color = session.color_frame().context("no color buffer")?;
        let frame_index = color.frame_index;

        if frame_index > 0 && frame_index % SNAPSHOT_EVERY == 0 {
            std::fs::create_dir_all("snapshots")?;
            let camera = Canvas::from_color_frame(color);
            camera
                .to_image()
                .save(format!("snapshots/camera_{frame_index:04}.png"))?;
            if let Ok(canvas) = drawing.lock() {
                canvas
                    .to_image()
                    .save(format!("snapshots/gesture_{frame_index:04}.png"))?;
            }
            log::info!("wrote snapshots for frame {frame_index}");
        }
    }

    session.shutdown()?;
    Ok(())
}
