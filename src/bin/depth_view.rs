//! Side-by-side depth and color viewer: both generators at the shared
//! output mode, depth viewpoint aligned onto the color image, latest-only
//! polling with a fixed redraw delay.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use depthkit::render::Canvas;
use depthkit::{GeneratorKind, Script, SessionBuilder, SimulatedDevice, UpdateWait};

const RUN_FRAMES: u64 = 90;
const SNAPSHOT_EVERY: u64 = 30;

fn main() -> Result<()> {
    env_logger::init();

    let device = SimulatedDevice::new(Script::new().ends_at(RUN_FRAMES));

    let mut session = SessionBuilder::new(Box::new(device))
        .generator(GeneratorKind::Depth)
        .generator(GeneratorKind::Color)
        .align_viewpoints()
        .start()?;

    loop {
        match session.poll(UpdateWait::None) {
            Ok(_) => {}
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(err.into()),
        }

        let depth = session.depth_frame().context("no depth buffer")?;
        let color = session.color_frame().context("no color buffer")?;

        if depth.frame_index > 0 && depth.frame_index % SNAPSHOT_EVERY == 0 {
            save(&Canvas::from_depth_frame(depth), "depth", depth.frame_index)?;
            save(&Canvas::from_color_frame(color), "image", color.frame_index)?;
        }

        // Fixed redraw delay doubles as the frame-rate limiter.
        thread::sleep(Duration::from_millis(20));
    }

    session.shutdown()?;
    Ok(())
}

fn save(canvas: &Canvas, window: &str, frame: u64) -> Result<()> {
    std::fs::create_dir_all("snapshots")?;
    let path = format!("snapshots/{window}_{frame:04}.png");
    canvas.to_image().save(&path)?;
    log::info!("wrote {path}");
    Ok(())
}
