//! Upper-body tracker with direct calibration (no pose step) and a
//! mirrored view. The right hand is marked on the color frame each frame
//! and its real-world motion between frames is classified into
//! left/right/up/down swipes.

use anyhow::{Context, Result};
use depthkit::render::{self, Canvas};
use depthkit::{
    CalibrationStatus, GeneratorKind, Joint, Point3, Script, ScriptStep, SessionBuilder,
    SimulatedDevice, SkeletonProfile, TrackingFlow, UPPER_BODY_SEGMENTS, UpdateWait, UserId,
};

const PROFILE: SkeletonProfile = SkeletonProfile::Upper;

const RUN_FRAMES: u64 = 100;
const SNAPSHOT_EVERY: u64 = 30;

/// Minimum per-frame displacement (millimetres) counted as a swipe.
const SWIPE_THRESHOLD_MM: f32 = 20.0;

fn main() -> Result<()> {
    env_logger::init();

    // First calibration attempt fails on purpose; the direct-calibrate
    // flow re-requests it and the second attempt succeeds.
    let script = Script::new()
        .at(1, ScriptStep::CalibrationOutcome {
            user: UserId(1),
            status: CalibrationStatus::Failed,
        })
        .at(3, ScriptStep::UserEnters {
            user: UserId(1),
            torso: Point3::new(0.0, 0.0, 2000.0),
        })
        .at(40, ScriptStep::UserMoves {
            user: UserId(1),
            torso: Point3::new(120.0, 0.0, 2000.0),
        })
        .at(55, ScriptStep::UserMoves {
            user: UserId(1),
            torso: Point3::new(120.0, 90.0, 2000.0),
        })
        .at(70, ScriptStep::UserMoves {
            user: UserId(1),
            torso: Point3::new(-30.0, 90.0, 2000.0),
        })
        .ends_at(RUN_FRAMES);

    let mut session = SessionBuilder::new(Box::new(SimulatedDevice::new(script)))
        .generator(GeneratorKind::Depth)
        .generator(GeneratorKind::Color)
        .generator(GeneratorKind::User)
        .align_viewpoints()
        .mirror(true)
        .skeleton_profile(PROFILE)
        .tracking_flow(TrackingFlow::DirectCalibrate)
        .start()?;

    let mut last_hand: Option<Point3> = None;

    loop {
        match session.poll(UpdateWait::Blocking) {
            Ok(_) => {}
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(err.into()),
        }

        let color = session.color_frame().context("no color buffer")?;
        let frame_index = color.frame_index;
        let mut canvas = Canvas::from_color_frame(color);

        for user in session.users() {
            if !session.is_tracking(user) {
                continue;
            }
            let solved = session.joints(user, PROFILE.joints())?;
            let real: Vec<Point3> = solved.iter().map(|j| j.position).collect();
            let projected = session.to_projective(&real)?;
            let joints: Vec<_> = PROFILE.joints().iter().copied().zip(projected).collect();
            render::draw_skeleton(&mut canvas, &joints, UPPER_BODY_SEGMENTS);

            let hand = session.joint(user, Joint::RightHand)?.position;
            let marker = session.to_projective(&[hand])?[0];
            canvas.draw_circle((marker.x as i32, marker.y as i32), 6, [0, 0, 255, 255]);
            capture_swipe(&mut last_hand, hand);
        }

        if frame_index > 0 && frame_index % SNAPSHOT_EVERY == 0 {
            std::fs::create_dir_all("snapshots")?;
            let path = format!("snapshots/upper_body_{frame_index:04}.png");
            canvas.to_image().save(&path)?;
            log::info!("wrote {path}");
        }
    }

    session.shutdown()?;
    Ok(())
}

fn capture_swipe(last: &mut Option<Point3>, hand: Point3) {
    let Some(prev) = last.replace(hand) else {
        return;
    };
    let dx = hand.x - prev.x;
    let dy = hand.y - prev.y;

    if dx > SWIPE_THRESHOLD_MM {
        log::info!("swipe right ({dx:.0}mm)");
    } else if dx < -SWIPE_THRESHOLD_MM {
        log::info!("swipe left ({dx:.0}mm)");
    } else if dy > SWIPE_THRESHOLD_MM {
        log::info!("swipe up ({dy:.0}mm)");
    } else if dy < -SWIPE_THRESHOLD_MM {
        log::info!("swipe down ({dy:.0}mm)");
    }
}
