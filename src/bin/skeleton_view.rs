//! Full-body skeleton overlay: the pose-then-calibrate flow takes each
//! new user through "Psi" pose detection and calibration, then every
//! tracked skeleton is projected and drawn over the color frame.

use anyhow::{Context, Result};
use depthkit::render::{self, Canvas};
use depthkit::{
    FULL_BODY_SEGMENTS, GeneratorKind, Joint, Point3, Script, ScriptStep, Session, SessionBuilder,
    SimulatedDevice, SkeletonProfile, TrackingFlow, UpdateWait, UserId,
};

const RUN_FRAMES: u64 = 120;
const SNAPSHOT_EVERY: u64 = 30;

fn main() -> Result<()> {
    env_logger::init();

    let script = Script::new()
        .at(5, ScriptStep::UserEnters {
            user: UserId(1),
            torso: Point3::new(150.0, 0.0, 2400.0),
        })
        .at(15, ScriptStep::PerformsPose {
            user: UserId(1),
            pose: "Psi".into(),
        })
        .at(60, ScriptStep::UserMoves {
            user: UserId(1),
            torso: Point3::new(-100.0, 0.0, 2200.0),
        })
        .at(100, ScriptStep::UserLeaves { user: UserId(1) })
        .ends_at(RUN_FRAMES);

    let mut session = SessionBuilder::new(Box::new(SimulatedDevice::new(script)))
        .generator(GeneratorKind::Depth)
        .generator(GeneratorKind::Color)
        .generator(GeneratorKind::User)
        .align_viewpoints()
        .skeleton_profile(SkeletonProfile::All)
        .tracking_flow(TrackingFlow::psi_pose())
        .start()?;

    loop {
        match session.poll(UpdateWait::Blocking) {
            Ok(_) => {}
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(err.into()),
        }

        let color = session.color_frame().context("no color buffer")?;
        let frame_index = color.frame_index;
        let mut canvas = Canvas::from_color_frame(color);

        for user in session.tracked_users() {
            draw_user(&session, user, &mut canvas)?;
        }

        if frame_index > 0 && frame_index % SNAPSHOT_EVERY == 0 {
            std::fs::create_dir_all("snapshots")?;
            let path = format!("snapshots/skeleton_{frame_index:04}.png");
            canvas.to_image().save(&path)?;
            log::info!("wrote {path}");
        }
    }

    session.shutdown()?;
    Ok(())
}

fn draw_user(session: &Session, user: UserId, canvas: &mut Canvas) -> Result<()> {
    let solved = session.joints(user, &Joint::ALL)?;
    let real: Vec<Point3> = solved.iter().map(|j| j.position).collect();
    let projected = session.to_projective(&real)?;

    let joints: Vec<_> = Joint::ALL.iter().copied().zip(projected).collect();
    render::draw_skeleton(canvas, &joints, FULL_BODY_SEGMENTS);
    Ok(())
}
