//! End-to-end scripted run: a user enters, performs the calibration
//! pose, calibrates and is tracked, and the skeleton overlay lands at
//! the projected joint coordinates on every tracked frame.

use std::sync::{Arc, Mutex};

use depthkit::render::{self, Canvas, SKELETON_JOINT_COLOR};
use depthkit::{
    CalibrationStatus, ColorFrame, Control, Event, FULL_BODY_SEGMENTS, GeneratorKind, Joint,
    Point3, Script, ScriptStep, Session, SessionBuilder, SimulatedDevice, SkeletonProfile,
    TrackingFlow, UpdateWait, UserId,
};

const RUN_FRAMES: u64 = 12;

fn scripted_session(events: Arc<Mutex<Vec<Event>>>) -> Session {
    let script = Script::new()
        .at(2, ScriptStep::UserEnters {
            user: UserId(1),
            torso: Point3::new(150.0, 0.0, 2400.0),
        })
        .at(4, ScriptStep::PerformsPose {
            user: UserId(1),
            pose: "Psi".into(),
        })
        .ends_at(RUN_FRAMES);

    SessionBuilder::new(Box::new(SimulatedDevice::new(script).unpaced()))
        .generator(GeneratorKind::Depth)
        .generator(GeneratorKind::Color)
        .generator(GeneratorKind::User)
        .align_viewpoints()
        .skeleton_profile(SkeletonProfile::All)
        .tracking_flow(TrackingFlow::psi_pose())
        .on_event(move |event: &Event, _ctl: &mut Control<'_>| {
            if let Ok(mut seen) = events.lock() {
                seen.push(event.clone());
            }
        })
        .start()
        .unwrap()
}

#[test]
fn pose_calibrate_track_and_overlay() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut session = scripted_session(events.clone());
    let user = UserId(1);

    let mut polled = 0u64;
    let mut tracked_frames = 0u64;
    let mut overlays_drawn = 0u64;

    loop {
        match session.poll(UpdateWait::Blocking) {
            Ok(_) => polled += 1,
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => panic!("poll failed: {err}"),
        }

        let color = session.color_frame().unwrap();
        assert_eq!(color.frame_index, polled);
        assert_eq!(
            color.data.len(),
            color.width as usize * color.height as usize * ColorFrame::CHANNELS
        );
        let depth = session.depth_frame().unwrap();
        assert_eq!(depth.data.len(), depth.width as usize * depth.height as usize);

        if !session.is_tracking(user) {
            continue;
        }
        tracked_frames += 1;

        let mut canvas = Canvas::from_color_frame(color);
        let solved = session.joints(user, &Joint::ALL).unwrap();
        let real: Vec<Point3> = solved.iter().map(|j| j.position).collect();
        let projected = session.to_projective(&real).unwrap();

        let joints: Vec<_> = Joint::ALL.iter().copied().zip(projected.clone()).collect();
        render::draw_skeleton(&mut canvas, &joints, FULL_BODY_SEGMENTS);
        overlays_drawn += 1;

        // The overlay sits exactly where the joints project.
        let head = projected[0];
        assert_eq!(
            canvas.pixel(head.x as i32, head.y as i32),
            Some(SKELETON_JOINT_COLOR)
        );
    }

    assert_eq!(polled, RUN_FRAMES);

    // Entry at 2, pose at 4, calibration start at 5, complete at 6, so
    // the last seven frames run tracked, each with one overlay pass.
    assert_eq!(tracked_frames, RUN_FRAMES - 5);
    assert_eq!(overlays_drawn, tracked_frames);

    let seen = events.lock().unwrap();
    let flow: Vec<&Event> = seen
        .iter()
        .filter(|event| {
            !matches!(event, Event::HandUpdated { .. } | Event::GestureProgress { .. })
        })
        .collect();
    assert!(matches!(*flow[0], Event::NewUser { user: UserId(1) }));
    assert!(matches!(*flow[1], Event::PoseDetected { user: UserId(1), .. }));
    assert!(matches!(*flow[2], Event::CalibrationStart { user: UserId(1) }));
    assert!(matches!(
        *flow[3],
        Event::CalibrationComplete {
            user: UserId(1),
            status: CalibrationStatus::Ok,
        }
    ));
    assert_eq!(flow.len(), 4);

    session.shutdown().unwrap();
}

#[test]
fn tracker_phase_follows_the_device_flow() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut session = scripted_session(events);
    let user = UserId(1);

    assert_eq!(session.phase(user), None);

    for _ in 0..3 {
        session.poll(UpdateWait::Blocking).unwrap();
    }
    assert_eq!(
        session.phase(user),
        Some(depthkit::SubjectPhase::PoseRequested)
    );

    for _ in 0..2 {
        session.poll(UpdateWait::Blocking).unwrap();
    }
    assert_eq!(
        session.phase(user),
        Some(depthkit::SubjectPhase::Calibrating)
    );

    session.poll(UpdateWait::Blocking).unwrap();
    assert_eq!(session.phase(user), Some(depthkit::SubjectPhase::Tracking));
    assert!(session.is_tracking(user));
}
