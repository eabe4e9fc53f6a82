use crate::types::Point3;

/// The 24 named joints the skeleton capability can solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Joint {
    Head,
    Neck,
    Torso,
    Waist,
    LeftCollar,
    LeftShoulder,
    LeftElbow,
    LeftWrist,
    LeftHand,
    LeftFingertip,
    RightCollar,
    RightShoulder,
    RightElbow,
    RightWrist,
    RightHand,
    RightFingertip,
    LeftHip,
    LeftKnee,
    LeftAnkle,
    LeftFoot,
    RightHip,
    RightKnee,
    RightAnkle,
    RightFoot,
}

impl Joint {
    pub const ALL: [Joint; 24] = [
        Joint::Head,
        Joint::Neck,
        Joint::Torso,
        Joint::Waist,
        Joint::LeftCollar,
        Joint::LeftShoulder,
        Joint::LeftElbow,
        Joint::LeftWrist,
        Joint::LeftHand,
        Joint::LeftFingertip,
        Joint::RightCollar,
        Joint::RightShoulder,
        Joint::RightElbow,
        Joint::RightWrist,
        Joint::RightHand,
        Joint::RightFingertip,
        Joint::LeftHip,
        Joint::LeftKnee,
        Joint::LeftAnkle,
        Joint::LeftFoot,
        Joint::RightHip,
        Joint::RightKnee,
        Joint::RightAnkle,
        Joint::RightFoot,
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SkeletonProfile {
    #[default]
    All,
    Upper,
}

impl SkeletonProfile {
    /// Joints solved under this profile.
    pub fn joints(&self) -> &'static [Joint] {
        match self {
            SkeletonProfile::All => &Joint::ALL,
            SkeletonProfile::Upper => UPPER_JOINTS,
        }
    }
}

const UPPER_JOINTS: &[Joint] = &[
    Joint::Head,
    Joint::Neck,
    Joint::Torso,
    Joint::LeftShoulder,
    Joint::LeftElbow,
    Joint::LeftHand,
    Joint::RightShoulder,
    Joint::RightElbow,
    Joint::RightHand,
];

/// Segment table for the full-body stick figure: head and spine, the
/// torso cross-bracing, both arms and both legs.
pub const FULL_BODY_SEGMENTS: &[(Joint, Joint)] = &[
    (Joint::Head, Joint::Neck),
    (Joint::Neck, Joint::Torso),
    (Joint::LeftShoulder, Joint::RightShoulder),
    (Joint::LeftShoulder, Joint::RightHip),
    (Joint::RightShoulder, Joint::LeftHip),
    (Joint::LeftHip, Joint::RightHip),
    (Joint::LeftShoulder, Joint::LeftElbow),
    (Joint::LeftElbow, Joint::LeftHand),
    (Joint::RightShoulder, Joint::RightElbow),
    (Joint::RightElbow, Joint::RightHand),
    (Joint::LeftHip, Joint::LeftKnee),
    (Joint::LeftKnee, Joint::LeftFoot),
    (Joint::RightHip, Joint::RightKnee),
    (Joint::RightKnee, Joint::RightFoot),
];

pub const UPPER_BODY_SEGMENTS: &[(Joint, Joint)] = &[
    (Joint::Head, Joint::Neck),
    (Joint::Neck, Joint::Torso),
    (Joint::LeftShoulder, Joint::RightShoulder),
    (Joint::LeftShoulder, Joint::LeftElbow),
    (Joint::LeftElbow, Joint::LeftHand),
    (Joint::RightShoulder, Joint::RightElbow),
    (Joint::RightElbow, Joint::RightHand),
];

/// A solved joint: real-world position plus the solver's confidence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JointPosition {
    pub position: Point3,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_profile_solves_every_joint() {
        assert_eq!(SkeletonProfile::All.joints(), &Joint::ALL);
    }

    // Drawing skips segments whose endpoints were not solved, so every
    // upper segment must stay within the upper profile's joint set.
    #[test]
    fn upper_segments_only_reference_solved_joints() {
        let joints = SkeletonProfile::Upper.joints();
        for (a, b) in UPPER_BODY_SEGMENTS {
            assert!(joints.contains(a), "{a:?} missing from upper profile");
            assert!(joints.contains(b), "{b:?} missing from upper profile");
        }
    }
}
