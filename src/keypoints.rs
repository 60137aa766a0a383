use crate::types::{BodyPart, Keypoint, Pose};

/// Anatomically connected parts drawn as skeleton segments.
pub const ADJACENT_PARTS: &[(BodyPart, BodyPart)] = &[
    (BodyPart::LeftHip, BodyPart::LeftShoulder),
    (BodyPart::LeftElbow, BodyPart::LeftShoulder),
    (BodyPart::LeftElbow, BodyPart::LeftWrist),
    (BodyPart::LeftHip, BodyPart::LeftKnee),
    (BodyPart::LeftKnee, BodyPart::LeftAnkle),
    (BodyPart::RightHip, BodyPart::RightShoulder),
    (BodyPart::RightElbow, BodyPart::RightShoulder),
    (BodyPart::RightElbow, BodyPart::RightWrist),
    (BodyPart::RightHip, BodyPart::RightKnee),
    (BodyPart::RightKnee, BodyPart::RightAnkle),
    (BodyPart::LeftShoulder, BodyPart::RightShoulder),
    (BodyPart::LeftHip, BodyPart::RightHip),
];

/// Keeps the poses whose overall score reaches `min_confidence`. Several poses means
/// several people in front of the camera.
pub fn filter_poses(poses: Vec<Pose>, min_confidence: f32) -> Vec<Pose> {
    poses
        .into_iter()
        .filter(|pose| pose.score >= min_confidence)
        .collect()
}

/// Returns every adjacent keypoint pair whose two endpoints both reach `min_confidence`.
pub fn adjacent_pairs(pose: &Pose, min_confidence: f32) -> Vec<(Keypoint, Keypoint)> {
    ADJACENT_PARTS
        .iter()
        .map(|&(a, b)| (*pose.keypoint(a), *pose.keypoint(b)))
        .filter(|(a, b)| a.meets(min_confidence) && b.meets(min_confidence))
        .collect()
}

/// The menu gesture: left hand above its shoulder while the right hand stays at or below
/// its own.
pub fn is_menu_gesture(pose: &Pose) -> bool {
    pose.left_hand_raised() && !pose.right_hand_raised()
}

pub fn any_menu_gesture(poses: &[Pose]) -> bool {
    poses.iter().any(is_menu_gesture)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn standing_pose(score: f32) -> Pose {
        let mut triples = [(0.0, 0.0, score); BodyPart::COUNT];
        let layout: [(BodyPart, f32, f32); BodyPart::COUNT] = [
            (BodyPart::Nose, 960.0, 300.0),
            (BodyPart::LeftEye, 990.0, 280.0),
            (BodyPart::RightEye, 930.0, 280.0),
            (BodyPart::LeftEar, 1010.0, 290.0),
            (BodyPart::RightEar, 910.0, 290.0),
            (BodyPart::LeftShoulder, 1060.0, 420.0),
            (BodyPart::RightShoulder, 860.0, 420.0),
            (BodyPart::LeftElbow, 1090.0, 560.0),
            (BodyPart::RightElbow, 830.0, 560.0),
            (BodyPart::LeftWrist, 1100.0, 680.0),
            (BodyPart::RightWrist, 820.0, 680.0),
            (BodyPart::LeftHip, 1030.0, 720.0),
            (BodyPart::RightHip, 890.0, 720.0),
            (BodyPart::LeftKnee, 1030.0, 880.0),
            (BodyPart::RightKnee, 890.0, 880.0),
            (BodyPart::LeftAnkle, 1030.0, 1040.0),
            (BodyPart::RightAnkle, 890.0, 1040.0),
        ];
        for (part, x, y) in layout {
            triples[part.index()] = (x, y, score);
        }
        Pose::from_triples(&triples, score)
    }

    pub(crate) fn with_part(pose: Pose, part: BodyPart, y: f32, score: f32) -> Pose {
        let mut triples = [(0.0, 0.0, 0.0); BodyPart::COUNT];
        for k in pose.keypoints() {
            triples[k.part.index()] = (k.x, k.y, k.score);
        }
        let x = triples[part.index()].0;
        triples[part.index()] = (x, y, score);
        Pose::from_triples(&triples, pose.score)
    }

    pub(crate) fn menu_gesture_pose() -> Pose {
        with_part(standing_pose(0.9), BodyPart::LeftWrist, 200.0, 0.9)
    }

    #[test]
    fn filter_drops_low_scoring_poses() {
        let poses = vec![standing_pose(0.9), standing_pose(0.1), standing_pose(0.15)];
        let kept = filter_poses(poses, 0.15);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|p| p.score >= 0.15));
    }

    #[test]
    fn pairs_never_include_low_confidence_endpoints() {
        let pose = with_part(standing_pose(0.9), BodyPart::LeftElbow, 560.0, 0.05);
        for min in [0.0, 0.1, 0.5, 0.95] {
            for (a, b) in adjacent_pairs(&pose, min) {
                assert!(a.score >= min && b.score >= min);
            }
        }
    }

    #[test]
    fn low_confidence_joint_removes_both_of_its_segments() {
        let pose = with_part(standing_pose(0.9), BodyPart::LeftElbow, 560.0, 0.05);
        let pairs = adjacent_pairs(&pose, 0.1);
        assert_eq!(pairs.len(), ADJACENT_PARTS.len() - 2);
        assert!(
            pairs
                .iter()
                .all(|(a, b)| a.part != BodyPart::LeftElbow && b.part != BodyPart::LeftElbow)
        );
    }

    #[test]
    fn menu_gesture_requires_only_the_left_hand() {
        assert!(is_menu_gesture(&menu_gesture_pose()));
        assert!(!is_menu_gesture(&standing_pose(0.9)));

        let both = with_part(menu_gesture_pose(), BodyPart::RightWrist, 200.0, 0.9);
        assert!(!is_menu_gesture(&both));
        assert!(any_menu_gesture(&[both, menu_gesture_pose()]));
    }
}
