//! Pose-to-geometry mapping. Everything here is pure: it turns keypoints into
//! [`DrawCommand`]s and leaves pixels to [`raster`].

pub mod raster;

use std::f32::consts::PI;

use rand::Rng;

use crate::{
    keypoints::adjacent_pairs,
    types::{BodyPart, Keypoint, Pose},
};

pub type Color = [u8; 4];

pub const AQUA: Color = [0, 255, 255, 255];
pub const BLUE: Color = [0, 0, 255, 255];
pub const BLACK: Color = [0, 0, 0, 255];
pub const WHITE: Color = [255, 255, 255, 255];
pub const ORANGE: Color = [255, 165, 0, 255];
pub const MARKER: Color = [248, 113, 113, 255];

pub const SEGMENT_THICKNESS: f32 = 12.0;
pub const JOINT_RADIUS: f32 = 12.0;
pub const WRIST_MARKER_RADIUS: f32 = 10.0;
/// Costume sprite width relative to the distance between the eyes.
pub const COSTUME_HEAD_SCALE: f32 = 2.5;

type Point = (f32, f32);

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Disc {
        center: Point,
        radius: f32,
        color: Color,
    },
    Ring {
        center: Point,
        radius: f32,
        thickness: f32,
        color: Color,
    },
    /// Angles in radians, clockwise from +x because y points down.
    Arc {
        center: Point,
        radius: f32,
        start: f32,
        end: f32,
        thickness: f32,
        color: Color,
    },
    Segment {
        from: Point,
        to: Point,
        thickness: f32,
        color: Color,
    },
    Ellipse {
        center: Point,
        radius_x: f32,
        radius_y: f32,
        color: Color,
    },
    Rect {
        origin: Point,
        width: f32,
        height: f32,
        color: Color,
    },
    /// The configured costume image, centered and scaled to `width`.
    Sprite { center: Point, width: f32 },
}

/// Distance between the eyes, the one scale every face feature is sized from. `None` when
/// either eye is below `min_confidence`.
pub fn inter_eye_distance(pose: &Pose, min_confidence: f32) -> Option<f32> {
    let left = pose.keypoint(BodyPart::LeftEye);
    let right = pose.keypoint(BodyPart::RightEye);
    if left.meets(min_confidence) && right.meets(min_confidence) {
        Some(left.distance_to(right))
    } else {
        None
    }
}

/// Right wrist above the nose.
pub fn hat_raised(pose: &Pose, min_confidence: f32) -> bool {
    let wrist = pose.keypoint(BodyPart::RightWrist);
    let nose = pose.keypoint(BodyPart::Nose);
    wrist.meets(min_confidence) && nose.meets(min_confidence) && wrist.y < nose.y
}

pub fn head(nose: Point, distance: f32) -> Vec<DrawCommand> {
    let size = distance * 2.0;
    vec![
        DrawCommand::Ring {
            center: nose,
            radius: size / 1.5,
            thickness: size / 10.0,
            color: BLACK,
        },
        DrawCommand::Arc {
            center: (nose.0, nose.1 + size / 6.0),
            radius: size / 3.0,
            start: 0.0,
            end: PI,
            thickness: size / 15.0,
            color: BLACK,
        },
    ]
}

pub fn eye(center: Point, distance: f32) -> Vec<DrawCommand> {
    let shift = distance / 20.0;
    vec![
        DrawCommand::Disc {
            center,
            radius: distance / 3.0,
            color: WHITE,
        },
        DrawCommand::Disc {
            center,
            radius: distance / 4.0,
            color: BLUE,
        },
        DrawCommand::Disc {
            center,
            radius: distance / 5.0,
            color: BLACK,
        },
        DrawCommand::Disc {
            center: (center.0 - shift, center.1 - shift),
            radius: distance / 15.0,
            color: WHITE,
        },
    ]
}

pub fn hat(nose: Point, distance: f32) -> Vec<DrawCommand> {
    let width = distance * 2.0;
    let brim_height = distance / 4.0;
    let brim_y = nose.1 - width / 1.5;
    vec![
        DrawCommand::Ellipse {
            center: (nose.0, brim_y),
            radius_x: width / 1.5,
            radius_y: brim_height,
            color: BLACK,
        },
        DrawCommand::Rect {
            origin: (nose.0 - width / 2.0, brim_y - brim_height * 5.0),
            width,
            height: brim_height * 5.0,
            color: BLACK,
        },
    ]
}

/// Aqua by default, blue with one hand above its shoulder, a fresh random color every
/// frame with both hands up.
pub fn skeleton_color<R: Rng + ?Sized>(pose: &Pose, rng: &mut R) -> Color {
    match (pose.left_hand_raised(), pose.right_hand_raised()) {
        (true, true) => random_color(rng),
        (true, false) | (false, true) => BLUE,
        (false, false) => AQUA,
    }
}

pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> Color {
    [rng.r#gen(), rng.r#gen(), rng.r#gen(), 255]
}

pub fn skeleton<R: Rng + ?Sized>(pose: &Pose, min_confidence: f32, rng: &mut R) -> Vec<DrawCommand> {
    let color = skeleton_color(pose, rng);
    adjacent_pairs(pose, min_confidence)
        .into_iter()
        .map(|(a, b)| DrawCommand::Segment {
            from: a.position(),
            to: b.position(),
            thickness: SEGMENT_THICKNESS,
            color,
        })
        .collect()
}

/// Joints of the wireframe: a cartoon head on the nose, drawn eyes, orange dots elsewhere.
/// Ears are left out.
pub fn joints(pose: &Pose, min_confidence: f32) -> Vec<DrawCommand> {
    let distance = inter_eye_distance(pose, min_confidence);
    let mut commands = Vec::new();

    for keypoint in pose.keypoints() {
        if !keypoint.meets(min_confidence) {
            continue;
        }
        match keypoint.part {
            BodyPart::LeftEar | BodyPart::RightEar => {}
            BodyPart::Nose => {
                if let Some(distance) = distance {
                    commands.extend(head(keypoint.position(), distance));
                    if hat_raised(pose, min_confidence) {
                        commands.extend(hat(keypoint.position(), distance));
                    }
                }
            }
            BodyPart::LeftEye | BodyPart::RightEye => {
                if let Some(distance) = distance {
                    commands.extend(eye(keypoint.position(), distance));
                }
            }
            _ => commands.push(joint(keypoint)),
        }
    }

    commands
}

fn joint(keypoint: &Keypoint) -> DrawCommand {
    DrawCommand::Disc {
        center: keypoint.position(),
        radius: JOINT_RADIUS,
        color: ORANGE,
    }
}

pub fn wireframe<R: Rng + ?Sized>(poses: &[Pose], min_confidence: f32, rng: &mut R) -> Vec<DrawCommand> {
    let mut commands = Vec::new();
    for pose in poses {
        commands.extend(skeleton(pose, min_confidence, rng));
        commands.extend(joints(pose, min_confidence));
    }
    commands
}

/// Costume head over each face, with the hat when the right hand is up. Without a sprite
/// the procedural head and eyes stand in.
pub fn costume(poses: &[Pose], min_confidence: f32, has_sprite: bool) -> Vec<DrawCommand> {
    let mut commands = Vec::new();
    for pose in poses {
        let nose = pose.keypoint(BodyPart::Nose);
        let Some(distance) = inter_eye_distance(pose, min_confidence) else {
            continue;
        };
        if !nose.meets(min_confidence) {
            continue;
        }

        if has_sprite {
            commands.push(DrawCommand::Sprite {
                center: nose.position(),
                width: distance * COSTUME_HEAD_SCALE,
            });
        } else {
            commands.extend(head(nose.position(), distance));
            for part in [BodyPart::LeftEye, BodyPart::RightEye] {
                commands.extend(eye(pose.keypoint(part).position(), distance));
            }
        }

        if hat_raised(pose, min_confidence) {
            commands.extend(hat(nose.position(), distance));
        }
    }
    commands
}

/// Marks the tracked hand while the effect menu is open.
pub fn menu(poses: &[Pose]) -> Vec<DrawCommand> {
    poses
        .iter()
        .map(|pose| DrawCommand::Disc {
            center: pose.keypoint(BodyPart::RightWrist).position(),
            radius: WRIST_MARKER_RADIUS,
            color: MARKER,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::tests::{standing_pose, with_part};
    use rand::{SeedableRng, rngs::StdRng};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn count<F: Fn(&DrawCommand) -> bool>(commands: &[DrawCommand], f: F) -> usize {
        commands.iter().filter(|c| f(c)).count()
    }

    #[test]
    fn eye_distance_scales_head() {
        let pose = standing_pose(0.9);
        let distance = inter_eye_distance(&pose, 0.1).unwrap();
        assert!((distance - 60.0).abs() < 1e-4);

        let commands = head((960.0, 300.0), distance);
        match &commands[0] {
            DrawCommand::Ring { radius, thickness, .. } => {
                assert!((radius - 80.0).abs() < 1e-4);
                assert!((thickness - 12.0).abs() < 1e-4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_eye_skips_face_features() {
        let pose = with_part(standing_pose(0.9), BodyPart::LeftEye, 280.0, 0.01);
        assert_eq!(inter_eye_distance(&pose, 0.1), None);

        let commands = joints(&pose, 0.1);
        assert_eq!(count(&commands, |c| matches!(c, DrawCommand::Ring { .. })), 0);
        // Nose, both eyes and both ears contribute nothing; 12 body joints remain.
        assert_eq!(commands.len(), 12);
        assert!(costume(&[pose], 0.1, true).is_empty());
    }

    #[test]
    fn hat_needs_right_wrist_above_nose() {
        let pose = standing_pose(0.9);
        assert!(!hat_raised(&pose, 0.1));
        let raised = with_part(pose, BodyPart::RightWrist, 250.0, 0.9);
        assert!(hat_raised(&raised, 0.1));

        let commands = costume(&[raised], 0.1, true);
        assert_eq!(count(&commands, |c| matches!(c, DrawCommand::Sprite { .. })), 1);
        assert_eq!(count(&commands, |c| matches!(c, DrawCommand::Rect { .. })), 1);
    }

    #[test]
    fn hat_sits_above_the_head() {
        let commands = hat((100.0, 500.0), 30.0);
        match &commands[1] {
            DrawCommand::Rect { origin, width, height, .. } => {
                assert!((origin.0 - 70.0).abs() < 1e-4);
                assert!(origin.1 + height < 500.0);
                assert!((width - 60.0).abs() < 1e-4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn skeleton_color_follows_raised_hands() {
        let mut rng = rng();
        let pose = standing_pose(0.9);
        assert_eq!(skeleton_color(&pose, &mut rng), AQUA);

        let left = with_part(pose.clone(), BodyPart::LeftWrist, 300.0, 0.9);
        assert_eq!(skeleton_color(&left, &mut rng), BLUE);
        let right = with_part(pose, BodyPart::RightWrist, 300.0, 0.9);
        assert_eq!(skeleton_color(&right, &mut rng), BLUE);

        let both = with_part(left, BodyPart::RightWrist, 300.0, 0.9);
        let color = skeleton_color(&both, &mut rng);
        assert_eq!(color[3], 255);
    }

    #[test]
    fn wireframe_draws_every_confident_segment() {
        let mut rng = rng();
        let commands = wireframe(&[standing_pose(0.9), standing_pose(0.9)], 0.1, &mut rng);
        let segments = count(&commands, |c| matches!(c, DrawCommand::Segment { .. }));
        assert_eq!(segments, 24);
    }

    #[test]
    fn costume_without_sprite_draws_procedural_head() {
        let commands = costume(&[standing_pose(0.9)], 0.1, false);
        assert_eq!(count(&commands, |c| matches!(c, DrawCommand::Ring { .. })), 1);
        assert_eq!(count(&commands, |c| matches!(c, DrawCommand::Disc { .. })), 8);
    }

    #[test]
    fn menu_marks_each_right_wrist() {
        let commands = menu(&[standing_pose(0.9), standing_pose(0.5)]);
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[0],
            DrawCommand::Disc {
                center: (820.0, 680.0),
                radius: WRIST_MARKER_RADIUS,
                color: MARKER,
            }
        );
    }
}
