use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// The 17 COCO body landmarks, in the order pose models report them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum BodyPart {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl BodyPart {
    pub const COUNT: usize = 17;

    pub const ALL: [BodyPart; Self::COUNT] = [
        BodyPart::Nose,
        BodyPart::LeftEye,
        BodyPart::RightEye,
        BodyPart::LeftEar,
        BodyPart::RightEar,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftKnee,
        BodyPart::RightKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub part: BodyPart,
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

impl Keypoint {
    pub fn new(part: BodyPart, x: f32, y: f32, score: f32) -> Self {
        Self { part, x, y, score }
    }

    pub fn meets(&self, min_confidence: f32) -> bool {
        self.score >= min_confidence
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn distance_to(&self, other: &Keypoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One detected body. Keypoints are always stored in [`BodyPart::ALL`] order.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    keypoints: [Keypoint; BodyPart::COUNT],
    pub score: f32,
}

impl Pose {
    pub fn new(keypoints: [Keypoint; BodyPart::COUNT], score: f32) -> Self {
        Self { keypoints, score }
    }

    /// Builds a pose from `(x, y, score)` triples in canonical part order.
    pub fn from_triples(triples: &[(f32, f32, f32); BodyPart::COUNT], score: f32) -> Self {
        let keypoints = BodyPart::ALL.map(|part| {
            let (x, y, s) = triples[part.index()];
            Keypoint::new(part, x, y, s)
        });
        Self { keypoints, score }
    }

    pub fn keypoint(&self, part: BodyPart) -> &Keypoint {
        &self.keypoints[part.index()]
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Screen y grows downward, so "raised" means a smaller y than the shoulder.
    pub fn left_hand_raised(&self) -> bool {
        self.keypoint(BodyPart::LeftWrist).y < self.keypoint(BodyPart::LeftShoulder).y
    }

    pub fn right_hand_raised(&self) -> bool {
        self.keypoint(BodyPart::RightWrist).y < self.keypoint(BodyPart::RightShoulder).y
    }
}
