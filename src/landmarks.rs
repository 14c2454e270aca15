//! Per-frame hand landmarks and the JSON-lines frame format.

use serde::Deserialize;
use thiserror::Error;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const PINKY_MCP: usize = 17;

/// A point in normalized [0,1] image space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One hand, 21 landmarks, fixed anatomical indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: [Point; LANDMARK_COUNT],
}

impl LandmarkFrame {
    pub fn new(points: [Point; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    pub fn from_slice(points: &[Point]) -> Result<Self, FrameError> {
        if points.len() != LANDMARK_COUNT {
            return Err(FrameError::LandmarkCount(points.len()));
        }
        let mut out = [Point::default(); LANDMARK_COUNT];
        for (i, p) in points.iter().enumerate() {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(FrameError::NonFinite(i));
            }
            out[i] = *p;
        }
        Ok(Self { points: out })
    }

    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected 21 landmarks, got {0}")]
    LandmarkCount(usize),
    #[error("landmark {0} has a non-finite coordinate")]
    NonFinite(usize),
}

/// A decoded input line: the detector's timestamp (if any) and the hand (if any).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInput {
    pub t: Option<f64>,
    pub hand: Option<LandmarkFrame>,
}

// Accept what common detectors emit: [x,y], [x,y,z] or {x,y,z}.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Pair([f64; 2]),
    Triple([f64; 3]),
    Named { x: f64, y: f64 },
}

impl From<RawPoint> for Point {
    fn from(raw: RawPoint) -> Self {
        match raw {
            RawPoint::Pair([x, y]) => Point::new(x, y),
            RawPoint::Triple([x, y, _]) => Point::new(x, y),
            RawPoint::Named { x, y } => Point::new(x, y),
        }
    }
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    t: Option<f64>,
    #[serde(default)]
    landmarks: Option<Vec<RawPoint>>,
}

/// Decode one JSON line. A missing or null `landmarks` means no hand this frame.
pub fn decode_line(line: &str) -> Result<FrameInput, FrameError> {
    let raw: RawFrame = serde_json::from_str(line)?;
    let hand = match raw.landmarks {
        Some(pts) => {
            let pts: Vec<Point> = pts.into_iter().map(Point::from).collect();
            Some(LandmarkFrame::from_slice(&pts)?)
        }
        None => None,
    };
    Ok(FrameInput { t: raw.t, hand })
}

#[cfg(test)]
pub(crate) fn frame_with(overrides: &[(usize, Point)]) -> LandmarkFrame {
    let mut pts = [Point::new(0.5, 0.5); LANDMARK_COUNT];
    for (i, p) in overrides {
        pts[*i] = *p;
    }
    LandmarkFrame::new(pts)
}
