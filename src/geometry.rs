//! Landmark geometry: palm centre, distances and the pinch test.

use crate::landmarks::{
    INDEX_MCP, INDEX_TIP, LandmarkFrame, PINKY_MCP, Point, THUMB_IP, THUMB_MCP, THUMB_TIP, WRIST,
};

/// Floor for the thumb IP-MCP segment when computing the bend ratio.
pub const BEND_EPSILON: f64 = 0.001;

/// Pinch calibration. Both values are hand-tuned, not derived; adjust per camera setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchThresholds {
    /// Max thumb-tip to index-tip distance, normalized image units.
    pub distance: f64,
    /// Min ratio |tip-mcp| / |ip-mcp|.
    pub thumb_bend: f64,
}

impl Default for PinchThresholds {
    fn default() -> Self {
        Self {
            distance: 0.07,
            thumb_bend: 1.2,
        }
    }
}

pub fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Mean of wrist, index MCP and pinky MCP. Steadier than any fingertip.
pub fn palm_center(frame: &LandmarkFrame) -> Point {
    let w = frame.point(WRIST);
    let i = frame.point(INDEX_MCP);
    let p = frame.point(PINKY_MCP);
    Point::new((w.x + i.x + p.x) / 3.0, (w.y + i.y + p.y) / 3.0)
}

pub fn thumb_bend(frame: &LandmarkFrame) -> f64 {
    let mcp = frame.point(THUMB_MCP);
    distance(frame.point(THUMB_TIP), mcp) / distance(frame.point(THUMB_IP), mcp).max(BEND_EPSILON)
}

/// Thumb and index tips close together, with the thumb bent.
///
/// Distance alone fires whenever the hand is small in frame; the bend gate
/// rejects a straight thumb that merely lies next to the index finger.
pub fn is_pinching(frame: &LandmarkFrame, th: &PinchThresholds) -> bool {
    let d = distance(frame.point(THUMB_TIP), frame.point(INDEX_TIP));
    d < th.distance && thumb_bend(frame) > th.thumb_bend
}
