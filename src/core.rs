use crate::error::{AnimataError, AnimataResult};

pub use kurbo::{Affine, Point, Vec2};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Inclusive frame span `[start, end]`.
///
/// Elements, scenes and effect windows are all authored with inclusive
/// bounds; a range with `start == end` covers exactly one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex, // inclusive
}

impl FrameRange {
    pub fn new(start: FrameIndex, end: FrameIndex) -> AnimataResult<Self> {
        if start.0 > end.0 {
            return Err(AnimataError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0) + 1
    }

    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 <= self.end.0
    }

    /// Intersect with `outer`, clamping both bounds. Returns `None` when the
    /// ranges are disjoint.
    pub fn clip_to(self, outer: FrameRange) -> Option<FrameRange> {
        let start = self.start.0.max(outer.start.0);
        let end = self.end.0.min(outer.end.0);
        if start > end {
            return None;
        }
        Some(FrameRange {
            start: FrameIndex(start),
            end: FrameIndex(end),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> AnimataResult<Self> {
        if den == 0 {
            return Err(AnimataError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(AnimataError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * f64::from(self.den) / f64::from(self.num)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_range_is_inclusive() {
        let r = FrameRange::new(FrameIndex(5), FrameIndex(10)).unwrap();
        assert!(r.contains(FrameIndex(5)));
        assert!(r.contains(FrameIndex(10)));
        assert!(!r.contains(FrameIndex(11)));
        assert_eq!(r.len_frames(), 6);
    }

    #[test]
    fn frame_range_rejects_inverted_bounds() {
        assert!(FrameRange::new(FrameIndex(9), FrameIndex(3)).is_err());
    }

    #[test]
    fn clip_to_intersects_or_vanishes() {
        let outer = FrameRange::new(FrameIndex(10), FrameIndex(20)).unwrap();
        let inner = FrameRange::new(FrameIndex(5), FrameIndex(15)).unwrap();
        assert_eq!(
            inner.clip_to(outer).unwrap(),
            FrameRange::new(FrameIndex(10), FrameIndex(15)).unwrap()
        );

        let disjoint = FrameRange::new(FrameIndex(30), FrameIndex(40)).unwrap();
        assert!(disjoint.clip_to(outer).is_none());
    }

    #[test]
    fn fps_rejects_zero_components() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        assert_eq!(Fps::new(30, 1).unwrap().as_f64(), 30.0);
    }
}
