use crate::{
    core::Fps,
    ease::Ease,
    error::{AnimataError, AnimataResult},
    value::{PropertyPath, Value, lerp_value},
};

/// An anchor `(frame, value)` on an animated property.
///
/// `frame` is element-local (0 = the owning element's first visible frame).
/// `ease` overrides the animation easing for the segment *ending* at this
/// keyframe.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe {
    pub frame: u64,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ease: Option<Ease>,
}

/// Binds one property path to an ordered keyframe list.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Animation {
    pub property: PropertyPath,
    pub keys: Vec<Keyframe>,
    pub ease: Ease,
    #[serde(default)]
    pub delay: u64,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub looped: bool,
    #[serde(default)]
    pub yoyo: bool,
}

impl Animation {
    pub fn new(property: PropertyPath, keys: Vec<Keyframe>, ease: Ease) -> Self {
        Self {
            property,
            keys,
            ease,
            delay: 0,
            duration: 0,
            looped: false,
            yoyo: false,
        }
    }

    /// Restore the sorted-by-frame invariant after editing.
    pub fn sort_keys(&mut self) {
        self.keys.sort_by_key(|k| k.frame);
    }

    pub fn validate(&self) -> AnimataResult<()> {
        if self.keys.is_empty() {
            return Err(AnimataError::animation(format!(
                "animation on '{}' has no keyframes",
                self.property
            )));
        }
        if !self.keys.windows(2).all(|w| w[0].frame <= w[1].frame) {
            return Err(AnimataError::animation(format!(
                "animation on '{}' has unsorted keyframes",
                self.property
            )));
        }
        self.ease.validate()?;
        for k in &self.keys {
            if let Some(e) = k.ease {
                e.validate()?;
            }
        }
        if self.looped && self.duration == 0 {
            return Err(AnimataError::animation(format!(
                "looped animation on '{}' needs duration > 0",
                self.property
            )));
        }
        Ok(())
    }

    /// Evaluate at an element-local `frame`.
    ///
    /// Returns `None` before the first keyframe's effective frame (the
    /// property keeps its static base value); clamps to the last keyframe
    /// after the span (no extrapolation).
    pub fn evaluate(&self, frame: u64, fps: Fps) -> Option<Value> {
        if self.keys.is_empty() {
            return None;
        }

        let local = frame.checked_sub(self.delay)?;
        let local = if self.looped && self.duration > 0 {
            let iteration = local / self.duration;
            let folded = local % self.duration;
            if self.yoyo && iteration % 2 == 1 {
                self.duration - folded
            } else {
                folded
            }
        } else {
            local
        };

        let first = &self.keys[0];
        if local < first.frame {
            return None;
        }

        let idx = self.keys.partition_point(|k| k.frame <= local);
        if idx >= self.keys.len() {
            return Some(self.keys[self.keys.len() - 1].value.clone());
        }

        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        let denom = b.frame.saturating_sub(a.frame);
        if denom == 0 {
            return Some(a.value.clone());
        }

        let t = ((local - a.frame) as f64) / (denom as f64);
        let ease = b.ease.unwrap_or(self.ease);
        let segment_elapsed = (local - a.frame) as f64;
        let te = ease.apply_timed(t, segment_elapsed, fps.as_f64());
        Some(lerp_value(&a.value, &b.value, te))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fps30() -> Fps {
        Fps::new(30, 1).unwrap()
    }

    fn key(frame: u64, v: f64) -> Keyframe {
        Keyframe {
            frame,
            value: Value::Number(v),
            ease: None,
        }
    }

    fn number_at(anim: &Animation, frame: u64) -> Option<f64> {
        anim.evaluate(frame, fps30()).and_then(|v| v.as_number())
    }

    fn opacity_ramp() -> Animation {
        Animation::new(
            PropertyPath::parse("opacity").unwrap(),
            vec![key(0, 0.0), key(30, 1.0)],
            Ease::Linear,
        )
    }

    #[test]
    fn linear_midpoint() {
        assert_eq!(number_at(&opacity_ramp(), 15), Some(0.5));
    }

    #[test]
    fn clamps_after_last_key_only() {
        let anim = opacity_ramp();
        assert_eq!(number_at(&anim, 30), Some(1.0));
        assert_eq!(number_at(&anim, 500), Some(1.0));
    }

    #[test]
    fn single_keyframe_holds_from_its_frame() {
        let anim = Animation::new(
            PropertyPath::parse("opacity").unwrap(),
            vec![key(10, 0.7)],
            Ease::Linear,
        );
        assert_eq!(number_at(&anim, 9), None);
        assert_eq!(number_at(&anim, 10), Some(0.7));
        assert_eq!(number_at(&anim, 10_000), Some(0.7));
    }

    #[test]
    fn delay_shifts_the_origin() {
        let mut anim = opacity_ramp();
        anim.delay = 5;
        assert_eq!(number_at(&anim, 4), None);
        assert_eq!(number_at(&anim, 5), Some(0.0));
        assert_eq!(number_at(&anim, 20), Some(0.5));
    }

    #[test]
    fn loop_folds_into_duration() {
        let mut anim = opacity_ramp();
        anim.looped = true;
        anim.duration = 30;
        assert_eq!(number_at(&anim, 15), Some(0.5));
        assert_eq!(number_at(&anim, 45), Some(0.5));
        assert_eq!(number_at(&anim, 75), Some(0.5));
    }

    #[test]
    fn yoyo_has_period_two_durations() {
        let mut anim = opacity_ramp();
        anim.looped = true;
        anim.yoyo = true;
        anim.duration = 30;
        for frame in 0..90 {
            assert_eq!(
                number_at(&anim, frame),
                number_at(&anim, frame + 60),
                "frame {frame}"
            );
        }
        // Odd iterations run mirrored.
        assert_eq!(number_at(&anim, 40), number_at(&anim, 20));
    }

    #[test]
    fn keyframe_ease_override_wins() {
        let anim = Animation::new(
            PropertyPath::parse("opacity").unwrap(),
            vec![
                key(0, 0.0),
                Keyframe {
                    frame: 30,
                    value: Value::Number(1.0),
                    ease: Some(Ease::EaseIn),
                },
            ],
            Ease::Linear,
        );
        let v = number_at(&anim, 15).unwrap();
        assert!(v < 0.5, "ease-in override should lag linear, got {v}");
    }

    #[test]
    fn validate_rejects_unsorted_and_empty() {
        let mut anim = opacity_ramp();
        anim.keys.swap(0, 1);
        assert!(anim.validate().is_err());
        anim.sort_keys();
        assert!(anim.validate().is_ok());

        anim.keys.clear();
        assert!(anim.validate().is_err());
    }

    #[test]
    fn validate_rejects_loop_without_duration() {
        let mut anim = opacity_ramp();
        anim.looped = true;
        anim.duration = 0;
        assert!(anim.validate().is_err());
    }
}
