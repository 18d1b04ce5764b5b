use crate::{
    core::Vec2,
    error::{AnimataError, AnimataResult},
    fx::BlendMode,
};

/// The closed set of built-in transition strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransitionKind {
    Fade,
    Slide,
    Push,
    Zoom,
    Wipe,
    Dissolve,
    Morph,
}

/// Which scene edge the transition anchors to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransitionDirection {
    /// Anchored to the scene start.
    In,
    /// Anchored to `end - duration`.
    Out,
    /// Centered within the scene.
    Cross,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn unit(self) -> Vec2 {
        match self {
            Self::X => Vec2::new(1.0, 0.0),
            Self::Y => Vec2::new(0.0, 1.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum WipeDir {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

/// A region/alpha descriptor for the external rasterizer; resolvers never
/// rasterize masks themselves.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MaskSpec {
    Wipe {
        dir: WipeDir,
        progress: f64,
        softness: f64,
    },
    Dissolve {
        threshold: f64,
        seed: u64,
    },
}

/// How one side of a transition should be rendered at a given progress.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerAdjust {
    pub opacity_mul: f64,
    pub offset: Vec2,
    pub scale_mul: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<MaskSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blend_hint: Option<BlendMode>,
}

impl Default for LayerAdjust {
    fn default() -> Self {
        Self {
            opacity_mul: 1.0,
            offset: Vec2::ZERO,
            scale_mul: 1.0,
            mask: None,
            blend_hint: None,
        }
    }
}

/// The resolved pair of adjustments for the outgoing (`from`) and incoming
/// (`to`) side at one progress sample.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionFrames {
    pub from: LayerAdjust,
    pub to: LayerAdjust,
    /// Forwarded only when both sides supply path data (morph).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morph_paths: Option<MorphPaths>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MorphPaths {
    pub from: String,
    pub to: String,
}

fn param_f64(params: &serde_json::Value, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

fn param_axis(params: &serde_json::Value) -> Option<Axis> {
    match params.get("axis").and_then(|v| v.as_str()) {
        Some("x") | Some("X") => Some(Axis::X),
        Some("y") | Some("Y") => Some(Axis::Y),
        _ => None,
    }
}

fn param_wipe_dir(params: &serde_json::Value) -> Option<WipeDir> {
    match params.get("dir").and_then(|v| v.as_str()) {
        Some(s) => match s.trim().to_ascii_lowercase().as_str() {
            "left_to_right" | "ltr" => Some(WipeDir::LeftToRight),
            "right_to_left" | "rtl" => Some(WipeDir::RightToLeft),
            "top_to_bottom" | "ttb" => Some(WipeDir::TopToBottom),
            "bottom_to_top" | "btt" => Some(WipeDir::BottomToTop),
            _ => None,
        },
        None => None,
    }
}

const DEFAULT_DISTANCE: f64 = 400.0;
const DEFAULT_MIN_SCALE: f64 = 0.8;
const DEFAULT_OUT_SCALE: f64 = 1.5;

/// Strict parameter validation for job admission. Rejects out-of-range and
/// malformed values instead of clamping; the lenient counterpart is
/// [`resolve`], which clamps so a live session never crashes.
pub fn validate_params(kind: TransitionKind, params: &serde_json::Value) -> AnimataResult<()> {
    if params.is_null() {
        return Ok(());
    }
    if !params.is_object() {
        return Err(AnimataError::validation(
            "transition params must be an object when set",
        ));
    }

    match kind {
        TransitionKind::Slide | TransitionKind::Push => {
            if params.get("axis").is_some() && param_axis(params).is_none() {
                return Err(AnimataError::validation("axis must be 'x' or 'y'"));
            }
            if let Some(d) = param_f64(params, "distance")
                && !d.is_finite()
            {
                return Err(AnimataError::validation("distance must be finite"));
            }
        }
        TransitionKind::Zoom => {
            if let Some(s) = param_f64(params, "min_scale")
                && !(s.is_finite() && s > 0.0 && s <= 1.0)
            {
                return Err(AnimataError::validation("min_scale must be in (0, 1]"));
            }
            if let Some(s) = param_f64(params, "out_scale")
                && !(s.is_finite() && s > 0.0)
            {
                return Err(AnimataError::validation("out_scale must be > 0"));
            }
        }
        TransitionKind::Wipe => {
            if params.get("dir").is_some() && param_wipe_dir(params).is_none() {
                return Err(AnimataError::validation(
                    "wipe dir must be one of ltr/rtl/ttb/btt",
                ));
            }
            if let Some(s) = param_f64(params, "softness")
                && !(s.is_finite() && (0.0..=1.0).contains(&s))
            {
                return Err(AnimataError::validation("wipe softness must be in [0, 1]"));
            }
        }
        TransitionKind::Dissolve => {
            if let Some(seed) = params.get("seed")
                && !seed.is_u64()
            {
                return Err(AnimataError::validation(
                    "dissolve seed must be an unsigned integer",
                ));
            }
        }
        TransitionKind::Fade | TransitionKind::Morph => {}
    }
    Ok(())
}

/// Resolve one transition sample at already-eased `progress` in `[0, 1]`.
///
/// Stateless: the same `(kind, progress, params)` always yields the same
/// adjustments. Out-of-range params are clamped here, never rejected.
pub fn resolve(
    kind: TransitionKind,
    progress: f64,
    params: &serde_json::Value,
) -> TransitionFrames {
    let p = progress.clamp(0.0, 1.0);
    let mut from = LayerAdjust::default();
    let mut to = LayerAdjust::default();
    let mut morph_paths = None;

    match kind {
        TransitionKind::Fade => {
            from.opacity_mul = 1.0 - p;
            to.opacity_mul = p;
        }
        TransitionKind::Slide => {
            let axis = param_axis(params).unwrap_or(Axis::X);
            let distance = param_f64(params, "distance")
                .filter(|d| d.is_finite())
                .unwrap_or(DEFAULT_DISTANCE);
            from.offset = axis.unit() * (distance * p);
        }
        TransitionKind::Push => {
            let axis = param_axis(params).unwrap_or(Axis::X);
            let distance = param_f64(params, "distance")
                .filter(|d| d.is_finite())
                .unwrap_or(DEFAULT_DISTANCE);
            from.offset = axis.unit() * (distance * p);
            // The incoming layer trails the outgoing one by the total
            // distance, entering from just behind it.
            to.offset = axis.unit() * (distance * p - distance);
        }
        TransitionKind::Zoom => {
            let min_scale = param_f64(params, "min_scale")
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(DEFAULT_MIN_SCALE)
                .clamp(0.01, 1.0);
            let out_scale = param_f64(params, "out_scale")
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(DEFAULT_OUT_SCALE);
            from.scale_mul = 1.0 + (out_scale - 1.0) * p;
            from.opacity_mul = 1.0 - p;
            to.scale_mul = min_scale + (1.0 - min_scale) * p;
            to.opacity_mul = p;
        }
        TransitionKind::Wipe => {
            let dir = param_wipe_dir(params).unwrap_or(WipeDir::LeftToRight);
            let softness = param_f64(params, "softness")
                .filter(|s| s.is_finite())
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            to.mask = Some(MaskSpec::Wipe {
                dir,
                progress: p,
                softness,
            });
        }
        TransitionKind::Dissolve => {
            let seed = params.get("seed").and_then(|v| v.as_u64()).unwrap_or(0);
            to.mask = Some(MaskSpec::Dissolve { threshold: p, seed });
        }
        TransitionKind::Morph => {
            // Opacity cross-fade with an additive screen hint; true shape
            // morphing happens downstream only when both paths are supplied.
            from.opacity_mul = 1.0 - p;
            to.opacity_mul = p;
            to.blend_hint = Some(BlendMode::Screen);
            if let (Some(fp), Some(tp)) = (
                params.get("from_path").and_then(|v| v.as_str()),
                params.get("to_path").and_then(|v| v.as_str()),
            ) {
                morph_paths = Some(MorphPaths {
                    from: fp.to_string(),
                    to: tp.to_string(),
                });
            }
        }
    }

    TransitionFrames {
        from,
        to,
        morph_paths,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_cross_multiplies_opacity() {
        let t = resolve(TransitionKind::Fade, 0.5, &serde_json::Value::Null);
        assert_eq!(t.from.opacity_mul, 0.5);
        assert_eq!(t.to.opacity_mul, 0.5);
    }

    #[test]
    fn push_offsets_incoming_from_behind() {
        let params = serde_json::json!({ "axis": "x", "distance": 100.0 });
        let t = resolve(TransitionKind::Push, 0.25, &params);
        assert_eq!(t.from.offset, Vec2::new(25.0, 0.0));
        assert_eq!(t.to.offset, Vec2::new(-75.0, 0.0));

        let done = resolve(TransitionKind::Push, 1.0, &params);
        assert_eq!(done.to.offset, Vec2::ZERO);
    }

    #[test]
    fn slide_moves_outgoing_only() {
        let params = serde_json::json!({ "axis": "y", "distance": 200.0 });
        let t = resolve(TransitionKind::Slide, 0.5, &params);
        assert_eq!(t.from.offset, Vec2::new(0.0, 100.0));
        assert_eq!(t.to.offset, Vec2::ZERO);
    }

    #[test]
    fn zoom_scales_and_fades_both_sides() {
        let t = resolve(TransitionKind::Zoom, 0.0, &serde_json::Value::Null);
        assert_eq!(t.to.scale_mul, DEFAULT_MIN_SCALE);
        assert_eq!(t.to.opacity_mul, 0.0);
        assert_eq!(t.from.scale_mul, 1.0);

        let end = resolve(TransitionKind::Zoom, 1.0, &serde_json::Value::Null);
        assert_eq!(end.to.scale_mul, 1.0);
        assert_eq!(end.from.scale_mul, DEFAULT_OUT_SCALE);
        assert_eq!(end.from.opacity_mul, 0.0);
    }

    #[test]
    fn wipe_emits_mask_descriptor_only() {
        let params = serde_json::json!({ "dir": "ttb", "softness": 0.2 });
        let t = resolve(TransitionKind::Wipe, 0.4, &params);
        assert_eq!(
            t.to.mask,
            Some(MaskSpec::Wipe {
                dir: WipeDir::TopToBottom,
                progress: 0.4,
                softness: 0.2,
            })
        );
        assert_eq!(t.from.opacity_mul, 1.0);
    }

    #[test]
    fn morph_forwards_paths_only_when_both_present() {
        let one_sided = serde_json::json!({ "from_path": "M0 0" });
        assert!(
            resolve(TransitionKind::Morph, 0.5, &one_sided)
                .morph_paths
                .is_none()
        );

        let both = serde_json::json!({ "from_path": "M0 0", "to_path": "M1 1" });
        let t = resolve(TransitionKind::Morph, 0.5, &both);
        assert!(t.morph_paths.is_some());
        assert_eq!(t.to.blend_hint, Some(BlendMode::Screen));
    }

    #[test]
    fn strict_validation_rejects_what_resolve_clamps() {
        let bad = serde_json::json!({ "softness": 4.0 });
        assert!(validate_params(TransitionKind::Wipe, &bad).is_err());

        // Lenient path clamps the same input.
        let t = resolve(TransitionKind::Wipe, 0.5, &bad);
        let Some(MaskSpec::Wipe { softness, .. }) = t.to.mask else {
            panic!()
        };
        assert_eq!(softness, 1.0);

        assert!(
            validate_params(
                TransitionKind::Zoom,
                &serde_json::json!({ "min_scale": 3.0 })
            )
            .is_err()
        );
        assert!(
            validate_params(
                TransitionKind::Slide,
                &serde_json::json!({ "axis": "diagonal" })
            )
            .is_err()
        );
        assert!(validate_params(TransitionKind::Fade, &serde_json::Value::Null).is_ok());
    }
}
