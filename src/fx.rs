use crate::{
    core::Rgba,
    error::{AnimataError, AnimataResult},
};

/// Compositing operator used when layering an element over the stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    Add,
}

impl BlendMode {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "multiply" => Some(Self::Multiply),
            "screen" => Some(Self::Screen),
            "overlay" => Some(Self::Overlay),
            "darken" => Some(Self::Darken),
            "lighten" => Some(Self::Lighten),
            "add" | "additive" => Some(Self::Add),
            _ => None,
        }
    }
}

/// The closed set of built-in effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EffectKind {
    Blur,
    Glow,
    Shadow,
    Outline,
    Gradient,
    Noise,
    ColorCorrection,
    ChromaticAberration,
    Blend,
    Mask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum GradientShape {
    Linear,
    Radial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MaskShape {
    Rect,
    Ellipse,
    Luminance,
}

/// A parameter-to-rendering-hint transform result, consumed by the external
/// rasterizer. Effects never touch pixels here.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FilterHint {
    Blur {
        radius: f64,
        sigma: f64,
    },
    Glow {
        radius: f64,
        intensity: f64,
        color: Rgba,
    },
    Shadow {
        dx: f64,
        dy: f64,
        blur: f64,
        color: Rgba,
    },
    Outline {
        width: f64,
        color: Rgba,
    },
    Gradient {
        shape: GradientShape,
        from: Rgba,
        to: Rgba,
        angle_deg: f64,
    },
    Noise {
        amount: f64,
        seed: u64,
    },
    ColorCorrection {
        brightness: f64,
        contrast: f64,
        saturation: f64,
        hue_deg: f64,
    },
    ChromaticAberration {
        offset: f64,
    },
}

/// What applying one effect contributes to a composed layer.
#[derive(Clone, Debug, PartialEq)]
pub enum EffectOutcome {
    Filter(FilterHint),
    Blend(BlendMode),
    Mask { shape: MaskShape, feather: f64 },
}

const BLUR_RADIUS_MAX: f64 = 100.0;
const GLOW_RADIUS_MAX: f64 = 100.0;
const SHADOW_OFFSET_MAX: f64 = 500.0;
const OUTLINE_WIDTH_MAX: f64 = 50.0;
const FEATHER_MAX: f64 = 100.0;
const ABERRATION_MAX: f64 = 50.0;

fn param_f64(params: &serde_json::Value, key: &str) -> Option<f64> {
    params.get(key).and_then(|v| v.as_f64())
}

fn param_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn param_color(params: &serde_json::Value, key: &str) -> Option<Rgba> {
    let arr = params.get(key)?.as_array()?;
    if arr.len() != 4 {
        return None;
    }
    let mut c = [0u8; 4];
    for (i, v) in arr.iter().enumerate() {
        c[i] = u8::try_from(v.as_u64()?).ok()?;
    }
    Some(Rgba::new(c[0], c[1], c[2], c[3]))
}

fn check_range(
    params: &serde_json::Value,
    key: &str,
    lo: f64,
    hi: f64,
) -> AnimataResult<()> {
    if let Some(v) = params.get(key) {
        let n = v.as_f64().ok_or_else(|| {
            AnimataError::validation(format!("effect param '{key}' must be a number"))
        })?;
        if !n.is_finite() || n < lo || n > hi {
            return Err(AnimataError::validation(format!(
                "effect param '{key}' must be within [{lo}, {hi}]"
            )));
        }
    }
    Ok(())
}

fn check_color(params: &serde_json::Value, key: &str) -> AnimataResult<()> {
    if params.get(key).is_some() && param_color(params, key).is_none() {
        return Err(AnimataError::validation(format!(
            "effect param '{key}' must be an [r, g, b, a] byte array"
        )));
    }
    Ok(())
}

/// Strict mode: reject out-of-range and malformed parameters. Used at
/// project validation / job admission; never called on the hot compose path.
pub fn validate_params(kind: EffectKind, params: &serde_json::Value) -> AnimataResult<()> {
    if params.is_null() {
        return Ok(());
    }
    if !params.is_object() {
        return Err(AnimataError::validation(
            "effect params must be an object when set",
        ));
    }

    match kind {
        EffectKind::Blur => {
            check_range(params, "radius", 0.0, BLUR_RADIUS_MAX)?;
            if let Some(sigma) = param_f64(params, "sigma")
                && !(sigma.is_finite() && sigma > 0.0)
            {
                return Err(AnimataError::validation("blur sigma must be > 0"));
            }
        }
        EffectKind::Glow => {
            check_range(params, "radius", 0.0, GLOW_RADIUS_MAX)?;
            check_range(params, "intensity", 0.0, 1.0)?;
            check_color(params, "color")?;
        }
        EffectKind::Shadow => {
            check_range(params, "dx", -SHADOW_OFFSET_MAX, SHADOW_OFFSET_MAX)?;
            check_range(params, "dy", -SHADOW_OFFSET_MAX, SHADOW_OFFSET_MAX)?;
            check_range(params, "blur", 0.0, BLUR_RADIUS_MAX)?;
            check_color(params, "color")?;
        }
        EffectKind::Outline => {
            check_range(params, "width", 0.0, OUTLINE_WIDTH_MAX)?;
            check_color(params, "color")?;
        }
        EffectKind::Gradient => {
            if let Some(s) = param_str(params, "shape")
                && !matches!(s, "linear" | "radial")
            {
                return Err(AnimataError::validation(
                    "gradient shape must be 'linear' or 'radial'",
                ));
            }
            check_range(params, "angle", -360.0, 360.0)?;
            check_color(params, "from")?;
            check_color(params, "to")?;
        }
        EffectKind::Noise => {
            check_range(params, "amount", 0.0, 1.0)?;
            if let Some(seed) = params.get("seed")
                && !seed.is_u64()
            {
                return Err(AnimataError::validation(
                    "noise seed must be an unsigned integer",
                ));
            }
        }
        EffectKind::ColorCorrection => {
            check_range(params, "brightness", -1.0, 1.0)?;
            check_range(params, "contrast", -1.0, 1.0)?;
            check_range(params, "saturation", 0.0, 2.0)?;
            check_range(params, "hue", -180.0, 180.0)?;
        }
        EffectKind::ChromaticAberration => {
            check_range(params, "offset", 0.0, ABERRATION_MAX)?;
        }
        EffectKind::Blend => {
            if let Some(mode) = param_str(params, "mode")
                && BlendMode::from_name(mode).is_none()
            {
                return Err(AnimataError::validation(format!(
                    "unknown blend mode '{mode}'"
                )));
            }
        }
        EffectKind::Mask => {
            if let Some(s) = param_str(params, "shape")
                && !matches!(s, "rect" | "ellipse" | "luminance")
            {
                return Err(AnimataError::validation(
                    "mask shape must be 'rect', 'ellipse' or 'luminance'",
                ));
            }
            check_range(params, "feather", 0.0, FEATHER_MAX)?;
        }
    }
    Ok(())
}

fn lenient(params: &serde_json::Value, key: &str, default: f64, lo: f64, hi: f64) -> f64 {
    param_f64(params, key)
        .filter(|v| v.is_finite())
        .unwrap_or(default)
        .clamp(lo, hi)
}

/// Lenient mode: clamp whatever arrives and keep the session alive. Pure in
/// `(kind, params, frame)`; `frame` only feeds temporal noise seeding.
pub fn apply(kind: EffectKind, params: &serde_json::Value, frame: u64) -> EffectOutcome {
    match kind {
        EffectKind::Blur => {
            let radius = lenient(params, "radius", 4.0, 0.0, BLUR_RADIUS_MAX);
            let sigma = param_f64(params, "sigma")
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(radius / 2.0);
            EffectOutcome::Filter(FilterHint::Blur { radius, sigma })
        }
        EffectKind::Glow => EffectOutcome::Filter(FilterHint::Glow {
            radius: lenient(params, "radius", 8.0, 0.0, GLOW_RADIUS_MAX),
            intensity: lenient(params, "intensity", 0.5, 0.0, 1.0),
            color: param_color(params, "color").unwrap_or(Rgba::WHITE),
        }),
        EffectKind::Shadow => EffectOutcome::Filter(FilterHint::Shadow {
            dx: lenient(params, "dx", 4.0, -SHADOW_OFFSET_MAX, SHADOW_OFFSET_MAX),
            dy: lenient(params, "dy", 4.0, -SHADOW_OFFSET_MAX, SHADOW_OFFSET_MAX),
            blur: lenient(params, "blur", 8.0, 0.0, BLUR_RADIUS_MAX),
            color: param_color(params, "color").unwrap_or(Rgba::new(0, 0, 0, 160)),
        }),
        EffectKind::Outline => EffectOutcome::Filter(FilterHint::Outline {
            width: lenient(params, "width", 2.0, 0.0, OUTLINE_WIDTH_MAX),
            color: param_color(params, "color").unwrap_or(Rgba::WHITE),
        }),
        EffectKind::Gradient => {
            let shape = match param_str(params, "shape") {
                Some("radial") => GradientShape::Radial,
                _ => GradientShape::Linear,
            };
            EffectOutcome::Filter(FilterHint::Gradient {
                shape,
                from: param_color(params, "from").unwrap_or(Rgba::WHITE),
                to: param_color(params, "to").unwrap_or(Rgba::TRANSPARENT),
                angle_deg: lenient(params, "angle", 0.0, -360.0, 360.0),
            })
        }
        EffectKind::Noise => {
            let base_seed = params.get("seed").and_then(|v| v.as_u64()).unwrap_or(0);
            EffectOutcome::Filter(FilterHint::Noise {
                amount: lenient(params, "amount", 0.1, 0.0, 1.0),
                seed: base_seed.wrapping_add(frame),
            })
        }
        EffectKind::ColorCorrection => EffectOutcome::Filter(FilterHint::ColorCorrection {
            brightness: lenient(params, "brightness", 0.0, -1.0, 1.0),
            contrast: lenient(params, "contrast", 0.0, -1.0, 1.0),
            saturation: lenient(params, "saturation", 1.0, 0.0, 2.0),
            hue_deg: lenient(params, "hue", 0.0, -180.0, 180.0),
        }),
        EffectKind::ChromaticAberration => EffectOutcome::Filter(FilterHint::ChromaticAberration {
            offset: lenient(params, "offset", 2.0, 0.0, ABERRATION_MAX),
        }),
        EffectKind::Blend => {
            let mode = param_str(params, "mode")
                .and_then(BlendMode::from_name)
                .unwrap_or_default();
            EffectOutcome::Blend(mode)
        }
        EffectKind::Mask => {
            let shape = match param_str(params, "shape") {
                Some("ellipse") => MaskShape::Ellipse,
                Some("luminance") => MaskShape::Luminance,
                _ => MaskShape::Rect,
            };
            EffectOutcome::Mask {
                shape,
                feather: lenient(params, "feather", 0.0, 0.0, FEATHER_MAX),
            }
        }
    }
}
