use crate::error::{AnimataError, AnimataResult};

/// Easing families for keyframe and transition pacing.
///
/// Every family except `Spring` is a pure remap `[0,1] -> [0,1]` with
/// `f(0) = 0` and `f(1) = 1`. `Spring` responds to elapsed time rather than
/// normalized progress and is evaluated through [`spring_response`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    Linear,
    /// CSS `ease`: cubic-bezier(0.25, 0.1, 0.25, 1.0).
    Ease,
    /// CSS `ease-in`: cubic-bezier(0.42, 0.0, 1.0, 1.0).
    EaseIn,
    /// CSS `ease-out`: cubic-bezier(0.0, 0.0, 0.58, 1.0).
    EaseOut,
    /// CSS `ease-in-out`: cubic-bezier(0.42, 0.0, 0.58, 1.0).
    EaseInOut,
    /// Piecewise-quadratic bounce (decaying rebounds toward 1).
    Bounce,
    /// Exponentially decaying sinusoid overshooting 1.
    Elastic,
    /// Slight overshoot past 1 before settling.
    Back,
    CubicBezier {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    /// Damped harmonic step response; frame-rate dependent.
    Spring { damping: f64, stiffness: f64 },
}

impl Ease {
    /// Apply the easing to normalized progress `t`.
    ///
    /// `Spring` cannot be expressed as a function of `t` alone; callers with
    /// timing context (the evaluator, transition resolution) route it through
    /// [`spring_response`]. Here it degrades to `EaseOut` so a spring ease on
    /// a context-free path still produces sensible motion.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::Bounce => bounce_out(t),
            Self::Elastic => elastic_out(t),
            Self::Back => back_out(t),
            Self::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(x1, y1, x2, y2, t),
            Self::Spring { .. } => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
        }
    }

    /// Apply with timing context. Non-spring families ignore the timing and
    /// behave exactly like [`Ease::apply`].
    pub fn apply_timed(self, t: f64, elapsed_frames: f64, fps: f64) -> f64 {
        match self {
            Self::Spring { damping, stiffness } => {
                spring_response(elapsed_frames, fps, damping, stiffness)
            }
            other => other.apply(t),
        }
    }

    pub fn validate(self) -> AnimataResult<()> {
        match self {
            Self::CubicBezier { x1, y1, x2, y2 } => {
                for v in [x1, y1, x2, y2] {
                    if !v.is_finite() {
                        return Err(AnimataError::validation(
                            "cubic-bezier control points must be finite",
                        ));
                    }
                }
                if !(0.0..=1.0).contains(&x1) || !(0.0..=1.0).contains(&x2) {
                    return Err(AnimataError::validation(
                        "cubic-bezier x1/x2 must be within [0, 1]",
                    ));
                }
                Ok(())
            }
            Self::Spring { damping, stiffness } => {
                if !damping.is_finite() || damping < 0.0 {
                    return Err(AnimataError::validation(
                        "spring damping must be finite and >= 0",
                    ));
                }
                if !stiffness.is_finite() || stiffness <= 0.0 {
                    return Err(AnimataError::validation(
                        "spring stiffness must be finite and > 0",
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Unit-mass damped spring step response at `elapsed_frames / fps` seconds.
///
/// Deterministic in `(elapsed_frames, fps, damping, stiffness)`: the same
/// inputs always produce the same sample, independent of wall-clock time.
/// Converges to 1.0; underdamped configurations overshoot on the way.
pub fn spring_response(elapsed_frames: f64, fps: f64, damping: f64, stiffness: f64) -> f64 {
    if fps <= 0.0 || stiffness <= 0.0 {
        return 1.0;
    }
    let t = (elapsed_frames / fps).max(0.0);
    let omega = stiffness.sqrt();
    let zeta = damping / (2.0 * stiffness.sqrt());

    if zeta < 1.0 {
        let omega_d = omega * (1.0 - zeta * zeta).sqrt();
        let decay = (-zeta * omega * t).exp();
        1.0 - decay * ((omega_d * t).cos() + (zeta * omega / omega_d) * (omega_d * t).sin())
    } else if (zeta - 1.0).abs() < 1e-9 {
        let decay = (-omega * t).exp();
        1.0 - decay * (1.0 + omega * t)
    } else {
        let s = (zeta * zeta - 1.0).sqrt();
        let r1 = -omega * (zeta - s);
        let r2 = -omega * (zeta + s);
        1.0 + (r2 * (r1 * t).exp() - r1 * (r2 * t).exp()) / (r1 - r2)
    }
}

/// Sample `y` on the unit cubic bezier with control points `(x1,y1),(x2,y2)`
/// at horizontal position `x`. Newton iteration with a bisection fallback.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    fn sample(p1: f64, p2: f64, t: f64) -> f64 {
        // Cubic with endpoints pinned to 0 and 1.
        let c = 3.0 * p1;
        let b = 3.0 * (p2 - p1) - c;
        let a = 1.0 - c - b;
        ((a * t + b) * t + c) * t
    }

    fn sample_deriv(p1: f64, p2: f64, t: f64) -> f64 {
        let c = 3.0 * p1;
        let b = 3.0 * (p2 - p1) - c;
        let a = 1.0 - c - b;
        (3.0 * a * t + 2.0 * b) * t + c
    }

    let mut t = x;
    for _ in 0..8 {
        let err = sample(x1, x2, t) - x;
        if err.abs() < 1e-7 {
            return sample(y1, y2, t);
        }
        let d = sample_deriv(x1, x2, t);
        if d.abs() < 1e-6 {
            break;
        }
        t -= err / d;
    }

    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    t = x;
    while hi - lo > 1e-7 {
        if sample(x1, x2, t) < x {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) / 2.0;
    }
    sample(y1, y2, t)
}

fn bounce_out(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

fn elastic_out(t: f64) -> f64 {
    const C4: f64 = std::f64::consts::TAU / 3.0;
    if t <= 0.0 {
        0.0
    } else if t >= 1.0 {
        1.0
    } else {
        (2.0f64).powf(-10.0 * t) * ((t * 10.0 - 0.75) * C4).sin() + 1.0
    }
}

fn back_out(t: f64) -> f64 {
    const C1: f64 = 1.70158;
    const C3: f64 = C1 + 1.0;
    1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
}
