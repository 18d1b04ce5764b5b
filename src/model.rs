use std::collections::{BTreeMap, BTreeSet};

use crate::{
    anim::Animation,
    core::{Canvas, Fps, FrameIndex, FrameRange, Rgba, Vec2},
    ease::Ease,
    error::{AnimataError, AnimataResult},
    fx::EffectKind,
    quality::QualityTier,
    transitions::{TransitionDirection, TransitionKind},
    value::{PropertyPath, Value, map_read, map_write},
};

/// Top-level authoring container. Loaded once per session; render jobs
/// capture an immutable snapshot (`Arc<Project>`) so live edits never race a
/// running render.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Project {
    pub name: String,
    pub duration: u64, // total frames
    pub fps: Fps,
    pub canvas: Canvas,
    pub background: Rgba,
    pub scenes: Vec<Scene>,
    #[serde(default)]
    pub quality: QualityTier,
    #[serde(default)]
    pub colorspace: Colorspace,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Colorspace {
    #[default]
    Srgb,
    Rec709,
}

/// A contiguous frame span of the project with its own element stack.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    pub id: String,
    pub range: FrameRange,
    pub elements: Vec<Element>,
    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,
    /// Camera animations over `position` / `zoom` / `rotation`,
    /// scene-local frames.
    #[serde(default)]
    pub camera: Vec<Animation>,
}

impl Scene {
    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ElementKind {
    Text,
    Shape,
    Image,
    ParticleEmitter,
    Group,
}

/// A typed node on a scene's layer stack. Exclusively owned by its scene.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    pub range: FrameRange,
    /// Paint order; higher is on top.
    pub layer: i32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    pub props: PropertyBag,
    #[serde(default)]
    pub animations: Vec<Animation>,
    #[serde(default)]
    pub effects: Vec<EffectInstance>,
}

fn default_true() -> bool {
    true
}

impl Element {
    /// Deep copy with a fresh identity.
    pub fn duplicate(&self, new_id: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.id = new_id.into();
        copy
    }
}

/// Static (pre-animation) properties of an element. Fixed fields cover the
/// shared transform set; kind-specific fields live in `extra` and must be
/// declared there before an animation may target them.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PropertyBag {
    #[serde(default)]
    pub position: Vec2,
    #[serde(default = "default_unit_vec2")]
    pub scale: Vec2,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default)]
    pub size: Vec2,
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

fn default_unit_vec2() -> Vec2 {
    Vec2::new(1.0, 1.0)
}

fn default_one() -> f64 {
    1.0
}

impl Default for PropertyBag {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: default_unit_vec2(),
            rotation: 0.0,
            opacity: 1.0,
            size: Vec2::ZERO,
            extra: BTreeMap::new(),
        }
    }
}

fn vec2_component(v: Vec2, axis: &str) -> Option<Value> {
    match axis {
        "x" => Some(Value::Number(v.x)),
        "y" => Some(Value::Number(v.y)),
        _ => None,
    }
}

fn set_vec2_component(v: &mut Vec2, axis: &str, value: &Value) -> bool {
    let Some(n) = value.as_number() else {
        return false;
    };
    match axis {
        "x" => v.x = n,
        "y" => v.y = n,
        _ => return false,
    }
    true
}

impl PropertyBag {
    /// Typed read through a path. `None` means the path does not resolve.
    pub fn read_path(&self, path: &PropertyPath) -> Option<Value> {
        let tail = path.tail();
        match path.head() {
            "position" if tail.is_empty() => Some(Value::Vector2(self.position)),
            "position" if tail.len() == 1 => vec2_component(self.position, &tail[0]),
            "scale" if tail.is_empty() => Some(Value::Vector2(self.scale)),
            "scale" if tail.len() == 1 => vec2_component(self.scale, &tail[0]),
            "size" if tail.is_empty() => Some(Value::Vector2(self.size)),
            "size" if tail.len() == 1 => vec2_component(self.size, &tail[0]),
            "rotation" if tail.is_empty() => Some(Value::Number(self.rotation)),
            "opacity" if tail.is_empty() => Some(Value::Number(self.opacity)),
            _ => map_read(&self.extra, path.segments()).cloned(),
        }
    }

    /// Typed write through a path. Returns `false` when the path does not
    /// resolve or carries a mismatched value shape; nothing is fabricated.
    pub fn write_path(&mut self, path: &PropertyPath, value: &Value) -> bool {
        let tail = path.tail();
        match path.head() {
            "position" if tail.is_empty() => match value.as_vec2() {
                Some(v) => {
                    self.position = v;
                    true
                }
                None => false,
            },
            "position" if tail.len() == 1 => set_vec2_component(&mut self.position, &tail[0], value),
            "scale" if tail.is_empty() => match value.as_vec2() {
                Some(v) => {
                    self.scale = v;
                    true
                }
                None => false,
            },
            "scale" if tail.len() == 1 => set_vec2_component(&mut self.scale, &tail[0], value),
            "size" if tail.is_empty() => match value.as_vec2() {
                Some(v) => {
                    self.size = v;
                    true
                }
                None => false,
            },
            "size" if tail.len() == 1 => set_vec2_component(&mut self.size, &tail[0], value),
            "rotation" if tail.is_empty() => match value.as_number() {
                Some(n) => {
                    self.rotation = n;
                    true
                }
                None => false,
            },
            "opacity" if tail.is_empty() => match value.as_number() {
                Some(n) => {
                    self.opacity = n;
                    true
                }
                None => false,
            },
            _ => map_write(&mut self.extra, path.segments(), value.clone()),
        }
    }
}

/// A time-bounded blend between adjacent scenes or states, resolved by the
/// strategy matching `kind`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TransitionSpec {
    pub kind: TransitionKind,
    pub duration: u64,
    pub ease: Ease,
    pub direction: TransitionDirection,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl TransitionSpec {
    pub fn validate(&self) -> AnimataResult<()> {
        if self.duration == 0 {
            return Err(AnimataError::validation("transition duration must be > 0"));
        }
        self.ease.validate()
    }
}

/// An effect attached to an element, applied in declaration order.
/// `range` is element-local; `None` means the whole element lifetime.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EffectInstance {
    pub kind: EffectKind,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<FrameRange>,
}

/// One structured finding from [`Project::validate_all`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ValidationIssue {
    /// Dotted location, e.g. `scenes[0].elements[2].animations[1]`.
    pub location: String,
    pub message: String,
}

impl Project {
    /// Strict validation: first hard error, or `Ok`.
    pub fn validate(&self) -> AnimataResult<()> {
        let issues = self.validate_all();
        match issues.into_iter().next() {
            None => Ok(()),
            Some(issue) => Err(AnimataError::validation(format!(
                "{}: {}",
                issue.location, issue.message
            ))),
        }
    }

    /// Collect every validation finding without stopping at the first.
    ///
    /// Element frame ranges hanging outside their scene are *not* reported
    /// here: they are reconciled by [`Project::reconcile`], the one
    /// deliberate leniency for live editing.
    pub fn validate_all(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut push = |location: String, message: String| {
            issues.push(ValidationIssue { location, message });
        };

        if self.duration == 0 {
            push("project".into(), "duration must be > 0 frames".into());
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            push("project".into(), "fps must have num > 0 and den > 0".into());
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            push("project".into(), "canvas width/height must be > 0".into());
        }

        let mut scene_ids = BTreeSet::new();
        for (si, scene) in self.scenes.iter().enumerate() {
            let at = format!("scenes[{si}]");
            if !scene_ids.insert(scene.id.as_str()) {
                push(at.clone(), format!("duplicate scene id '{}'", scene.id));
            }
            if scene.range.end.0 <= scene.range.start.0 {
                push(at.clone(), "scene range must have end > start".into());
            }
            if scene.range.end.0 >= self.duration {
                push(at.clone(), "scene range exceeds project duration".into());
            }

            for (ti, tr) in scene.transitions.iter().enumerate() {
                if let Err(e) = tr.validate() {
                    push(format!("{at}.transitions[{ti}]"), e.to_string());
                }
                if let Err(e) = crate::transitions::validate_params(tr.kind, &tr.params) {
                    push(format!("{at}.transitions[{ti}]"), e.to_string());
                }
            }

            for (ci, cam) in scene.camera.iter().enumerate() {
                if let Err(e) = cam.validate() {
                    push(format!("{at}.camera[{ci}]"), e.to_string());
                }
            }

            let mut element_ids = BTreeSet::new();
            for (ei, el) in scene.elements.iter().enumerate() {
                let at = format!("{at}.elements[{ei}]");
                if !element_ids.insert(el.id.as_str()) {
                    push(at.clone(), format!("duplicate element id '{}'", el.id));
                }
                if !el.props.opacity.is_finite() {
                    push(at.clone(), "opacity must be finite".into());
                }

                for (ai, anim) in el.animations.iter().enumerate() {
                    let at = format!("{at}.animations[{ai}]");
                    if let Err(e) = anim.validate() {
                        push(at.clone(), e.to_string());
                    }
                    if el.props.read_path(&anim.property).is_none() {
                        push(
                            at,
                            format!(
                                "unknown property path '{}' on element '{}'",
                                anim.property, el.id
                            ),
                        );
                    }
                }

                for (fi, fx) in el.effects.iter().enumerate() {
                    if let Err(e) = crate::fx::validate_params(fx.kind, &fx.params) {
                        push(format!("{at}.effects[{fi}]"), e.to_string());
                    }
                }
            }
        }

        issues
    }

    /// Repair the lenient invariants in place: clip element ranges to their
    /// owning scene (in scene-relative terms both bounds are clamped, so a
    /// fully disjoint element collapses to the nearest boundary frame) and
    /// re-sort keyframe lists.
    pub fn reconcile(&mut self) {
        for scene in &mut self.scenes {
            let range = scene.range;
            for el in &mut scene.elements {
                el.range = match el.range.clip_to(range) {
                    Some(clipped) => clipped,
                    None => {
                        let edge = if el.range.end.0 < range.start.0 {
                            range.start
                        } else {
                            range.end
                        };
                        FrameRange {
                            start: edge,
                            end: edge,
                        }
                    }
                };
                for anim in &mut el.animations {
                    anim.sort_keys();
                }
                // Effect windows are element-local; clip them to the
                // element's (possibly just clipped) lifetime.
                let lifetime = FrameRange {
                    start: FrameIndex(0),
                    end: FrameIndex(el.range.len_frames().saturating_sub(1)),
                };
                for fx in &mut el.effects {
                    if let Some(window) = fx.range {
                        fx.range = Some(window.clip_to(lifetime).unwrap_or_else(|| {
                            let edge = if window.end.0 < lifetime.start.0 {
                                lifetime.start
                            } else {
                                lifetime.end
                            };
                            FrameRange {
                                start: edge,
                                end: edge,
                            }
                        }));
                    }
                }
            }
            for cam in &mut scene.camera {
                cam.sort_keys();
            }
        }
    }

    /// The scene whose range covers `frame`, if any. Earlier scenes win on
    /// overlap.
    pub fn scene_at(&self, frame: FrameIndex) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.range.contains(frame))
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn scene_mut(&mut self, id: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id == id)
    }
}
