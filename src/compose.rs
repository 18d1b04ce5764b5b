use std::collections::{HashMap, VecDeque};

use crate::{
    core::{Fps, FrameIndex, Vec2},
    error::{AnimataError, AnimataResult},
    fx::{BlendMode, EffectOutcome, FilterHint, MaskShape},
    model::{Element, ElementKind, PropertyBag, Scene, TransitionSpec},
    transitions::{TransitionDirection, TransitionFrames, TransitionKind},
};

/// The resolved, per-frame description of all visible, styled layers.
/// Ephemeral and derived; never persisted.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Composition {
    pub frame: FrameIndex,
    pub scene_id: Option<String>,
    pub layers: Vec<ResolvedLayer>,
    pub transitions: Vec<ActiveTransition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraState>,
    /// Wall-clock creation stamp (ms since the Unix epoch).
    pub created_ms: u64,
}

impl Composition {
    /// The composition of nothing: used when no scene covers a frame.
    pub fn blank(frame: FrameIndex) -> Self {
        Self {
            frame,
            scene_id: None,
            layers: Vec::new(),
            transitions: Vec::new(),
            camera: None,
            created_ms: now_ms(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ResolvedLayer {
    pub element_id: String,
    pub kind: ElementKind,
    /// Paint order; layers arrive sorted ascending (bottom first).
    pub layer: i32,
    pub props: PropertyBag,
    pub blend: BlendMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<ElementMask>,
    pub filters: Vec<FilterHint>,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ElementMask {
    pub shape: MaskShape,
    pub feather: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ActiveTransition {
    pub kind: TransitionKind,
    pub direction: TransitionDirection,
    /// Eased progress in `[0, 1]`.
    pub progress: f64,
    pub frames: TransitionFrames,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct CameraState {
    pub position: Vec2,
    pub zoom: f64,
    pub rotation: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Clone, Copy, Debug)]
pub struct ComposerConfig {
    /// Bounded cache capacity in compositions; oldest-inserted evicts first.
    pub cache_capacity: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
        }
    }
}

/// Scene Composer: turns `(scene, frame)` into a [`Composition`], with a
/// bounded per-`(scene, frame)` cache to keep scrubbing and preview cheap.
///
/// An explicit context object: create one per editing session or render
/// worker; there is no shared global instance.
#[derive(Debug)]
pub struct Composer {
    config: ComposerConfig,
    cache: HashMap<(String, u64), Composition>,
    insert_order: VecDeque<(String, u64)>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(ComposerConfig::default())
    }
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            cache: HashMap::new(),
            insert_order: VecDeque::new(),
        }
    }

    #[tracing::instrument(skip(self, scene), fields(scene = %scene.id, frame = frame.0))]
    pub fn compose(
        &mut self,
        scene: &Scene,
        frame: FrameIndex,
        fps: Fps,
    ) -> AnimataResult<Composition> {
        let key = (scene.id.clone(), frame.0);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let composition = compose_scene(scene, frame, fps)?;

        if self.config.cache_capacity > 0 {
            while self.cache.len() >= self.config.cache_capacity {
                match self.insert_order.pop_front() {
                    Some(oldest) => {
                        self.cache.remove(&oldest);
                    }
                    None => break,
                }
            }
            self.cache.insert(key.clone(), composition.clone());
            self.insert_order.push_back(key);
        }

        Ok(composition)
    }

    /// Evict every cached composition for a scene. Must be called after any
    /// structural edit to that scene.
    pub fn invalidate_scene(&mut self, scene_id: &str) {
        self.cache.retain(|(sid, _), _| sid != scene_id);
        self.insert_order.retain(|(sid, _)| sid != scene_id);
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
        self.insert_order.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

/// Uncached composition of one scene at one frame.
fn compose_scene(scene: &Scene, frame: FrameIndex, fps: Fps) -> AnimataResult<Composition> {
    if !scene.range.contains(frame) {
        return Err(AnimataError::evaluation(format!(
            "frame {} is outside scene '{}'",
            frame.0, scene.id
        )));
    }

    let mut visible: Vec<&Element> = scene
        .elements
        .iter()
        .filter(|e| e.visible && !e.locked && e.range.contains(frame))
        .collect();
    // Stable sort keeps declaration order within a layer.
    visible.sort_by_key(|e| e.layer);

    let mut layers = Vec::with_capacity(visible.len());
    for el in visible {
        layers.push(resolve_layer(el, frame, fps));
    }

    let transitions = scene
        .transitions
        .iter()
        .filter_map(|spec| resolve_active_transition(spec, scene, frame, fps))
        .collect();

    let camera = resolve_camera(scene, frame, fps);

    Ok(Composition {
        frame,
        scene_id: Some(scene.id.clone()),
        layers,
        transitions,
        camera,
        created_ms: now_ms(),
    })
}

fn resolve_layer(el: &Element, frame: FrameIndex, fps: Fps) -> ResolvedLayer {
    let local = frame.0 - el.range.start.0;
    let mut props = el.props.clone();

    for anim in &el.animations {
        let Some(value) = anim.evaluate(local, fps) else {
            continue; // before the first effective keyframe: keep base value
        };
        if !props.write_path(&anim.property, &value) {
            tracing::warn!(
                element = %el.id,
                property = %anim.property,
                "skipping animation with unresolvable property path"
            );
        }
    }
    props.opacity = props.opacity.clamp(0.0, 1.0);

    let mut blend = BlendMode::Normal;
    let mut mask = None;
    let mut filters = Vec::new();
    for fx in &el.effects {
        if !fx.enabled {
            continue;
        }
        if let Some(window) = fx.range {
            if !window.contains(FrameIndex(local)) {
                continue;
            }
        }
        match crate::fx::apply(fx.kind, &fx.params, frame.0) {
            EffectOutcome::Filter(hint) => filters.push(hint),
            EffectOutcome::Blend(mode) => blend = mode,
            EffectOutcome::Mask { shape, feather } => {
                mask = Some(ElementMask { shape, feather });
            }
        }
    }

    ResolvedLayer {
        element_id: el.id.clone(),
        kind: el.kind,
        layer: el.layer,
        props,
        blend,
        mask,
        filters,
    }
}

/// Window placement per direction: `In` anchors to the scene start, `Out` to
/// `end - duration`, `Cross` centers within the scene. Active when
/// `start <= frame <= start + duration`.
fn resolve_active_transition(
    spec: &TransitionSpec,
    scene: &Scene,
    frame: FrameIndex,
    fps: Fps,
) -> Option<ActiveTransition> {
    if spec.duration == 0 {
        return None;
    }
    let scene_len = scene.range.len_frames();
    let dur = spec.duration.min(scene_len);

    let start = match spec.direction {
        TransitionDirection::In => scene.range.start.0,
        TransitionDirection::Out => scene.range.end.0.saturating_sub(dur),
        TransitionDirection::Cross => scene.range.start.0 + (scene_len.saturating_sub(dur)) / 2,
    };

    if frame.0 < start || frame.0 > start + dur {
        return None;
    }

    let elapsed = (frame.0 - start) as f64;
    let t = elapsed / (dur as f64);
    let progress = spec
        .ease
        .apply_timed(t, elapsed, fps.as_f64())
        .clamp(0.0, 1.0);

    Some(ActiveTransition {
        kind: spec.kind,
        direction: spec.direction,
        progress,
        frames: crate::transitions::resolve(spec.kind, progress, &spec.params),
    })
}

fn resolve_camera(scene: &Scene, frame: FrameIndex, fps: Fps) -> Option<CameraState> {
    if scene.camera.is_empty() {
        return None;
    }
    let local = frame.0 - scene.range.start.0;
    let mut cam = CameraState::default();
    for anim in &scene.camera {
        let Some(value) = anim.evaluate(local, fps) else {
            continue;
        };
        let applied = match (anim.property.head(), &value) {
            ("position", crate::value::Value::Vector2(v)) => {
                cam.position = *v;
                true
            }
            ("zoom", crate::value::Value::Number(n)) => {
                cam.zoom = *n;
                true
            }
            ("rotation", crate::value::Value::Number(n)) => {
                cam.rotation = *n;
                true
            }
            _ => false,
        };
        if !applied {
            tracing::warn!(
                scene = %scene.id,
                property = %anim.property,
                "skipping camera animation with unknown property"
            );
        }
    }
    Some(cam)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        anim::{Animation, Keyframe},
        core::FrameRange,
        ease::Ease,
        model::EffectInstance,
        value::{PropertyPath, Value},
    };

    fn fps30() -> Fps {
        Fps::new(30, 1).unwrap()
    }

    fn element(id: &str, start: u64, end: u64, layer: i32) -> Element {
        Element {
            id: id.to_string(),
            kind: ElementKind::Shape,
            range: FrameRange::new(FrameIndex(start), FrameIndex(end)).unwrap(),
            layer,
            visible: true,
            locked: false,
            props: PropertyBag::default(),
            animations: vec![],
            effects: vec![],
        }
    }

    fn scene(elements: Vec<Element>) -> Scene {
        Scene {
            id: "s0".to_string(),
            range: FrameRange::new(FrameIndex(0), FrameIndex(99)).unwrap(),
            elements,
            transitions: vec![],
            camera: vec![],
        }
    }

    #[test]
    fn filters_invisible_locked_and_out_of_range() {
        let mut hidden = element("hidden", 0, 99, 0);
        hidden.visible = false;
        let mut locked = element("locked", 0, 99, 0);
        locked.locked = true;
        let late = element("late", 50, 99, 0);
        let shown = element("shown", 0, 99, 0);

        let s = scene(vec![hidden, locked, late, shown]);
        let mut composer = Composer::default();
        let c = composer.compose(&s, FrameIndex(10), fps30()).unwrap();
        assert_eq!(c.layers.len(), 1);
        assert_eq!(c.layers[0].element_id, "shown");
    }

    #[test]
    fn layers_are_sorted_bottom_first() {
        let s = scene(vec![
            element("top", 0, 99, 5),
            element("bottom", 0, 99, -1),
            element("mid", 0, 99, 2),
        ]);
        let mut composer = Composer::default();
        let c = composer.compose(&s, FrameIndex(0), fps30()).unwrap();
        let ids: Vec<_> = c.layers.iter().map(|l| l.element_id.as_str()).collect();
        assert_eq!(ids, ["bottom", "mid", "top"]);
    }

    #[test]
    fn animations_are_applied_element_local() {
        let mut el = element("e", 10, 99, 0);
        el.animations.push(Animation::new(
            PropertyPath::parse("opacity").unwrap(),
            vec![
                Keyframe {
                    frame: 0,
                    value: Value::Number(0.0),
                    ease: None,
                },
                Keyframe {
                    frame: 30,
                    value: Value::Number(1.0),
                    ease: None,
                },
            ],
            Ease::Linear,
        ));
        let s = scene(vec![el]);
        let mut composer = Composer::default();
        // Global frame 25 = element-local frame 15 = halfway.
        let c = composer.compose(&s, FrameIndex(25), fps30()).unwrap();
        assert_eq!(c.layers[0].props.opacity, 0.5);
    }

    #[test]
    fn effects_respect_window_and_order() {
        let mut el = element("e", 0, 99, 0);
        el.effects.push(EffectInstance {
            kind: crate::fx::EffectKind::Blur,
            params: serde_json::json!({ "radius": 3.0 }),
            enabled: true,
            range: Some(FrameRange::new(FrameIndex(0), FrameIndex(10)).unwrap()),
        });
        el.effects.push(EffectInstance {
            kind: crate::fx::EffectKind::Blend,
            params: serde_json::json!({ "mode": "multiply" }),
            enabled: true,
            range: None,
        });
        el.effects.push(EffectInstance {
            kind: crate::fx::EffectKind::Glow,
            params: serde_json::Value::Null,
            enabled: false,
            range: None,
        });

        let s = scene(vec![el]);
        let mut composer = Composer::default();

        let inside = composer.compose(&s, FrameIndex(5), fps30()).unwrap();
        assert_eq!(inside.layers[0].filters.len(), 1);
        assert_eq!(inside.layers[0].blend, BlendMode::Multiply);

        let outside = composer.compose(&s, FrameIndex(50), fps30()).unwrap();
        assert!(outside.layers[0].filters.is_empty());
        assert_eq!(outside.layers[0].blend, BlendMode::Multiply);
    }

    #[test]
    fn fade_transition_midpoint() {
        let mut s = scene(vec![element("e", 0, 99, 0)]);
        s.range = FrameRange::new(FrameIndex(10), FrameIndex(99)).unwrap();
        s.elements[0].range = s.range;
        s.transitions.push(TransitionSpec {
            kind: TransitionKind::Fade,
            duration: 30,
            ease: Ease::Linear,
            direction: TransitionDirection::In,
            params: serde_json::Value::Null,
        });

        let mut composer = Composer::default();
        let c = composer.compose(&s, FrameIndex(25), fps30()).unwrap();
        assert_eq!(c.transitions.len(), 1);
        let tr = &c.transitions[0];
        assert_eq!(tr.progress, 0.5);
        assert_eq!(tr.frames.from.opacity_mul, 0.5);
        assert_eq!(tr.frames.to.opacity_mul, 0.5);

        // Outside the window nothing is active.
        let later = composer.compose(&s, FrameIndex(60), fps30()).unwrap();
        assert!(later.transitions.is_empty());
    }

    #[test]
    fn out_transition_anchors_to_scene_end() {
        let mut s = scene(vec![]);
        s.transitions.push(TransitionSpec {
            kind: TransitionKind::Fade,
            duration: 20,
            ease: Ease::Linear,
            direction: TransitionDirection::Out,
            params: serde_json::Value::Null,
        });
        let mut composer = Composer::default();
        // Scene range [0, 99]: the out window is [79, 99].
        let at_end = composer.compose(&s, FrameIndex(99), fps30()).unwrap();
        assert_eq!(at_end.transitions[0].progress, 1.0);
        let before = composer.compose(&s, FrameIndex(78), fps30()).unwrap();
        assert!(before.transitions.is_empty());
    }

    #[test]
    fn compose_is_idempotent_through_the_cache() {
        let s = scene(vec![element("e", 0, 99, 0)]);
        let mut composer = Composer::default();
        let a = composer.compose(&s, FrameIndex(4), fps30()).unwrap();
        let b = composer.compose(&s, FrameIndex(4), fps30()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalidation_drops_only_the_touched_scene() {
        let s0 = scene(vec![element("e", 0, 99, 0)]);
        let mut s1 = scene(vec![]);
        s1.id = "s1".to_string();

        let mut composer = Composer::default();
        composer.compose(&s0, FrameIndex(0), fps30()).unwrap();
        composer.compose(&s0, FrameIndex(1), fps30()).unwrap();
        composer.compose(&s1, FrameIndex(2), fps30()).unwrap();
        assert_eq!(composer.cached_len(), 3);

        composer.invalidate_scene("s0");
        assert_eq!(composer.cached_len(), 1);
        composer.invalidate_all();
        assert_eq!(composer.cached_len(), 0);
    }

    #[test]
    fn cache_evicts_oldest_inserted_first() {
        let s = scene(vec![]);
        let mut composer = Composer::new(ComposerConfig { cache_capacity: 2 });
        composer.compose(&s, FrameIndex(0), fps30()).unwrap();
        composer.compose(&s, FrameIndex(1), fps30()).unwrap();
        composer.compose(&s, FrameIndex(2), fps30()).unwrap();
        assert_eq!(composer.cached_len(), 2);

        // Frame 0 was oldest; recomposing it must miss (fresh timestamp
        // not required, only that the entry was dropped).
        assert!(!composer.cache.contains_key(&("s0".to_string(), 0)));
        assert!(composer.cache.contains_key(&("s0".to_string(), 2)));
    }

    #[test]
    fn out_of_scene_frame_is_an_evaluation_error() {
        let s = scene(vec![]);
        let mut composer = Composer::default();
        assert!(composer.compose(&s, FrameIndex(100), fps30()).is_err());
    }

    #[test]
    fn camera_animations_feed_camera_state() {
        let mut s = scene(vec![]);
        s.camera.push(Animation::new(
            PropertyPath::parse("zoom").unwrap(),
            vec![
                Keyframe {
                    frame: 0,
                    value: Value::Number(1.0),
                    ease: None,
                },
                Keyframe {
                    frame: 50,
                    value: Value::Number(2.0),
                    ease: None,
                },
            ],
            Ease::Linear,
        ));
        let mut composer = Composer::default();
        let c = composer.compose(&s, FrameIndex(25), fps30()).unwrap();
        assert_eq!(c.camera.unwrap().zoom, 1.5);
    }
}
