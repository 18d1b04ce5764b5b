use std::collections::BTreeMap;

use animata::{
    Animation, Canvas, Ease, Element, ElementKind, Engine, Fps, FrameIndex, FrameRange, Keyframe,
    Project, Rgba, Scene, Value,
    model::{PropertyBag, TransitionSpec},
    transitions::{TransitionDirection, TransitionKind},
};

fn path(s: &str) -> animata::PropertyPath {
    s.parse().unwrap()
}

fn element(id: &str, start: u64, end: u64) -> Element {
    Element {
        id: id.to_string(),
        kind: ElementKind::Shape,
        range: FrameRange::new(FrameIndex(start), FrameIndex(end)).unwrap(),
        layer: 0,
        visible: true,
        locked: false,
        props: PropertyBag::default(),
        animations: vec![],
        effects: vec![],
    }
}

fn project(duration: u64, scenes: Vec<Scene>) -> Project {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Project {
        name: "pipeline".to_string(),
        duration,
        fps: Fps::new(30, 1).unwrap(),
        canvas: Canvas {
            width: 1920,
            height: 1080,
        },
        background: Rgba::TRANSPARENT,
        scenes,
        quality: Default::default(),
        colorspace: Default::default(),
    }
}

fn opacity_ramp(over_frames: u64) -> Animation {
    Animation {
        property: path("opacity"),
        keys: vec![
            Keyframe {
                frame: 0,
                value: Value::Number(0.0),
                ease: None,
            },
            Keyframe {
                frame: over_frames,
                value: Value::Number(1.0),
                ease: None,
            },
        ],
        ease: Ease::Linear,
        delay: 0,
        duration: 0,
        looped: false,
        yoyo: false,
    }
}

#[test]
fn linear_opacity_ramp_hits_half_at_midpoint() {
    let mut el = element("title", 0, 59);
    el.animations.push(opacity_ramp(30));
    let scene = Scene {
        id: "intro".to_string(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(59)).unwrap(),
        elements: vec![el],
        transitions: vec![],
        camera: vec![],
    };
    let mut engine = Engine::load(project(60, vec![scene])).unwrap();

    let comp = engine.compose_frame(FrameIndex(15)).unwrap();
    assert_eq!(comp.layers.len(), 1);
    assert!((comp.layers[0].props.opacity - 0.5).abs() < 1e-9);

    // After the last keyframe the value clamps.
    let comp = engine.compose_frame(FrameIndex(45)).unwrap();
    assert_eq!(comp.layers[0].props.opacity, 1.0);
}

#[test]
fn fade_transition_splits_opacity_at_midpoint() {
    // Scene of 50 frames with a 30-frame cross fade: the window is centered,
    // so it runs frames 10..=40 and frame 25 is its midpoint.
    let scene = Scene {
        id: "fade".to_string(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(49)).unwrap(),
        elements: vec![element("card", 0, 49)],
        transitions: vec![TransitionSpec {
            kind: TransitionKind::Fade,
            duration: 30,
            ease: Ease::Linear,
            direction: TransitionDirection::Cross,
            params: serde_json::Value::Null,
        }],
        camera: vec![],
    };
    let mut engine = Engine::load(project(50, vec![scene])).unwrap();

    let comp = engine.compose_frame(FrameIndex(25)).unwrap();
    assert_eq!(comp.transitions.len(), 1);
    let tr = &comp.transitions[0];
    assert!((tr.progress - 0.5).abs() < 1e-9);
    assert!((tr.frames.from.opacity_mul - 0.5).abs() < 1e-9);
    assert!((tr.frames.to.opacity_mul - 0.5).abs() < 1e-9);

    // Outside the window the transition is absent.
    let comp = engine.compose_frame(FrameIndex(5)).unwrap();
    assert!(comp.transitions.is_empty());
}

#[test]
fn frames_between_scenes_compose_blank() {
    let scene = Scene {
        id: "late".to_string(),
        range: FrameRange::new(FrameIndex(60), FrameIndex(119)).unwrap(),
        elements: vec![element("box", 60, 119)],
        transitions: vec![],
        camera: vec![],
    };
    let mut engine = Engine::load(project(120, vec![scene])).unwrap();

    let comp = engine.compose_frame(FrameIndex(30)).unwrap();
    assert!(comp.scene_id.is_none());
    assert!(comp.layers.is_empty());

    let comp = engine.compose_frame(FrameIndex(90)).unwrap();
    assert_eq!(comp.scene_id.as_deref(), Some("late"));
    assert_eq!(comp.layers.len(), 1);
}

#[test]
fn repeated_composition_of_one_frame_is_identical() {
    let mut el = element("pulse", 0, 119);
    el.animations.push(Animation {
        property: path("scale.x"),
        keys: vec![
            Keyframe {
                frame: 0,
                value: Value::Number(1.0),
                ease: None,
            },
            Keyframe {
                frame: 20,
                value: Value::Number(2.0),
                ease: Some(Ease::EaseInOut),
            },
        ],
        ease: Ease::Linear,
        delay: 0,
        duration: 20,
        looped: true,
        yoyo: true,
    });
    let scene = Scene {
        id: "loop".to_string(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(119)).unwrap(),
        elements: vec![el],
        transitions: vec![],
        camera: vec![],
    };
    let mut engine = Engine::load(project(120, vec![scene])).unwrap();

    let a = engine.compose_frame(FrameIndex(73)).unwrap();
    let b = engine.compose_frame(FrameIndex(73)).unwrap();
    assert_eq!(a.layers, b.layers);
    assert_eq!(a.transitions, b.transitions);
}

#[test]
fn yoyo_scale_mirrors_on_the_return_leg() {
    let mut el = element("pulse", 0, 119);
    el.animations.push(Animation {
        property: path("scale"),
        keys: vec![
            Keyframe {
                frame: 0,
                value: Value::Vector2(animata::Vec2::new(1.0, 1.0)),
                ease: None,
            },
            Keyframe {
                frame: 10,
                value: Value::Vector2(animata::Vec2::new(3.0, 3.0)),
                ease: None,
            },
        ],
        ease: Ease::Linear,
        delay: 0,
        duration: 10,
        looped: true,
        yoyo: true,
    });
    let scene = Scene {
        id: "pulse".to_string(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(119)).unwrap(),
        elements: vec![el],
        transitions: vec![],
        camera: vec![],
    };
    let mut engine = Engine::load(project(120, vec![scene])).unwrap();

    // Forward leg frame 5 and mirrored leg frame 15 land on the same value.
    let fwd = engine.compose_frame(FrameIndex(5)).unwrap().layers[0]
        .props
        .scale;
    let back = engine.compose_frame(FrameIndex(15)).unwrap().layers[0]
        .props
        .scale;
    assert!((fwd.x - back.x).abs() < 1e-9);
    assert!((fwd.x - 2.0).abs() < 1e-9);
}

#[test]
fn extra_property_animation_reaches_the_composed_bag() {
    let mut el = element("txt", 0, 59);
    el.kind = ElementKind::Text;
    el.props.extra.insert(
        "font_size".to_string(),
        Value::Number(12.0),
    );
    el.animations.push(Animation {
        property: path("font_size"),
        keys: vec![
            Keyframe {
                frame: 0,
                value: Value::Number(12.0),
                ease: None,
            },
            Keyframe {
                frame: 30,
                value: Value::Number(24.0),
                ease: None,
            },
        ],
        ease: Ease::Linear,
        delay: 0,
        duration: 0,
        looped: false,
        yoyo: false,
    });
    let scene = Scene {
        id: "type".to_string(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(59)).unwrap(),
        elements: vec![el],
        transitions: vec![],
        camera: vec![],
    };
    let mut engine = Engine::load(project(60, vec![scene])).unwrap();

    let comp = engine.compose_frame(FrameIndex(15)).unwrap();
    let got = comp.layers[0]
        .props
        .extra
        .get("font_size")
        .and_then(|v| v.as_number())
        .unwrap();
    assert!((got - 18.0).abs() < 1e-9);
}

#[test]
fn load_rejects_animation_to_undeclared_path() {
    let mut el = element("ghost", 0, 59);
    el.animations.push(Animation {
        property: path("no_such_field"),
        keys: vec![Keyframe {
            frame: 0,
            value: Value::Number(1.0),
            ease: None,
        }],
        ease: Ease::Linear,
        delay: 0,
        duration: 0,
        looped: false,
        yoyo: false,
    });
    let scene = Scene {
        id: "bad".to_string(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(59)).unwrap(),
        elements: vec![el],
        transitions: vec![],
        camera: vec![],
    };
    let err = Engine::load(project(60, vec![scene])).unwrap_err();
    assert!(err.to_string().contains("no_such_field"), "{err}");
}

#[test]
fn edits_change_subsequent_compositions_and_undo_restores() {
    let scene = Scene {
        id: "edit".to_string(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(59)).unwrap(),
        elements: vec![element("a", 0, 59)],
        transitions: vec![],
        camera: vec![],
    };
    let mut engine = Engine::load(project(60, vec![scene])).unwrap();

    assert_eq!(engine.compose_frame(FrameIndex(10)).unwrap().layers.len(), 1);

    engine
        .apply(animata::SceneEdit::AddElement {
            scene_id: "edit".to_string(),
            element: element("b", 0, 59),
        })
        .unwrap();
    assert_eq!(engine.compose_frame(FrameIndex(10)).unwrap().layers.len(), 2);

    engine.undo().unwrap();
    assert_eq!(engine.compose_frame(FrameIndex(10)).unwrap().layers.len(), 1);

    engine.redo().unwrap();
    assert_eq!(engine.compose_frame(FrameIndex(10)).unwrap().layers.len(), 2);
}

#[test]
fn project_survives_a_json_round_trip_through_the_engine() {
    let mut el = element("r", 0, 59);
    el.animations.push(opacity_ramp(30));
    el.props.extra = BTreeMap::from([("tint".to_string(), Value::Color(Rgba::WHITE))]);
    let scene = Scene {
        id: "io".to_string(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(59)).unwrap(),
        elements: vec![el],
        transitions: vec![],
        camera: vec![],
    };
    let original = project(60, vec![scene]);

    let json = serde_json::to_string(&original).unwrap();
    let parsed: Project = serde_json::from_str(&json).unwrap();
    let mut engine = Engine::load(parsed).unwrap();

    let comp = engine.compose_frame(FrameIndex(15)).unwrap();
    assert!((comp.layers[0].props.opacity - 0.5).abs() < 1e-9);
}
