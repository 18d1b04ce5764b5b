#![forbid(unsafe_code)]

pub mod anim;
pub mod compose;
pub mod core;
pub mod ease;
pub mod edit;
pub mod engine;
pub mod error;
pub mod fx;
pub mod job;
pub mod model;
pub mod quality;
pub mod transitions;
pub mod value;

pub use anim::{Animation, Keyframe};
pub use compose::{Composer, ComposerConfig, Composition, ResolvedLayer};
pub use crate::core::{Canvas, Fps, FrameIndex, FrameRange, Rgba, Vec2, Vec3};
pub use ease::Ease;
pub use edit::{EditLog, SceneEdit};
pub use engine::Engine;
pub use error::{AnimataError, AnimataResult};
pub use job::{
    EncodeSpec, FrameHandle, FrameSink, JobSnapshot, JobStatus, Orchestrator, OutputHandle,
    RenderJob, RenderMode, RenderOptions, Stage,
};
pub use model::{Element, ElementKind, Project, Scene};
pub use quality::{OutputFormat, QualityTier, Resolution};
pub use value::{PropertyPath, Value};
