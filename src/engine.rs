use std::sync::Arc;

use crate::{
    compose::{Composer, ComposerConfig, Composition},
    core::FrameIndex,
    edit::{EditLog, SceneEdit, apply_edit},
    error::AnimataResult,
    model::Project,
};

/// Explicit per-session context tying a live project to its composer cache
/// and edit history. Passed around instead of module-level singletons so
/// independent sessions (and tests) never share mutable state.
#[derive(Debug)]
pub struct Engine {
    project: Project,
    composer: Composer,
    history: EditLog,
}

impl Engine {
    /// Load a project: reconcile the lenient invariants (element range
    /// clipping, keyframe order), then validate strictly.
    pub fn load(mut project: Project) -> AnimataResult<Self> {
        project.reconcile();
        project.validate()?;
        Ok(Self {
            project,
            composer: Composer::new(ComposerConfig::default()),
            history: EditLog::default(),
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Immutable snapshot for a render job; later edits never touch it.
    pub fn snapshot(&self) -> Arc<Project> {
        Arc::new(self.project.clone())
    }

    /// Apply a structural edit, recording its inverse and evicting the
    /// touched scene's cached compositions.
    pub fn apply(&mut self, edit: SceneEdit) -> AnimataResult<()> {
        let inverse = apply_edit(&mut self.project, &edit)?;
        self.composer.invalidate_scene(edit.scene_id());
        self.history.record(inverse);
        Ok(())
    }

    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> AnimataResult<bool> {
        let Some(inverse) = self.history.pop_undo() else {
            return Ok(false);
        };
        let redo = apply_edit(&mut self.project, &inverse)?;
        self.composer.invalidate_scene(inverse.scene_id());
        self.history.push_redo(redo);
        Ok(true)
    }

    /// Returns `false` when there is nothing to redo.
    pub fn redo(&mut self) -> AnimataResult<bool> {
        let Some(edit) = self.history.pop_redo() else {
            return Ok(false);
        };
        let inverse = apply_edit(&mut self.project, &edit)?;
        self.composer.invalidate_scene(edit.scene_id());
        self.history.push_undo_from_redo(inverse);
        Ok(true)
    }

    /// Compose the active scene at `frame`; a frame no scene covers yields a
    /// blank composition.
    pub fn compose_frame(&mut self, frame: FrameIndex) -> AnimataResult<Composition> {
        let Self {
            project, composer, ..
        } = self;
        match project.scenes.iter().find(|s| s.range.contains(frame)) {
            Some(scene) => composer.compose(scene, frame, project.fps),
            None => Ok(Composition::blank(frame)),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}
