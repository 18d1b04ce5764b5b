use crate::{
    error::{AnimataError, AnimataResult},
    model::{Element, Project},
};

/// A structural edit to one scene. Every edit is invertible, so undo/redo is
/// a command log rather than whole-project snapshots: memory grows with the
/// number of edits, not project size.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum SceneEdit {
    AddElement {
        scene_id: String,
        element: Element,
    },
    RemoveElement {
        scene_id: String,
        element_id: String,
    },
    /// Replace the element with the same id wholesale.
    UpdateElement {
        scene_id: String,
        element: Element,
    },
    SetLayer {
        scene_id: String,
        element_id: String,
        layer: i32,
    },
}

impl SceneEdit {
    pub fn scene_id(&self) -> &str {
        match self {
            Self::AddElement { scene_id, .. }
            | Self::RemoveElement { scene_id, .. }
            | Self::UpdateElement { scene_id, .. }
            | Self::SetLayer { scene_id, .. } => scene_id,
        }
    }
}

/// Apply `edit` to `project`, returning the inverse edit.
pub fn apply_edit(project: &mut Project, edit: &SceneEdit) -> AnimataResult<SceneEdit> {
    let scene = project
        .scene_mut(edit.scene_id())
        .ok_or_else(|| AnimataError::validation(format!("unknown scene '{}'", edit.scene_id())))?;

    match edit {
        SceneEdit::AddElement { scene_id, element } => {
            if scene.element(&element.id).is_some() {
                return Err(AnimataError::validation(format!(
                    "element id '{}' already exists in scene '{scene_id}'",
                    element.id
                )));
            }
            scene.elements.push(element.clone());
            Ok(SceneEdit::RemoveElement {
                scene_id: scene_id.clone(),
                element_id: element.id.clone(),
            })
        }
        SceneEdit::RemoveElement {
            scene_id,
            element_id,
        } => {
            let idx = scene
                .elements
                .iter()
                .position(|e| e.id == *element_id)
                .ok_or_else(|| {
                    AnimataError::validation(format!(
                        "unknown element '{element_id}' in scene '{scene_id}'"
                    ))
                })?;
            let removed = scene.elements.remove(idx);
            Ok(SceneEdit::AddElement {
                scene_id: scene_id.clone(),
                element: removed,
            })
        }
        SceneEdit::UpdateElement { scene_id, element } => {
            let slot = scene.element_mut(&element.id).ok_or_else(|| {
                AnimataError::validation(format!(
                    "unknown element '{}' in scene '{scene_id}'",
                    element.id
                ))
            })?;
            let previous = std::mem::replace(slot, element.clone());
            Ok(SceneEdit::UpdateElement {
                scene_id: scene_id.clone(),
                element: previous,
            })
        }
        SceneEdit::SetLayer {
            scene_id,
            element_id,
            layer,
        } => {
            let el = scene.element_mut(element_id).ok_or_else(|| {
                AnimataError::validation(format!(
                    "unknown element '{element_id}' in scene '{scene_id}'"
                ))
            })?;
            let previous = el.layer;
            el.layer = *layer;
            Ok(SceneEdit::SetLayer {
                scene_id: scene_id.clone(),
                element_id: element_id.clone(),
                layer: previous,
            })
        }
    }
}

/// Undo/redo stacks of inverse edits.
#[derive(Debug, Default)]
pub struct EditLog {
    undo: Vec<SceneEdit>,
    redo: Vec<SceneEdit>,
}

impl EditLog {
    pub fn record(&mut self, inverse: SceneEdit) {
        self.undo.push(inverse);
        self.redo.clear();
    }

    pub fn pop_undo(&mut self) -> Option<SceneEdit> {
        self.undo.pop()
    }

    pub fn push_redo(&mut self, inverse: SceneEdit) {
        self.redo.push(inverse);
    }

    pub fn pop_redo(&mut self) -> Option<SceneEdit> {
        self.redo.pop()
    }

    pub fn push_undo_from_redo(&mut self, inverse: SceneEdit) {
        self.undo.push(inverse);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}
