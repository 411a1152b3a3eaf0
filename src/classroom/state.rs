use serde::{Deserialize, Serialize};

use super::participant::Participant;
use crate::error::{ClassroomError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhiteboardMode {
    Off,
    On,
}

impl Default for WhiteboardMode {
    fn default() -> Self {
        Self::Off
    }
}

/// Read-only copy of the shared classroom state, safe to hand to any
/// joining connection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomState {
    pub current_slide_index: usize,
    pub total_slides: usize,
    pub slide_set: Vec<Slide>,
    pub is_teacher_present: bool,
    pub participants: Vec<Participant>,
    pub whiteboard_mode: WhiteboardMode,
    pub whiteboard_content: Option<serde_json::Value>,
}

/// Owner of the process-wide [`ClassroomState`].
///
/// Mutations here perform no permission checks; callers gate them by role.
/// Every method leaves the state consistent on return:
/// `slide_set.len() == total_slides`, the current index is in range (or 0),
/// and whiteboard content only exists while the whiteboard is on.
#[derive(Debug, Default)]
pub struct ClassroomStore {
    state: ClassroomState,
}

impl ClassroomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_snapshot(&self) -> ClassroomState {
        self.state.clone()
    }

    /// Replace the slide deck with one produced by the conversion pipeline.
    /// Slides are re-indexed by position and the view returns to the first one.
    pub fn apply_slide_set(&mut self, slides: Vec<Slide>) -> usize {
        let slide_set: Vec<Slide> = slides
            .into_iter()
            .enumerate()
            .map(|(index, slide)| Slide { index, ..slide })
            .collect();

        self.state.total_slides = slide_set.len();
        self.state.slide_set = slide_set;
        self.state.current_slide_index = 0;
        self.state.total_slides
    }

    pub fn set_current_slide(&mut self, index: i64) -> Result<usize> {
        let total = self.state.total_slides;
        let index = usize::try_from(index)
            .ok()
            .filter(|index| *index < total)
            .ok_or(ClassroomError::OutOfRange { index, total })?;

        self.state.current_slide_index = index;
        Ok(index)
    }

    /// Switching the whiteboard off also drops its content.
    pub fn set_whiteboard_mode(&mut self, mode: WhiteboardMode) {
        self.state.whiteboard_mode = mode;
        if mode == WhiteboardMode::Off {
            self.state.whiteboard_content = None;
        }
    }

    pub fn set_whiteboard_content(&mut self, content: serde_json::Value) -> Result<()> {
        if self.state.whiteboard_mode == WhiteboardMode::Off {
            return Err(ClassroomError::WhiteboardInactive);
        }
        self.state.whiteboard_content = Some(content);
        Ok(())
    }

    pub fn clear_whiteboard(&mut self) {
        self.state.whiteboard_content = None;
    }

    /// Recompute the roster and teacher flag from the live registry snapshot.
    pub fn sync_roster(&mut self, participants: Vec<Participant>) {
        self.state.is_teacher_present = participants.iter().any(|p| p.role.is_teacher());
        self.state.participants = participants;
    }

    /// Drop the teacher-scoped part of the session in one step.
    pub fn reset_for_teacher_departure(&mut self) {
        self.state = ClassroomState {
            is_teacher_present: self.state.is_teacher_present,
            participants: std::mem::take(&mut self.state.participants),
            ..ClassroomState::default()
        };
    }

    pub fn current_slide_index(&self) -> usize {
        self.state.current_slide_index
    }

    pub fn total_slides(&self) -> usize {
        self.state.total_slides
    }

    pub fn whiteboard_mode(&self) -> WhiteboardMode {
        self.state.whiteboard_mode
    }

    pub fn whiteboard_content(&self) -> Option<&serde_json::Value> {
        self.state.whiteboard_content.as_ref()
    }

    pub fn is_teacher_present(&self) -> bool {
        self.state.is_teacher_present
    }

    pub fn participants(&self) -> &[Participant] {
        &self.state.participants
    }
}
