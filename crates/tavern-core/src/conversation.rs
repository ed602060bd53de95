//! Client-side message list with in-place editing.
//!
//! Each message is either displayed or being edited, and at most one is being
//! edited at a time. Nothing here touches the network; the list is sent as-is
//! on the next submission.

use crate::parser::parse_content;
use crate::state::{ChatRole, ChatTurn};

#[derive(Debug, Clone, PartialEq, Eq)]
struct EditSession {
    index: usize,
    buffer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
    editing: Option<EditSession>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ChatTurn>) -> Self {
        Self {
            turns,
            editing: None,
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChatTurn> {
        self.turns.get(index)
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Append streamed text to the trailing assistant turn, starting one if
    /// the conversation doesn't end with an assistant turn yet.
    pub fn append_assistant_text(&mut self, text: &str) {
        match self.turns.last_mut() {
            Some(turn) if turn.role == ChatRole::Assistant => turn.content.push_str(text),
            _ => self.turns.push(ChatTurn::assistant(text)),
        }
    }

    /// Index of the message currently being edited
    pub fn editing_index(&self) -> Option<usize> {
        self.editing.as_ref().map(|e| e.index)
    }

    pub fn is_editing(&self, index: usize) -> bool {
        self.editing_index() == Some(index)
    }

    pub fn edit_buffer(&self) -> Option<&str> {
        self.editing.as_ref().map(|e| e.buffer.as_str())
    }

    pub fn edit_buffer_mut(&mut self) -> Option<&mut String> {
        self.editing.as_mut().map(|e| &mut e.buffer)
    }

    /// display → editing. Seeds the edit buffer with the message's display
    /// text, replacing any other edit in progress. Any reasoning block is not
    /// part of the buffer, so saving drops it.
    pub fn start_edit(&mut self, index: usize) -> bool {
        match self.turns.get(index) {
            Some(turn) => {
                self.editing = Some(EditSession {
                    index,
                    buffer: parse_content(&turn.content).display_text,
                });
                true
            }
            None => false,
        }
    }

    /// editing → display, committing the buffer over the old content.
    /// Returns the index that was saved.
    pub fn save_edit(&mut self) -> Option<usize> {
        let session = self.editing.take()?;
        let turn = self.turns.get_mut(session.index)?;
        turn.content = session.buffer;
        Some(session.index)
    }

    /// editing → display, discarding the buffer
    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Remove a message by position; later messages shift down by one.
    pub fn delete(&mut self, index: usize) -> Option<ChatTurn> {
        if index >= self.turns.len() {
            return None;
        }

        if let Some(editing) = self.editing_index() {
            if editing == index {
                self.editing = None;
            } else if let Some(session) = self.editing.as_mut().filter(|_| editing > index) {
                session.index -= 1;
            }
        }

        Some(self.turns.remove(index))
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.editing = None;
    }
}
