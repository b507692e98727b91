//! Conversation history owned by the turn processor.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::types::Turn;

/// Ordered history of turns.
///
/// Writers append a whole cycle's turns under one lock, so readers never see
/// a half-appended cycle.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Arc<RwLock<Vec<Turn>>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self {
            turns: Arc::new(RwLock::new(turns)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Turn>> {
        self.turns.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Turn>> {
        self.turns.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn push(&mut self, turn: Turn) {
        self.write().push(turn);
    }

    /// Append several turns as one step.
    pub fn extend(&mut self, turns: impl IntoIterator<Item = Turn>) {
        let turns: Vec<Turn> = turns.into_iter().collect();
        self.write().extend(turns);
    }

    /// Remove the last turn if it came from the assistant.
    pub fn pop_trailing_assistant(&mut self) -> Option<Turn> {
        let mut turns = self.write();
        if turns.last().is_some_and(Turn::is_assistant) {
            turns.pop()
        } else {
            None
        }
    }

    /// Replace the whole history.
    pub fn replace(&mut self, turns: Vec<Turn>) {
        *self.write() = turns;
    }

    pub fn clear(&mut self) {
        self.write().clear();
    }

    /// A read-only handle that stays valid while a turn is in flight.
    pub fn reader(&self) -> ConversationReader {
        ConversationReader {
            turns: Arc::clone(&self.turns),
        }
    }
}

/// Cheap, clonable read access to a [`Conversation`].
#[derive(Debug, Clone)]
pub struct ConversationReader {
    turns: Arc<RwLock<Vec<Turn>>>,
}

impl ConversationReader {
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.turns.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_batched_appends() {
        let mut conversation = Conversation::new();
        let reader = conversation.reader();
        conversation.push(Turn::user("hi"));
        conversation.extend([Turn::assistant("call"), Turn::user("result")]);
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.snapshot()[2].text, "result");
    }

    #[test]
    fn pops_only_assistant_turns() {
        let mut conversation = Conversation::from_turns(vec![Turn::user("q")]);
        assert!(conversation.pop_trailing_assistant().is_none());
        conversation.push(Turn::assistant("partial"));
        assert_eq!(
            conversation.pop_trailing_assistant().map(|t| t.text),
            Some("partial".to_string())
        );
        assert_eq!(conversation.len(), 1);
    }
}
