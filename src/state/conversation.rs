use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use crate::dao::models::ActorId;

/// What the next free-form message of a user means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    /// Admin is in the live panel; messages become live events.
    InPanel,
    /// Next message names the given map.
    RenamingMap { map_number: u32 },
    /// Next message is the MVP line of the given map.
    AwaitingMvp { map_number: u32 },
}

impl ConversationState {
    /// Every non-idle state implies the admin panel is open.
    pub fn in_panel(self) -> bool {
        self != ConversationState::Idle
    }
}

/// Session-scoped per-user conversation state.
#[derive(Debug, Default)]
pub struct Conversations {
    states: DashMap<ActorId, ConversationState>,
    conflict_warned: AtomicBool,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `actor`, `Idle` when unknown.
    pub fn get(&self, actor: ActorId) -> ConversationState {
        self.states
            .get(&actor)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Replace the state of `actor`; `Idle` forgets it.
    pub fn set(&self, actor: ActorId, state: ConversationState) {
        if state == ConversationState::Idle {
            self.states.remove(&actor);
        } else {
            self.states.insert(actor, state);
        }
    }

    /// Return a prompt state (rename or MVP) to the plain panel state.
    pub fn settle(&self, actor: ActorId) {
        if let Some(mut entry) = self.states.get_mut(&actor) {
            *entry = ConversationState::InPanel;
        }
    }

    /// Move every admin waiting for an MVP line of `map_number` back to the panel.
    pub fn settle_mvp_prompts(&self, map_number: u32) {
        for mut entry in self.states.iter_mut() {
            if *entry.value() == (ConversationState::AwaitingMvp { map_number }) {
                *entry.value_mut() = ConversationState::InPanel;
            }
        }
    }

    /// Admins with the live panel open.
    pub fn panel_admins(&self) -> Vec<ActorId> {
        let mut admins: Vec<_> = self
            .states
            .iter()
            .filter(|entry| entry.value().in_panel())
            .map(|entry| *entry.key())
            .collect();
        admins.sort_unstable();
        admins
    }

    /// True exactly once until the next [`Conversations::clear_all`].
    pub fn claim_conflict_warning(&self) -> bool {
        !self.conflict_warned.swap(true, Ordering::SeqCst)
    }

    /// Forget every conversation and the conflict warning.
    pub fn clear_all(&self) {
        self.states.clear();
        self.conflict_warned.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_is_the_default_and_is_not_stored() {
        let conversations = Conversations::new();
        assert_eq!(conversations.get(1), ConversationState::Idle);
        conversations.set(1, ConversationState::InPanel);
        conversations.set(1, ConversationState::Idle);
        assert!(conversations.panel_admins().is_empty());
    }

    #[test]
    fn settling_returns_prompts_to_the_panel() {
        let conversations = Conversations::new();
        conversations.set(1, ConversationState::AwaitingMvp { map_number: 2 });
        conversations.set(2, ConversationState::RenamingMap { map_number: 2 });
        conversations.set(3, ConversationState::AwaitingMvp { map_number: 1 });

        conversations.settle_mvp_prompts(2);
        conversations.settle(2);

        assert_eq!(conversations.get(1), ConversationState::InPanel);
        assert_eq!(conversations.get(2), ConversationState::InPanel);
        assert_eq!(
            conversations.get(3),
            ConversationState::AwaitingMvp { map_number: 1 }
        );
        assert_eq!(conversations.panel_admins(), [1, 2, 3]);
    }

    #[test]
    fn conflict_warning_fires_once_per_session() {
        let conversations = Conversations::new();
        assert!(conversations.claim_conflict_warning());
        assert!(!conversations.claim_conflict_warning());
        conversations.clear_all();
        assert!(conversations.claim_conflict_warning());
    }
}
