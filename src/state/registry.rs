use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::dao::models::MatchId;

/// Outcome of an attempt to make a match the live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The match is now the active session.
    Claimed,
    /// The match already was the active session.
    AlreadyActive,
    /// Another match holds the slot.
    Busy(MatchId),
    /// The match ended earlier in this process and cannot go live again.
    Retired,
}

#[derive(Debug, Default)]
struct RegistryState {
    active: Option<MatchId>,
    retired: HashSet<MatchId>,
}

/// Single gate recording which match, if any, is live.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<RegistryState>,
}

impl SessionRegistry {
    /// Registry with no active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-set of the active slot.
    pub async fn claim(&self, match_id: MatchId) -> Claim {
        let mut state = self.inner.lock().await;
        if state.retired.contains(&match_id) {
            return Claim::Retired;
        }
        match state.active {
            Some(active) if active == match_id => Claim::AlreadyActive,
            Some(active) => Claim::Busy(active),
            None => {
                state.active = Some(match_id);
                Claim::Claimed
            }
        }
    }

    /// Succeeds only when no session is active and the match was never retired.
    pub async fn try_set_active(&self, match_id: MatchId) -> bool {
        self.claim(match_id).await == Claim::Claimed
    }

    /// End the active session; its id is retired for the rest of the process lifetime.
    pub async fn clear(&self) -> Option<MatchId> {
        let mut state = self.inner.lock().await;
        let ended = state.active.take();
        if let Some(match_id) = ended {
            state.retired.insert(match_id);
        }
        ended
    }

    /// Give the slot back after a failed promotion, without retiring the id.
    pub async fn release(&self, match_id: MatchId) {
        let mut state = self.inner.lock().await;
        if state.active == Some(match_id) {
            state.active = None;
        }
    }

    /// Empty the slot without retiring anything.
    pub async fn reset(&self) {
        self.inner.lock().await.active = None;
    }

    /// Mark a match as ended without it ever having been active here.
    pub async fn retire(&self, match_id: MatchId) {
        let mut state = self.inner.lock().await;
        if state.active == Some(match_id) {
            state.active = None;
        }
        state.retired.insert(match_id);
    }

    /// Whether `match_id` holds the active slot.
    pub async fn is_active(&self, match_id: MatchId) -> bool {
        self.inner.lock().await.active == Some(match_id)
    }

    /// Identifier of the active session, if any.
    pub async fn active(&self) -> Option<MatchId> {
        self.inner.lock().await.active
    }

    /// Whether `match_id` ended during this process lifetime.
    pub async fn is_retired(&self, match_id: MatchId) -> bool {
        self.inner.lock().await.retired.contains(&match_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn only_one_match_can_be_active() {
        let registry = SessionRegistry::new();
        assert!(registry.try_set_active(1).await);
        assert_eq!(registry.claim(2).await, Claim::Busy(1));
        assert_eq!(registry.claim(1).await, Claim::AlreadyActive);
        assert!(registry.is_active(1).await);
        assert!(!registry.is_active(2).await);
    }

    #[tokio::test]
    async fn cleared_match_cannot_come_back() {
        let registry = SessionRegistry::new();
        assert!(registry.try_set_active(1).await);
        assert_eq!(registry.clear().await, Some(1));
        assert_eq!(registry.active().await, None);
        assert_eq!(registry.claim(1).await, Claim::Retired);
        assert!(registry.try_set_active(2).await);
    }

    #[tokio::test]
    async fn release_keeps_the_id_eligible() {
        let registry = SessionRegistry::new();
        assert!(registry.try_set_active(4).await);
        registry.release(4).await;
        assert!(!registry.is_retired(4).await);
        assert!(registry.try_set_active(4).await);
    }

    #[tokio::test]
    async fn concurrent_claims_elect_a_single_winner() {
        let registry = Arc::new(SessionRegistry::new());
        let handles: Vec<_> = (1..=16)
            .map(|id| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.try_set_active(id).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.expect("join") {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(registry.active().await.is_some());
    }
}
