use std::collections::HashSet;

use crate::dao::models::ActorId;

/// Answers whether an actor may drive the admin panel.
pub trait AdminDirectory: Send + Sync {
    fn is_admin(&self, actor: ActorId) -> bool;
}

/// Fixed allow-list loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    ids: HashSet<ActorId>,
}

impl AllowList {
    /// Allow exactly `ids`.
    pub fn new(ids: impl IntoIterator<Item = ActorId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }
}

impl AdminDirectory for AllowList {
    fn is_admin(&self, actor: ActorId) -> bool {
        self.ids.contains(&actor)
    }
}
