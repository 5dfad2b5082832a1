pub mod conversation;
pub mod registry;
pub mod state_machine;
pub mod transitions;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::{Mutex, MutexGuard, RwLock, watch};
use tracing::warn;

use crate::{
    config::AppConfig,
    dao::{live_store::LiveMatchStore, match_records::MatchRecordStore},
    error::ServiceError,
    services::{
        admins::{AdminDirectory, AllowList},
        broadcast::SpectatorBroadcast,
        notifier::Notifier,
        sse_service::SseNotifier,
        status_projector::StatusProjector,
    },
};

use self::{
    conversation::Conversations,
    registry::SessionRegistry,
    state_machine::{LiveStage, PanelEvent, PanelPhase, PanelStateMachine},
};
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

/// Shared application state handle.
pub type SharedState = Arc<AppState>;

/// Proof that the caller holds the command gate. Every mutating command runs under one.
pub type CommandTurn<'a> = MutexGuard<'a, ()>;

/// Central application state: stores, the live session gate and the delivery fabric.
pub struct AppState {
    config: AppConfig,
    live_store: Arc<dyn LiveMatchStore>,
    records: Arc<dyn MatchRecordStore>,
    projector: StatusProjector,
    registry: SessionRegistry,
    panel: RwLock<PanelStateMachine>,
    conversations: Conversations,
    broadcast: SpectatorBroadcast,
    sse: Arc<SseNotifier>,
    admins: Arc<dyn AdminDirectory>,
    degraded: watch::Sender<bool>,
    command_gate: Mutex<()>,
    recovered: AtomicBool,
}

impl AppState {
    /// Build the state with SSE delivery. Must be called from within a tokio runtime.
    pub fn new(
        config: AppConfig,
        live_store: Arc<dyn LiveMatchStore>,
        records: Arc<dyn MatchRecordStore>,
    ) -> SharedState {
        let sse = Arc::new(SseNotifier::new(config.sse_buffer));
        Self::build(config, live_store, records, sse.clone(), sse)
    }

    /// Build the state with a custom delivery channel; SSE streams stay available but the
    /// broadcast goes through `notifier`.
    pub fn with_notifier(
        config: AppConfig,
        live_store: Arc<dyn LiveMatchStore>,
        records: Arc<dyn MatchRecordStore>,
        notifier: Arc<dyn Notifier>,
    ) -> SharedState {
        let sse = Arc::new(SseNotifier::new(config.sse_buffer));
        Self::build(config, live_store, records, sse, notifier)
    }

    fn build(
        config: AppConfig,
        live_store: Arc<dyn LiveMatchStore>,
        records: Arc<dyn MatchRecordStore>,
        sse: Arc<SseNotifier>,
        notifier: Arc<dyn Notifier>,
    ) -> SharedState {
        let (degraded, _rx) = watch::channel(false);
        let admins = Arc::new(AllowList::new(config.admin_ids.iter().copied()));
        Arc::new(Self {
            projector: StatusProjector::new(records.clone()),
            config,
            live_store,
            records,
            registry: SessionRegistry::new(),
            panel: RwLock::new(PanelStateMachine::new()),
            conversations: Conversations::new(),
            broadcast: SpectatorBroadcast::spawn(notifier),
            sse,
            admins,
            degraded,
            command_gate: Mutex::new(()),
            recovered: AtomicBool::new(false),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Store holding one live document per match.
    pub fn live_store(&self) -> &Arc<dyn LiveMatchStore> {
        &self.live_store
    }

    /// Relational match records.
    pub fn records(&self) -> &Arc<dyn MatchRecordStore> {
        &self.records
    }

    pub fn projector(&self) -> &StatusProjector {
        &self.projector
    }

    /// Gate of the single live session.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Per-user conversation states.
    pub fn conversations(&self) -> &Conversations {
        &self.conversations
    }

    pub fn broadcast(&self) -> &SpectatorBroadcast {
        &self.broadcast
    }

    /// Per-recipient SSE channels.
    pub fn sse(&self) -> &Arc<SseNotifier> {
        &self.sse
    }

    /// Admin allow-list.
    pub fn admins(&self) -> &dyn AdminDirectory {
        self.admins.as_ref()
    }

    /// Wait for exclusive access to the live session.
    pub async fn command_turn(&self) -> CommandTurn<'_> {
        self.command_gate.lock().await
    }

    /// Current live stage, `None` while no session is open.
    pub async fn panel_stage(&self) -> Option<LiveStage> {
        self.panel.read().await.stage()
    }

    /// Snapshot of the panel state machine.
    pub async fn snapshot(&self) -> Snapshot {
        self.panel.read().await.snapshot()
    }

    /// Mark startup reconciliation as done; commands are refused until then.
    pub fn mark_recovered(&self) {
        self.recovered.store(true, Ordering::SeqCst);
    }

    /// Refuse work until startup reconciliation has run.
    pub fn ensure_recovered(&self) -> Result<(), ServiceError> {
        if self.recovered.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ServiceError::InvalidState(
                "session recovery has not completed yet".into(),
            ))
        }
    }

    /// Fail fast while a store is flagged unhealthy.
    pub fn ensure_available(&self) -> Result<(), ServiceError> {
        if self.is_degraded() {
            Err(ServiceError::Degraded)
        } else {
            Ok(())
        }
    }

    /// Whether a store is currently flagged unhealthy.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag; returns whether it changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    async fn plan_transition(&self, event: PanelEvent) -> Result<Plan, PlanError> {
        self.panel.write().await.plan(event)
    }

    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<PanelPhase, ApplyError> {
        self.panel.write().await.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        self.panel.write().await.abort(plan_id)
    }

    /// Plan `event`, run `work`, then apply the plan on success or abort it on failure.
    pub async fn run_transition<F, Fut, T>(
        &self,
        _turn: &CommandTurn<'_>,
        event: PanelEvent,
        work: F,
    ) -> Result<(T, PanelPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let Plan { id: plan_id, .. } = self.plan_transition(event).await?;

        match work().await {
            Ok(value) => {
                let next = self.apply_planned_transition(plan_id).await?;
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{
        live_store::memory::MemoryLiveStore, match_records::memory::MemoryMatchRecords,
    };

    fn state() -> SharedState {
        AppState::new(
            AppConfig::default(),
            Arc::new(MemoryLiveStore::new()),
            Arc::new(MemoryMatchRecords::new()),
        )
    }

    #[tokio::test]
    async fn failed_work_leaves_the_panel_untouched() {
        let state = state();
        let turn = state.command_turn().await;

        let result: Result<((), PanelPhase), _> = state
            .run_transition(&turn, PanelEvent::SessionOpened(LiveStage::Scoring), || async {
                Err(ServiceError::InvalidInput("boom".into()))
            })
            .await;
        assert!(result.is_err());

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.phase, PanelPhase::Idle);
        assert_eq!(snapshot.pending, None);
    }

    #[tokio::test]
    async fn successful_work_applies_the_transition() {
        let state = state();
        let turn = state.command_turn().await;

        let (value, next) = state
            .run_transition(&turn, PanelEvent::SessionOpened(LiveStage::Scoring), || async {
                Ok(7)
            })
            .await
            .expect("transition");
        assert_eq!(value, 7);
        assert_eq!(next, PanelPhase::Live(LiveStage::Scoring));
        assert_eq!(state.snapshot().await.version, 1);
    }

    #[tokio::test]
    async fn degraded_flag_only_reports_changes() {
        let state = state();
        assert!(state.ensure_available().is_ok());
        assert!(state.update_degraded(true));
        assert!(!state.update_degraded(true));
        assert!(matches!(state.ensure_available(), Err(ServiceError::Degraded)));
    }
}
