/// Admin allow-list capability.
pub mod admins;
/// Spectator subscriber set and ordered fan-out.
pub mod broadcast;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Read-only views over finished matches.
pub mod history_service;
/// Admin command handling for the live session.
pub mod live_control;
/// Recurring promotion of matches reaching kickoff.
pub mod monitor;
/// "Send to recipient" capability.
pub mod notifier;
/// Startup reconciliation of the live session.
pub mod recovery;
/// Server-Sent Events delivery to individual recipients.
pub mod sse_service;
/// Relational status code kept in step with the live session.
pub mod status_projector;
/// Background health checks and reconnects for both stores.
pub mod storage_supervisor;
