/// Answer ledger commands.
pub mod answer_service;
/// Battle lifecycle commands and projections.
pub mod battle_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Group registration and join-code resolution.
pub mod group_service;
/// Health check service.
pub mod health_service;
/// Round auto-close timers.
pub mod round_timer;
/// Scoring engine committing round outcomes.
pub mod scoring;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
