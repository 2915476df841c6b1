/// Credential checks and player registration.
pub mod auth_service;
/// Message builders and audience fan-out.
pub mod broadcast;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Public read-only scoreboard.
pub mod public_service;
/// Serialized handling of every client message.
pub mod quiz_service;
/// Adjudication and score changes, persisted before they are committed.
pub mod scoring_service;
/// Storage connection supervisor and degraded mode.
pub mod storage_supervisor;
/// WebSocket connection lifecycle.
pub mod websocket_service;
