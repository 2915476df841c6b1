use serde::Serialize;
use utoipa::ToSchema;

/// Whether storage is reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Storage answers; every operation is available.
    Ok,
    /// Storage is unreachable; only the host and the buzzer keep working.
    Degraded,
}

/// Payload of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: HealthStatus,
    /// Number of open client connections.
    pub connected_clients: usize,
}
