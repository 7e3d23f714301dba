//! Request and response bodies for the broker's HTTP API.
//!
//! Field names are camelCase to stay compatible with existing browser
//! clients.

use common::types::{ArchiveId, BroadcastId, ParticipantId, Role, SessionId};
use serde::{Deserialize, Serialize};

use crate::services::QueueStatus;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status ("healthy").
    pub status: String,

    /// Video provider in use ("opentok" or "mock").
    pub provider: String,
}

/// Response to `GET /newUser`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserResponse {
    pub user_id: ParticipantId,
    pub user_role: Role,
}

/// Body of `POST /queue`.
///
/// Kept as raw strings so malformed values get a broker error body rather
/// than a framework rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    pub user_id: String,
    pub user_role: String,
}

/// Response to `POST /queue`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResponse {
    pub api_key: String,
    pub session_id: SessionId,
    pub token: String,
    pub status: QueueStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<ParticipantId>,
}

/// Body of `POST /queue/leave`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub user_id: String,
}

/// Response to `POST /queue/leave`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub user_id: ParticipantId,
    /// False when the participant was not waiting.
    pub removed: bool,
}

/// Body of the archive and broadcast endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
}

/// Response to `POST /archive/start` and `POST /archive/stop`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    pub session_id: SessionId,
    pub archive_id: ArchiveId,
}

/// Response to `POST /broadcast/start`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastStartResponse {
    pub session_id: SessionId,
    pub broadcast_id: BroadcastId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_url: Option<String>,
}

/// Response to `POST /broadcast/stop`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastStopResponse {
    pub session_id: SessionId,
    pub broadcast_id: BroadcastId,
}
