//! Matchmaking service.
//!
//! Composes the identity issuer, match registry and session broker into the
//! operations the HTTP layer calls. Registry decisions are made under the
//! registry lock; provider I/O happens after the lock is released. A
//! requester waiting on a new session holds a registry reservation, so a
//! concurrent leave or duplicate queue request is settled by the registry.

use crate::errors::BrokerError;
use crate::observability::metrics::{
    record_identity_issued, record_queue_leave, record_queue_outcome, set_match_history_size,
    set_queue_depth,
};
use crate::services::identity_issuer::{IdentityIssuer, Participant};
use crate::services::match_registry::{MatchPair, MatchRegistry, MatchResult, SessionRecord};
use crate::services::session_broker::{SessionBroker, SessionCredentials};
use crate::services::video_client::{BroadcastStarted, VideoClient};
use chrono::{DateTime, Utc};
use common::types::{ArchiveId, BroadcastId, ParticipantId, Role, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

/// Whether a queue request paired the participant or left it waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Matched,
    Queued,
}

/// Result of [`MatchmakingService::enqueue_or_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub credentials: SessionCredentials,
    pub status: QueueStatus,
    /// Set when `status` is `Matched`.
    pub partner: Option<ParticipantId>,
}

/// A waiting participant's session, as shown in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub participant_id: ParticipantId,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}

/// Full broker state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub roster: Vec<Participant>,
    pub investor_queue: Vec<ParticipantId>,
    pub idea_queue: Vec<ParticipantId>,
    pub history: Vec<MatchPair>,
    pub sessions: Vec<SessionEntry>,
    pub active_archives: usize,
    pub active_broadcasts: usize,
}

pub struct MatchmakingService {
    issuer: IdentityIssuer,
    registry: Arc<MatchRegistry>,
    broker: Arc<SessionBroker>,
}

impl MatchmakingService {
    pub fn new(video: Arc<dyn VideoClient>) -> Self {
        Self {
            issuer: IdentityIssuer::new(),
            registry: Arc::new(MatchRegistry::new()),
            broker: Arc::new(SessionBroker::new(video)),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.broker.provider_name()
    }

    /// Mint a new participant with the next alternating role.
    pub async fn issue_identity(&self) -> Participant {
        let participant = self.issuer.issue().await;
        record_identity_issued(participant.role);
        participant
    }

    /// Pair `participant` with a waiting counterpart, or queue it on a new
    /// session.
    ///
    /// # Errors
    ///
    /// - `BadRequest` if `role` contradicts the role the id was issued with
    /// - `Conflict` if the participant is already waiting or queueing, or
    ///   left the queue while its session was being created
    /// - `Provider` if a new session could not be created; nothing is queued
    /// - `SessionNotFound` if the matched partner had no session record
    #[instrument(skip_all, fields(participant_id = %participant, role = %role))]
    pub async fn enqueue_or_match(
        &self,
        participant: ParticipantId,
        role: Role,
    ) -> Result<MatchOutcome, BrokerError> {
        let result = self.match_or_queue(participant, role).await;

        let outcome_label = match &result {
            Ok(outcome) if outcome.status == QueueStatus::Matched => "matched",
            Ok(_) => "queued",
            Err(_) => "error",
        };
        record_queue_outcome(role, outcome_label);
        self.publish_gauges().await;

        result
    }

    async fn match_or_queue(
        &self,
        participant: ParticipantId,
        role: Role,
    ) -> Result<MatchOutcome, BrokerError> {
        if let Some(issued) = self.issuer.role_of(participant).await {
            if issued != role {
                return Err(BrokerError::BadRequest(format!(
                    "Participant was issued role {issued}, not {role}"
                )));
            }
        }

        match self.registry.try_match(participant, role).await? {
            MatchResult::Matched { partner, session } => {
                let credentials = self.broker.resolve_for_match(partner, session)?;
                info!(
                    target: "broker.services.matchmaking",
                    partner_id = %partner,
                    session_id = %credentials.session_id,
                    "Participant matched"
                );
                Ok(MatchOutcome {
                    credentials,
                    status: QueueStatus::Matched,
                    partner: Some(partner),
                })
            }
            MatchResult::Unmatched => {
                // Runs to completion even if the request is dropped, so the
                // reservation is always settled
                let registry = Arc::clone(&self.registry);
                let broker = Arc::clone(&self.broker);
                let credentials = tokio::spawn(
                    async move { open_session(&broker, &registry, participant, role).await }
                        .in_current_span(),
                )
                .await
                .map_err(|e| {
                    error!(
                        target: "broker.services.matchmaking",
                        error = %e,
                        "Session setup task failed"
                    );
                    BrokerError::Internal
                })??;
                info!(
                    target: "broker.services.matchmaking",
                    session_id = %credentials.session_id,
                    "Participant queued"
                );
                Ok(MatchOutcome {
                    credentials,
                    status: QueueStatus::Queued,
                    partner: None,
                })
            }
        }
    }

    /// Take a participant out of the waiting queue.
    ///
    /// Returns whether it was waiting, or queueing on a session still being
    /// created. Pairing history is kept.
    #[instrument(skip_all, fields(participant_id = %participant))]
    pub async fn leave_queue(&self, participant: ParticipantId) -> bool {
        let removed = self.registry.remove(participant).await;
        if !removed {
            warn!(target: "broker.services.matchmaking", "Leave requested for participant not waiting");
        }
        record_queue_leave(removed);
        self.publish_gauges().await;
        removed
    }

    pub async fn start_recording(&self, session_id: &SessionId) -> Result<ArchiveId, BrokerError> {
        require_session_id(session_id)?;
        self.broker.start_archive(session_id).await
    }

    pub async fn stop_recording(&self, session_id: &SessionId) -> Result<ArchiveId, BrokerError> {
        require_session_id(session_id)?;
        self.broker.stop_archive(session_id).await
    }

    pub async fn start_streaming(
        &self,
        session_id: &SessionId,
    ) -> Result<BroadcastStarted, BrokerError> {
        require_session_id(session_id)?;
        self.broker.start_broadcast(session_id).await
    }

    pub async fn stop_streaming(&self, session_id: &SessionId) -> Result<BroadcastId, BrokerError> {
        require_session_id(session_id)?;
        self.broker.stop_broadcast(session_id).await
    }

    pub async fn snapshot(&self) -> RegistrySnapshot {
        let roster = self.issuer.roster().await;
        let queues = self.registry.snapshot().await;
        let (active_archives, active_broadcasts) = self.broker.active_counts().await;

        RegistrySnapshot {
            roster,
            investor_queue: queues.investors,
            idea_queue: queues.ideas,
            history: queues.history,
            sessions: queues
                .sessions
                .into_iter()
                .map(|(participant_id, SessionRecord { session_id, created_at })| SessionEntry {
                    participant_id,
                    session_id,
                    created_at,
                })
                .collect(),
            active_archives,
            active_broadcasts,
        }
    }

    async fn publish_gauges(&self) {
        let stats = self.registry.stats().await;
        set_queue_depth(stats.investors_waiting, stats.ideas_waiting);
        set_match_history_size(stats.pairs_recorded);
    }
}

/// Create a session for a reserved requester and queue it there.
async fn open_session(
    broker: &SessionBroker,
    registry: &MatchRegistry,
    participant: ParticipantId,
    role: Role,
) -> Result<SessionCredentials, BrokerError> {
    let (credentials, record) = match broker.create_session(participant).await {
        Ok(created) => created,
        Err(e) => {
            registry.release(participant).await;
            return Err(e);
        }
    };

    if let Err(e) = registry.enqueue(participant, role, record).await {
        info!(
            target: "broker.services.matchmaking",
            session_id = %credentials.session_id,
            "Participant not queued, new session discarded"
        );
        return Err(e);
    }

    Ok(credentials)
}

fn require_session_id(session_id: &SessionId) -> Result<(), BrokerError> {
    if session_id.as_str().trim().is_empty() {
        return Err(BrokerError::BadRequest("sessionId is required".to_string()));
    }
    Ok(())
}
