//! Match registry.
//!
//! Holds the two waiting queues, the session record of every waiting
//! participant and the history of pairings. All of it lives behind one
//! `tokio::sync::Mutex`, so a scan and the mutation that follows it are a
//! single critical section. Nothing in here performs I/O.
//!
//! # Invariants
//!
//! - A participant is in at most one queue, at most once.
//! - A participant has a session record iff it is waiting.
//! - No unordered pair is ever recorded twice.
//! - A participant holding a reservation is in no queue and cannot be
//!   matched by anyone.
//!
//! # Reservations
//!
//! `try_match` finding nobody leaves the requester reserved until the caller
//! either `enqueue`s it or `release`s it. A `remove` during that window
//! cancels the reservation, and the later `enqueue` is refused.

use crate::errors::BrokerError;
use chrono::{DateTime, Utc};
use common::types::{ParticipantId, Role, SessionId};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// The provider session a waiting participant is sitting in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of [`MatchRegistry::try_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    /// Paired with `partner`, who has left the queue. `session` is the
    /// partner's consumed record; `None` means registry state was corrupt.
    Matched {
        partner: ParticipantId,
        session: Option<SessionRecord>,
    },
    /// Nobody eligible is waiting.
    Unmatched,
}

/// Unordered participant pair, stored with the smaller id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MatchPair(pub ParticipantId, pub ParticipantId);

impl MatchPair {
    pub fn new(a: ParticipantId, b: ParticipantId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Point-in-time copy of registry contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub investors: Vec<ParticipantId>,
    pub ideas: Vec<ParticipantId>,
    /// In the order the pairs were recorded.
    pub history: Vec<MatchPair>,
    pub sessions: Vec<(ParticipantId, SessionRecord)>,
}

/// Queue depths and history size, for gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub investors_waiting: usize,
    pub ideas_waiting: usize,
    pub pairs_recorded: usize,
}

/// Requester between `try_match` and `enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reservation {
    Open,
    /// Left the queue before its session was ready.
    Cancelled,
}

#[derive(Debug, Default)]
struct RegistryState {
    investors: VecDeque<ParticipantId>,
    ideas: VecDeque<ParticipantId>,
    /// Authoritative record of who is waiting and in which queue.
    membership: HashMap<ParticipantId, Role>,
    sessions: HashMap<ParticipantId, SessionRecord>,
    history: HashSet<MatchPair>,
    history_order: Vec<MatchPair>,
    reservations: HashMap<ParticipantId, Reservation>,
}

impl RegistryState {
    fn queue(&self, role: Role) -> &VecDeque<ParticipantId> {
        match role {
            Role::Investor => &self.investors,
            Role::Idea => &self.ideas,
        }
    }

    fn queue_mut(&mut self, role: Role) -> &mut VecDeque<ParticipantId> {
        match role {
            Role::Investor => &mut self.investors,
            Role::Idea => &mut self.ideas,
        }
    }

    /// Drop `id` from its queue and membership. Returns its session record.
    fn take(&mut self, id: ParticipantId) -> Option<Option<SessionRecord>> {
        let role = self.membership.remove(&id)?;
        self.queue_mut(role).retain(|waiting| *waiting != id);
        Some(self.sessions.remove(&id))
    }

    fn stats(&self) -> RegistryStats {
        RegistryStats {
            investors_waiting: self.investors.len(),
            ideas_waiting: self.ideas.len(),
            pairs_recorded: self.history_order.len(),
        }
    }
}

/// Waiting queues, session table and pairing history.
#[derive(Debug, Default)]
pub struct MatchRegistry {
    state: Mutex<RegistryState>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `requester` with the oldest eligible participant of the opposite
    /// role.
    ///
    /// Eligible means the two have never been paired. On success the pair is
    /// recorded and the partner leaves its queue, handing back its session
    /// record. The requester is never enqueued here.
    ///
    /// # Errors
    ///
    /// `BrokerError::Conflict` if the requester is already waiting or holds a
    /// reservation.
    #[instrument(skip_all, fields(participant_id = %requester, role = %role))]
    pub async fn try_match(
        &self,
        requester: ParticipantId,
        role: Role,
    ) -> Result<MatchResult, BrokerError> {
        let mut state = self.state.lock().await;

        if state.membership.contains_key(&requester)
            || state.reservations.contains_key(&requester)
        {
            return Err(BrokerError::Conflict(
                "Participant is already waiting".to_string(),
            ));
        }

        let candidate = state
            .queue(role.opposite())
            .iter()
            .copied()
            .find(|waiting| !state.history.contains(&MatchPair::new(requester, *waiting)));

        let Some(partner) = candidate else {
            state.reservations.insert(requester, Reservation::Open);
            debug!(target: "broker.services.match_registry", "No eligible partner waiting");
            return Ok(MatchResult::Unmatched);
        };

        let pair = MatchPair::new(requester, partner);
        state.history.insert(pair);
        state.history_order.push(pair);
        let session = state.take(partner).flatten();

        debug!(
            target: "broker.services.match_registry",
            partner_id = %partner,
            "Matched with waiting participant"
        );

        Ok(MatchResult::Matched { partner, session })
    }

    /// Append `id` to its role's queue and store its session record.
    ///
    /// Consumes the reservation taken by `try_match`, if any.
    ///
    /// # Errors
    ///
    /// `BrokerError::Conflict` if `id` is already waiting, or if it left the
    /// queue while its reservation was open. The record is dropped.
    #[instrument(skip_all, fields(participant_id = %id, role = %role))]
    pub async fn enqueue(
        &self,
        id: ParticipantId,
        role: Role,
        record: SessionRecord,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;

        if state.membership.contains_key(&id) {
            return Err(BrokerError::Conflict(
                "Participant is already waiting".to_string(),
            ));
        }

        if state.reservations.remove(&id) == Some(Reservation::Cancelled) {
            debug!(target: "broker.services.match_registry", "Reservation was cancelled");
            return Err(BrokerError::Conflict(
                "Participant left the queue before its session was ready".to_string(),
            ));
        }

        state.membership.insert(id, role);
        state.queue_mut(role).push_back(id);
        state.sessions.insert(id, record);

        debug!(target: "broker.services.match_registry", "Participant queued");
        Ok(())
    }

    /// Take `id` out of whichever queue holds it and drop its session record.
    /// An open reservation is cancelled instead.
    ///
    /// Returns `false` if it was neither waiting nor reserved. History is
    /// untouched.
    #[instrument(skip_all, fields(participant_id = %id))]
    pub async fn remove(&self, id: ParticipantId) -> bool {
        let mut state = self.state.lock().await;
        let removed = if state.take(id).is_some() {
            true
        } else if let Some(reservation) = state.reservations.get_mut(&id) {
            let was_open = *reservation == Reservation::Open;
            *reservation = Reservation::Cancelled;
            was_open
        } else {
            false
        };
        debug!(target: "broker.services.match_registry", removed, "Participant left queue");
        removed
    }

    /// Drop the reservation of a requester that will not be enqueued.
    pub async fn release(&self, id: ParticipantId) {
        self.state.lock().await.reservations.remove(&id);
    }

    /// Queued, not merely reserved.
    pub async fn is_waiting(&self, id: ParticipantId) -> bool {
        self.state.lock().await.membership.contains_key(&id)
    }

    /// Whether `a` and `b` have ever been paired, in either order.
    pub async fn has_matched(&self, a: ParticipantId, b: ParticipantId) -> bool {
        self.state
            .lock()
            .await
            .history
            .contains(&MatchPair::new(a, b))
    }

    /// Session record of a waiting participant.
    pub async fn session_of(&self, id: ParticipantId) -> Option<SessionRecord> {
        self.state.lock().await.sessions.get(&id).cloned()
    }

    pub async fn stats(&self) -> RegistryStats {
        self.state.lock().await.stats()
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;

        // Session table in queue order so output is stable
        let sessions = state
            .investors
            .iter()
            .chain(state.ideas.iter())
            .filter_map(|id| state.sessions.get(id).map(|record| (*id, record.clone())))
            .collect();

        QueueSnapshot {
            investors: state.investors.iter().copied().collect(),
            ideas: state.ideas.iter().copied().collect(),
            history: state.history_order.clone(),
            sessions,
        }
    }
}
