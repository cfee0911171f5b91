use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AgendaId, VoteChoice, VoteId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgendaRequest {
    pub name: String,
    #[serde(default)]
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub associate: String,
    pub choice: VoteChoice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaSummary {
    pub agenda_id: AgendaId,
    pub name: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaResult {
    pub agenda_id: AgendaId,
    pub name: String,
    pub duration_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    pub is_open: bool,
    pub positive_votes: u64,
    pub negative_votes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotePayload {
    pub vote_id: VoteId,
    pub agenda_id: AgendaId,
    pub associate: String,
    pub choice: VoteChoice,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteTally {
    pub positive_votes: u64,
    pub negative_votes: u64,
}
