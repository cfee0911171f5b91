use chrono::{DateTime, Duration, Utc};
use shared::{
    domain::{AgendaId, DEFAULT_DURATION_MINUTES},
    error::{ApiError, ErrorCode},
    protocol::{AgendaResult, AgendaSummary},
};
use storage::StoredAgenda;
use tracing::{info, warn};

use crate::{internal, vote, ApiContext};

pub async fn create_agenda(
    ctx: &ApiContext,
    name: &str,
    duration_minutes: i64,
) -> Result<AgendaSummary, ApiError> {
    info!(name, "creating agenda");
    let duration_minutes = if duration_minutes <= 0 {
        DEFAULT_DURATION_MINUTES
    } else {
        duration_minutes
    };

    let Some(agenda) = ctx
        .storage
        .insert_agenda(name, duration_minutes)
        .await
        .map_err(internal)?
    else {
        warn!(name, "agenda name already exists");
        return Err(ApiError::new(
            ErrorCode::AgendaAlreadyExists,
            "an agenda with this name already exists",
        ));
    };

    Ok(AgendaSummary {
        agenda_id: agenda.agenda_id,
        name: agenda.name,
        duration_minutes: agenda.duration_minutes,
    })
}

pub async fn open_agenda(ctx: &ApiContext, agenda_id: AgendaId) -> Result<(), ApiError> {
    let agenda = require_agenda(ctx, agenda_id).await?;
    let now = Utc::now();

    if agenda_is_open(&agenda, now) {
        warn!(agenda_id = agenda_id.0, "agenda is already open");
        return Err(already_open());
    }
    if agenda.start_time.is_some() {
        warn!(agenda_id = agenda_id.0, "agenda has already been closed");
        return Err(ApiError::new(
            ErrorCode::AgendaAlreadyClosed,
            "agenda has already been closed",
        ));
    }

    // The conditional write is the authoritative guard; the checks above
    // only pick which error to report.
    let started = ctx
        .storage
        .start_agenda(agenda_id, now)
        .await
        .map_err(internal)?;
    if !started {
        warn!(agenda_id = agenda_id.0, "agenda was opened by a concurrent caller");
        return Err(already_open());
    }

    info!(agenda_id = agenda_id.0, "agenda opened");
    Ok(())
}

pub async fn get_agenda(ctx: &ApiContext, agenda_id: AgendaId) -> Result<AgendaResult, ApiError> {
    let agenda = require_agenda(ctx, agenda_id).await?;
    let tally = vote::tally_votes(ctx, agenda_id).await?;
    let is_open = agenda_is_open(&agenda, Utc::now());

    Ok(AgendaResult {
        agenda_id: agenda.agenda_id,
        name: agenda.name,
        duration_minutes: agenda.duration_minutes,
        start_time: agenda.start_time,
        is_open,
        positive_votes: tally.positive_votes,
        negative_votes: tally.negative_votes,
    })
}

/// An agenda is open iff it has been started and `now` still falls inside
/// the half-open window [start_time, start_time + duration_minutes).
pub fn agenda_is_open(agenda: &StoredAgenda, now: DateTime<Utc>) -> bool {
    match agenda.start_time {
        Some(start) => now < start + Duration::minutes(agenda.duration_minutes),
        None => false,
    }
}

pub(crate) async fn require_agenda(
    ctx: &ApiContext,
    agenda_id: AgendaId,
) -> Result<StoredAgenda, ApiError> {
    let agenda = ctx
        .storage
        .find_agenda(agenda_id)
        .await
        .map_err(internal)?;
    agenda.ok_or_else(|| {
        warn!(agenda_id = agenda_id.0, "agenda not found");
        ApiError::new(ErrorCode::AgendaNotFound, "agenda not found")
    })
}

fn already_open() -> ApiError {
    ApiError::new(ErrorCode::AgendaAlreadyOpen, "agenda is already open")
}

#[cfg(test)]
#[path = "tests/agenda_tests.rs"]
mod tests;
