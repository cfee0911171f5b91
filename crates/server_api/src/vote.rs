use chrono::Utc;
use shared::{
    domain::{AgendaId, VoteChoice},
    error::{ApiError, ErrorCode},
    protocol::{VotePayload, VoteTally},
};
use tracing::{info, warn};

use crate::{agenda, internal, ApiContext};

pub async fn cast_vote(
    ctx: &ApiContext,
    agenda_id: AgendaId,
    associate: &str,
    choice: VoteChoice,
) -> Result<VotePayload, ApiError> {
    info!(agenda_id = agenda_id.0, associate, "casting vote");
    let stored_agenda = agenda::require_agenda(ctx, agenda_id).await?;

    if !agenda::agenda_is_open(&stored_agenda, Utc::now()) {
        warn!(agenda_id = agenda_id.0, associate, "agenda is not open for voting");
        return Err(ApiError::new(
            ErrorCode::AgendaClosed,
            "agenda is not open for voting",
        ));
    }

    // Early exit only; the unique index on (agenda_id, associate) decides
    // the race.
    if ctx
        .storage
        .find_vote(associate, agenda_id)
        .await
        .map_err(internal)?
        .is_some()
    {
        warn!(agenda_id = agenda_id.0, associate, "associate has already voted");
        return Err(vote_already_exists());
    }

    let Some(vote) = ctx
        .storage
        .insert_vote(agenda_id, associate, choice)
        .await
        .map_err(internal)?
    else {
        warn!(agenda_id = agenda_id.0, associate, "associate has already voted");
        return Err(vote_already_exists());
    };

    Ok(VotePayload {
        vote_id: vote.vote_id,
        agenda_id: vote.agenda_id,
        associate: vote.associate,
        choice: vote.choice,
        cast_at: vote.cast_at,
    })
}

pub async fn tally_votes(ctx: &ApiContext, agenda_id: AgendaId) -> Result<VoteTally, ApiError> {
    let votes = ctx
        .storage
        .list_votes_for_agenda(agenda_id)
        .await
        .map_err(internal)?;
    let positive_votes = votes
        .iter()
        .filter(|vote| vote.choice == VoteChoice::Affirmative)
        .count() as u64;
    let negative_votes = votes
        .iter()
        .filter(|vote| vote.choice == VoteChoice::Negative)
        .count() as u64;
    Ok(VoteTally {
        positive_votes,
        negative_votes,
    })
}

fn vote_already_exists() -> ApiError {
    ApiError::new(
        ErrorCode::VoteAlreadyExists,
        "associate has already voted on this agenda",
    )
}

#[cfg(test)]
#[path = "tests/vote_tests.rs"]
mod tests;
