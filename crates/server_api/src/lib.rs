pub mod agenda;
pub mod vote;

use shared::error::{ApiError, ErrorCode};
use storage::Storage;

pub use agenda::{agenda_is_open, create_agenda, get_agenda, open_agenda};
pub use vote::{cast_vote, tally_votes};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
