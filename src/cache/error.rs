use thiserror::Error;

use crate::dispatch::shard::DispatchError;
use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to load from backing store: {0}")]
    LoadFailure(#[source] GatewayError),

    #[error("failed to persist to backing store: {0}")]
    PersistFailure(#[source] GatewayError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl CacheError {
    pub fn is_load_failure(&self) -> bool {
        matches!(self, CacheError::LoadFailure(_))
    }

    pub fn is_persist_failure(&self) -> bool {
        matches!(self, CacheError::PersistFailure(_))
    }
}
