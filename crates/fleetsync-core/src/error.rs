// crates/fleetsync-core/src/error.rs

use thiserror::Error;

use crate::equipment::FetchError;
use crate::sink::PublishError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Equipment fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Publishing failed: {0}")]
    Publish(#[from] PublishError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
