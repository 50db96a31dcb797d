pub mod parser;
pub mod pipeline;
pub mod telegram;

pub use telegram::TelegramDraftSource;

use async_trait::async_trait;

use crate::errors::SourceError;
use crate::models::signal::SignalDraft;

/// One fetch from the upstream feed: the drafts parsed out of it plus the
/// offset to resume from next cycle. `next_offset` equals the requested
/// offset when nothing new arrived.
#[derive(Debug, Clone)]
pub struct DraftBatch {
    pub next_offset: i64,
    pub drafts: Vec<SignalDraft>,
}

impl DraftBatch {
    pub fn empty(offset: i64) -> Self {
        Self {
            next_offset: offset,
            drafts: Vec::new(),
        }
    }
}

/// Upstream feed of signal drafts. Implementations parse whatever their
/// transport delivers and hand back only well-formed drafts; messages that
/// are not signals are silently dropped (their offset still advances).
#[async_trait]
pub trait DraftSource: Send + Sync {
    async fn fetch(&self, offset: i64) -> Result<DraftBatch, SourceError>;
}
