use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{parser, DraftBatch, DraftSource};
use crate::errors::SourceError;

const LONG_POLL_SECS: u64 = 20;
// Must outlast the long poll or every quiet cycle ends in a client timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);

/// Reads signal drafts from a Telegram channel via the Bot API. The stored
/// offset is the last processed `update_id`; each fetch asks for `offset + 1`
/// so Telegram keeps unconfirmed updates until the caller persists progress.
pub struct TelegramDraftSource {
    http: reqwest::Client,
    updates_url: String,
    source_chat_id: i64,
}

impl TelegramDraftSource {
    pub fn new(bot_token: &str, source_chat_id: i64) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            updates_url: format!("https://api.telegram.org/bot{}/getUpdates", bot_token),
            source_chat_id,
        }
    }

    /// Turns a page of updates into drafts. Posts from other chats, posts
    /// without text, and posts that do not parse as signals all advance the
    /// offset without producing a draft.
    fn fold_updates(&self, offset: i64, updates: Vec<Update>) -> DraftBatch {
        let mut batch = DraftBatch::empty(offset);

        for update in updates {
            batch.next_offset = batch.next_offset.max(update.update_id);

            let post = match update.channel_post.or(update.edited_channel_post) {
                Some(p) => p,
                None => continue,
            };
            if post.chat.id != self.source_chat_id {
                continue;
            }
            let text = match post.text.or(post.caption) {
                Some(t) => t,
                None => continue,
            };

            match parser::parse_signal(post.message_id, &text) {
                Some(draft) => batch.drafts.push(draft),
                None => {
                    tracing::debug!(
                        message_id = post.message_id,
                        "channel post is not a signal, skipping"
                    );
                }
            }
        }

        batch
    }
}

#[async_trait]
impl DraftSource for TelegramDraftSource {
    async fn fetch(&self, offset: i64) -> Result<DraftBatch, SourceError> {
        let body = serde_json::json!({
            "offset": offset + 1,
            "timeout": LONG_POLL_SECS,
            "allowed_updates": ["channel_post", "edited_channel_post"],
        });

        let resp: UpdatesResponse = self
            .http
            .post(&self.updates_url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !resp.ok {
            return Err(SourceError::Malformed(resp.description.unwrap_or_else(
                || "getUpdates returned ok=false without a description".to_string(),
            )));
        }

        Ok(self.fold_updates(offset, resp.result))
    }
}

// ---------------------------------------------------------------------------
// Bot API payload shapes (only the fields we read)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    description: Option<String>,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    channel_post: Option<Post>,
    edited_channel_post: Option<Post>,
}

#[derive(Debug, Deserialize)]
struct Post {
    message_id: i64,
    chat: Chat,
    text: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNAL_TEXT: &str =
        "BTC/USDT LONG\n1. Entry price: 64000\nTargets: 65000, 66000\nStop Loss: 62000";

    fn source() -> TelegramDraftSource {
        TelegramDraftSource::new("test-token", -100)
    }

    fn post(chat_id: i64, message_id: i64, text: Option<&str>, caption: Option<&str>) -> Post {
        Post {
            message_id,
            chat: Chat { id: chat_id },
            text: text.map(str::to_string),
            caption: caption.map(str::to_string),
        }
    }

    #[test]
    fn test_updates_response_shape() {
        let raw = serde_json::json!({
            "ok": true,
            "result": [{
                "update_id": 901,
                "channel_post": {
                    "message_id": 42,
                    "chat": { "id": -100, "title": "signals" },
                    "text": SIGNAL_TEXT,
                    "entities": []
                }
            }]
        });

        let resp: UpdatesResponse = serde_json::from_value(raw).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.result.len(), 1);
        assert_eq!(resp.result[0].update_id, 901);
        let post = resp.result[0].channel_post.as_ref().unwrap();
        assert_eq!(post.message_id, 42);
        assert_eq!(post.chat.id, -100);
    }

    #[test]
    fn test_fold_filters_foreign_chats_and_chatter() {
        let updates = vec![
            Update {
                update_id: 10,
                channel_post: Some(post(-100, 1, Some(SIGNAL_TEXT), None)),
                edited_channel_post: None,
            },
            Update {
                update_id: 11,
                channel_post: Some(post(-999, 2, Some(SIGNAL_TEXT), None)),
                edited_channel_post: None,
            },
            Update {
                update_id: 12,
                channel_post: Some(post(-100, 3, Some("gm everyone"), None)),
                edited_channel_post: None,
            },
        ];

        let batch = source().fold_updates(5, updates);
        assert_eq!(batch.next_offset, 12);
        assert_eq!(batch.drafts.len(), 1);
        assert_eq!(batch.drafts[0].source_message_id, 1);
    }

    #[test]
    fn test_fold_reads_captions_and_edits() {
        let updates = vec![
            Update {
                update_id: 20,
                channel_post: Some(post(-100, 4, None, Some(SIGNAL_TEXT))),
                edited_channel_post: None,
            },
            Update {
                update_id: 21,
                channel_post: None,
                edited_channel_post: Some(post(-100, 5, Some(SIGNAL_TEXT), None)),
            },
        ];

        let batch = source().fold_updates(19, updates);
        assert_eq!(batch.drafts.len(), 2);
        assert_eq!(batch.drafts[1].source_message_id, 5);
    }

    #[test]
    fn test_fold_empty_page_keeps_offset() {
        let batch = source().fold_updates(33, Vec::new());
        assert_eq!(batch.next_offset, 33);
        assert!(batch.drafts.is_empty());
    }
}
