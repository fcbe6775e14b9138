use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::chat::{ChatMessage, DecodeError};
use super::time_format::TimeFormatter;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("history replay aborted at line {line} after {rendered} message(s): {source}")]
    ReplayAborted {
        line: usize,
        rendered: usize,
        #[source]
        source: DecodeError,
    },
}

/// What to do with a history line that does not decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryPolicy {
    /// Stop at the first bad line; earlier lines stay rendered.
    #[default]
    AbortBatch,
    /// Log and skip bad lines, render the rest.
    SkipMalformed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub rendered: usize,
    pub skipped: usize,
}

/// One line of the feed as the viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub time_label: String,
    pub user: String,
    pub text: String,
    /// Authored by the viewer, judged against the user field when rendered.
    pub is_mine: bool,
}

/// Append-only list of rendered chat messages, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MessageFeed {
    items: Vec<RenderedMessage>,
    formatter: TimeFormatter,
    policy: HistoryPolicy,
    scroll_to_latest: bool,
}

impl MessageFeed {
    pub fn new(formatter: TimeFormatter, policy: HistoryPolicy) -> Self {
        Self {
            items: Vec::new(),
            formatter,
            policy,
            scroll_to_latest: false,
        }
    }

    pub fn items(&self) -> &[RenderedMessage] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true once after any append, then resets.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_latest)
    }

    pub fn render_message(&mut self, current_user: &str, msg: ChatMessage) {
        let time_label = self.formatter.format(&msg.timestamp);
        let is_mine = msg.user == current_user;

        self.items.push(RenderedMessage {
            time_label,
            user: msg.user,
            text: msg.text,
            is_mine,
        });
        self.scroll_to_latest = true;
    }

    pub fn handle_live_message(&mut self, current_user: &str, raw: &str) -> Result<(), FeedError> {
        let msg = ChatMessage::decode(raw)?;
        self.render_message(current_user, msg);
        Ok(())
    }

    /// Render a newline-joined batch of records, oldest first.
    pub fn handle_history_replay(
        &mut self,
        current_user: &str,
        raw: Option<&str>,
    ) -> Result<ReplaySummary, FeedError> {
        let mut summary = ReplaySummary::default();
        let batch = match raw {
            Some(batch) if !batch.is_empty() => batch,
            _ => return Ok(summary),
        };

        for (index, line) in batch.split('\n').enumerate() {
            match ChatMessage::decode(line) {
                Ok(msg) => {
                    self.render_message(current_user, msg);
                    summary.rendered += 1;
                }
                Err(source) => match self.policy {
                    HistoryPolicy::AbortBatch => {
                        return Err(FeedError::ReplayAborted {
                            line: index + 1,
                            rendered: summary.rendered,
                            source,
                        });
                    }
                    HistoryPolicy::SkipMalformed => {
                        tracing::warn!("Skipping history line {}: {}", index + 1, source);
                        summary.skipped += 1;
                    }
                },
            }
        }

        Ok(summary)
    }
}
