//! Ordered conversation log with a single trailing placeholder slot

use serde::{Deserialize, Serialize};

/// Who produced a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
    /// "Working…" indicator for an operation that has not settled yet
    Placeholder,
}

impl Sender {
    /// Sender name as the backend's chat history expects it
    pub fn wire_name(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "ai",
            Sender::Placeholder => "loading",
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub content: String,
    /// Logical creation order; strictly increasing along the log
    pub created_at: u64,
}

/// Chat history entry as submitted to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub sender: &'static str,
    pub message: String,
}

/// What a log mutation did, so observers can mirror it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChange {
    /// A new entry now lives at `index`
    Inserted { index: usize },
    /// The placeholder at `index` was replaced in place
    Replaced { index: usize },
    Unchanged,
}

pub const PLACEHOLDER_TEXT: &str = "Typing…";

/// Ordered message log.
///
/// At most one placeholder exists and it is always the last entry. Every
/// mutation goes through the methods below, so the invariant holds
/// regardless of call order.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
    next_seq: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the tail.
    ///
    /// While a placeholder is pending the message lands just before it.
    /// Appending a `Placeholder` sender is the same as [`Self::show_placeholder`].
    pub fn append(&mut self, sender: Sender, content: impl Into<String>) -> LogChange {
        if sender == Sender::Placeholder {
            return self.show_placeholder();
        }

        let seq = self.bump();
        let content = content.into();

        if self.has_placeholder() {
            let index = self.messages.len() - 1;
            // The placeholder moves behind the new entry, so it takes the newer sequence
            let placeholder = &mut self.messages[index];
            let message = ChatMessage {
                sender,
                content,
                created_at: placeholder.created_at,
            };
            placeholder.created_at = seq;
            self.messages.insert(index, message);
            return LogChange::Inserted { index };
        }

        self.messages.push(ChatMessage {
            sender,
            content,
            created_at: seq,
        });
        LogChange::Inserted {
            index: self.messages.len() - 1,
        }
    }

    /// Append a placeholder unless one is already at the tail
    pub fn show_placeholder(&mut self) -> LogChange {
        if self.has_placeholder() {
            return LogChange::Unchanged;
        }
        let seq = self.bump();
        self.messages.push(ChatMessage {
            sender: Sender::Placeholder,
            content: PLACEHOLDER_TEXT.to_string(),
            created_at: seq,
        });
        LogChange::Inserted {
            index: self.messages.len() - 1,
        }
    }

    /// Replace the trailing placeholder with `content`, or append it if there is none
    pub fn resolve_placeholder(&mut self, sender: Sender, content: impl Into<String>) -> LogChange {
        if sender == Sender::Placeholder {
            return self.show_placeholder();
        }
        match self.messages.last_mut() {
            Some(last) if last.sender == Sender::Placeholder => {
                last.sender = sender;
                last.content = content.into();
                LogChange::Replaced {
                    index: self.messages.len() - 1,
                }
            }
            _ => self.append(sender, content),
        }
    }

    /// Full ordered view
    pub fn all(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has_placeholder(&self) -> bool {
        self.messages
            .last()
            .is_some_and(|m| m.sender == Sender::Placeholder)
    }

    /// Chat history in the backend's `{sender, message}` shape
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.messages
            .iter()
            .map(|m| TranscriptEntry {
                sender: m.sender.wire_name(),
                message: m.content.clone(),
            })
            .collect()
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
