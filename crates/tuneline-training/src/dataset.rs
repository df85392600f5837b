use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex sha256 over the serialized conversations, one per line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// A two-turn (user, assistant) dialogue used both as training signal and as
/// evaluation ground truth.
///
/// Serialized as `{"messages": [{"role": "user", ...}, {"role": "assistant", ...}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationExample {
    pub messages: Vec<Message>,
}

impl ConversationExample {
    #[must_use]
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            messages: vec![
                Message { role: Role::User, content: user.into() },
                Message { role: Role::Assistant, content: assistant.into() },
            ],
        }
    }

    /// The user turn. Empty if the example is malformed.
    #[must_use]
    pub fn user(&self) -> &str {
        self.turn(0, Role::User)
    }

    /// The assistant turn. Empty if the example is malformed.
    #[must_use]
    pub fn assistant(&self) -> &str {
        self.turn(1, Role::Assistant)
    }

    fn turn(&self, idx: usize, role: Role) -> &str {
        self.messages
            .get(idx)
            .filter(|m| m.role == role)
            .map_or("", |m| m.content.as_str())
    }

    /// Exactly two turns, user then assistant, both non-empty.
    pub fn validate(&self) -> TrainingResult<()> {
        if self.messages.len() != 2 {
            return Err(TrainingError::Dataset(format!(
                "expected 2 messages, found {}",
                self.messages.len()
            )));
        }
        if self.messages[0].role != Role::User || self.messages[1].role != Role::Assistant {
            return Err(TrainingError::Dataset("messages must be user then assistant".to_string()));
        }
        for m in &self.messages {
            if m.content.trim().is_empty() {
                return Err(TrainingError::Dataset(format!("{} content is empty", m.role.as_str())));
            }
        }
        Ok(())
    }
}

pub type Dataset = Vec<ConversationExample>;

pub fn compute_dataset_id(examples: &[ConversationExample]) -> TrainingResult<DatasetId> {
    let mut digest = Sha256::new();
    for example in examples {
        digest.update(serde_json::to_vec(example)?);
        digest.update(b"\n");
    }
    Ok(DatasetId(hex::encode(digest.finalize())))
}

pub fn validate_examples(examples: &[ConversationExample]) -> TrainingResult<()> {
    if examples.is_empty() {
        return Err(TrainingError::Dataset("no conversations to train on".to_string()));
    }
    for (line, example) in examples.iter().enumerate() {
        example
            .validate()
            .map_err(|e| TrainingError::Dataset(format!("conversation {}: {e}", line + 1)))?;
    }
    Ok(())
}
