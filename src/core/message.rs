use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::ChatMessage;

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Separator placed between user turns that are folded into one.
const USER_TURN_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => ROLE_SYSTEM,
            Role::User => ROLE_USER,
            Role::Assistant => ROLE_ASSISTANT,
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            ROLE_SYSTEM => Ok(Role::System),
            ROLE_USER => Ok(Role::User),
            ROLE_ASSISTANT => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}

/// Fold every run of consecutive user turns into a single turn.
///
/// Context-injection commands (shell output, loaded files) push user turns
/// ahead of the actual question, and several providers reject adjacent
/// same-role turns. Runs are joined with a blank line and take the position of
/// the first turn in the run. System and assistant turns pass through as-is and
/// are never merged with each other. The input is left untouched.
pub fn normalize(messages: &[Message]) -> Vec<Message> {
    if messages.len() <= 1 {
        return messages.to_vec();
    }

    let mut normalized: Vec<Message> = Vec::with_capacity(messages.len());
    let mut pending_user: Vec<&str> = Vec::new();

    for message in messages {
        if message.role.is_user() {
            pending_user.push(&message.content);
            continue;
        }
        flush_user_run(&mut normalized, &mut pending_user);
        normalized.push(message.clone());
    }
    flush_user_run(&mut normalized, &mut pending_user);

    normalized
}

fn flush_user_run(normalized: &mut Vec<Message>, pending: &mut Vec<&str>) {
    if pending.is_empty() {
        return;
    }
    normalized.push(Message::user(pending.join(USER_TURN_SEPARATOR)));
    pending.clear();
}
