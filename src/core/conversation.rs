use crate::core::message::{Message, Role};

/// Chronological turn history for one chat session, headed by the system
/// prompt.
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: String,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            messages: vec![Message::system(system_prompt.clone())],
            system_prompt,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Drop the most recent turn if it is a user turn. Used when a request is
    /// interrupted before any reply arrived.
    pub fn discard_last_user(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(message) if message.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    /// Forget every turn except the system prompt.
    pub fn clear(&mut self) {
        self.messages.truncate(0);
        self.messages.push(Message::system(self.system_prompt.clone()));
    }

    /// Number of turns after the system prompt.
    pub fn turn_count(&self) -> usize {
        self.messages.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_system_prompt() {
        let conversation = Conversation::new("be brief");
        assert_eq!(conversation.messages(), &[Message::system("be brief")]);
        assert_eq!(conversation.turn_count(), 0);
    }

    #[test]
    fn discard_only_removes_trailing_user_turn() {
        let mut conversation = Conversation::new("sys");
        conversation.push_user("question");
        assert_eq!(
            conversation.discard_last_user(),
            Some(Message::user("question"))
        );

        conversation.push_user("again");
        conversation.push_assistant("answer");
        assert_eq!(conversation.discard_last_user(), None);
        assert_eq!(conversation.turn_count(), 2);
    }

    #[test]
    fn clear_keeps_system_prompt() {
        let mut conversation = Conversation::new("sys");
        conversation.push_user("a");
        conversation.push_assistant("b");
        conversation.clear();
        assert_eq!(conversation.messages(), &[Message::system("sys")]);
    }
}
