//! Append-only store of finalized messages.

use crate::types::Message;

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop everything. Only a session reset may do this.
    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Greeting placed at the top of a fresh transcript.
pub fn welcome_message(app_name: &str, user_name: Option<&str>) -> Message {
    let content = match user_name {
        Some(name) => format!(
            "Welcome aboard, **{name}**! 🍁\n\n\
             I'm your **{app_name}**, a guide to Canada's Budget 2025.\n\n\
             I can help you explore:\n\
             - **Key investments** in housing, infrastructure, and defense\n\
             - **Tax changes** and what they mean for Canadians\n\
             - **Economic projections** and fiscal targets\n\
             - **Program details** across all government initiatives\n\n\
             What would you like to know about Budget 2025?"
        ),
        None => format!(
            "Welcome to the **{app_name}**! 🍁\n\n\
             I'm here to help you understand Canada's fiscal blueprint. What would you like to explore?"
        ),
    };
    Message::assistant(content)
}
