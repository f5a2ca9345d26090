use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Author {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub author: Author,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Tutor conversation. Messages are only ever appended.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, author: Author, text: impl Into<String>) -> &ChatMessage {
        let id = self.messages.last().map(|m| m.id + 1).unwrap_or(1);
        self.messages.push(ChatMessage {
            id,
            author,
            text: text.into(),
            timestamp: Utc::now(),
        });
        // Just pushed, so there is a last element
        &self.messages[self.messages.len() - 1]
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.push(Author::User, text)
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) -> &ChatMessage {
        self.push(Author::Assistant, text)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.author == Author::Assistant)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_order_is_kept() {
        let mut log = ChatLog::new();
        log.push_user("What is osmosis?");
        log.push_assistant("Movement of water across a membrane.");
        log.push_user("Thanks");

        let ids: Vec<u64> = log.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(log.messages()[1].author, Author::Assistant);
        assert!(log.messages()[0].timestamp <= log.messages()[2].timestamp);
    }

    #[test]
    fn recent_returns_tail() {
        let mut log = ChatLog::new();
        for i in 0..5 {
            log.push_user(format!("m{}", i));
        }
        let tail: Vec<&str> = log.recent(2).iter().map(|m| m.text.as_str()).collect();
        assert_eq!(tail, vec!["m3", "m4"]);
        assert_eq!(log.recent(10).len(), 5);
    }

    #[test]
    fn last_assistant_skips_user_messages() {
        let mut log = ChatLog::new();
        assert!(log.last_assistant().is_none());
        log.push_assistant("hello");
        log.push_user("hi");
        assert_eq!(log.last_assistant().unwrap().text, "hello");
    }
}
