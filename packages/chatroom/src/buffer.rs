use std::collections::VecDeque;

use crate::types::Message;

/// Inbound messages for the currently connected session, in arrival order.
///
/// Unbounded unless a retention cap is configured, in which case the oldest
/// messages are evicted first.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    messages: VecDeque<Message>,
    max_messages: Option<usize>,
    received: u64,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_messages(max_messages: Option<usize>) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages: max_messages.filter(|&n| n > 0),
            received: 0,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.received += 1;
        self.messages.push_back(message);
        if let Some(max) = self.max_messages {
            while self.messages.len() > max {
                self.messages.pop_front();
            }
        }
    }

    /// Drop everything; called whenever a new stream starts connecting.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.received = 0;
    }

    /// Messages appended since the last reset, including evicted ones.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    /// Owned snapshot for rendering.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }
}
