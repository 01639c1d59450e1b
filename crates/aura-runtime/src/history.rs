use aura_core::{Message, Role};

/// Rolling conversation history of finished exchanges.
///
/// Only the user's original words and the final reply are kept; tool traffic
/// and recipe hints stay inside the turn that produced them. After trimming,
/// the first entry is always a user message.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: Vec<Message>,
    max_exchanges: usize,
}

impl ConversationHistory {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            entries: vec![],
            max_exchanges,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Append one finished exchange and trim.
    pub fn push_exchange(&mut self, user_input: &str, reply: &str) {
        self.entries.push(Message::user(user_input));
        self.entries.push(Message::assistant(reply));
        self.trim();
    }

    /// Hard cap on stored messages.
    fn max_messages(&self) -> usize {
        self.max_exchanges * 2
    }

    /// Once over the cap, cut back to three quarters of it, starting at the
    /// first user message inside the kept window. With no such message, keep
    /// the last `max_messages` and drop any leading non-user entries.
    fn trim(&mut self) {
        let max = self.max_messages();
        if self.entries.len() <= max {
            return;
        }
        let target = max * 3 / 4;
        let window_start = self.entries.len() - target;
        let cut = self.entries[window_start..]
            .iter()
            .position(|m| m.role == Role::User)
            .map(|offset| window_start + offset)
            .unwrap_or_else(|| {
                let tail = self.entries.len() - max;
                self.entries[tail..]
                    .iter()
                    .position(|m| m.role == Role::User)
                    .map_or(self.entries.len(), |offset| tail + offset)
            });
        self.entries.drain(..cut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_cap_keeps_everything() {
        let mut h = ConversationHistory::new(20);
        for i in 0..20 {
            h.push_exchange(&format!("q{i}"), &format!("a{i}"));
        }
        assert_eq!(h.len(), 40);
        assert_eq!(h.messages()[0].text(), "q0");
    }

    #[test]
    fn test_trim_cuts_to_three_quarters_at_user_boundary() {
        let mut h = ConversationHistory::new(20);
        for i in 0..21 {
            h.push_exchange(&format!("q{i}"), &format!("a{i}"));
        }
        // 42 messages > 40, cut to the last 30.
        assert_eq!(h.len(), 30);
        assert_eq!(h.messages()[0].role, Role::User);
        assert_eq!(h.messages()[0].text(), "q6");
        assert_eq!(h.messages().last().unwrap().text(), "a20");
    }

    #[test]
    fn test_trim_always_starts_with_user() {
        for max in 1..8 {
            let mut h = ConversationHistory::new(max);
            for i in 0..50 {
                h.push_exchange(&format!("q{i}"), &format!("a{i}"));
                assert!(h.len() <= max * 2);
                assert_eq!(h.messages()[0].role, Role::User, "max={max} i={i}");
            }
        }
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut h = ConversationHistory::new(0);
        h.push_exchange("q", "a");
        assert!(h.is_empty());
    }
}
