use std::collections::HashMap;
use std::net::IpAddr;
use super::containers::{Conversation, ConversationCount};

/// Packet counts per unordered host pair.
#[derive(Debug, Default)]
pub struct ConversationTracker {
    // Position in `counts`, which stays in first-insertion order.
    index: HashMap<Conversation, usize>,
    counts: Vec<ConversationCount>,
}

impl ConversationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, src: IpAddr, dst: IpAddr) {
        let conversation = Conversation::new(src, dst);
        match self.index.get(&conversation) {
            Some(&position) => self.counts[position].packets += 1,
            None => {
                self.index.insert(conversation, self.counts.len());
                self.counts.push(ConversationCount { conversation, packets: 1 });
            }
        }
    }

    /// The `n` busiest conversations. Ties keep first-seen order.
    pub fn top(&self, n: usize) -> Vec<ConversationCount> {
        let mut ranked = self.counts.clone();
        // sort_by is stable
        ranked.sort_by(|a, b| b.packets.cmp(&a.packets));
        ranked.truncate(n);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_both_directions_merge() {
        let mut tracker = ConversationTracker::new();
        tracker.record(ip("10.0.0.1"), ip("10.0.0.2"));
        tracker.record(ip("10.0.0.2"), ip("10.0.0.1"));

        let top = tracker.top(5);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].packets, 2);
        assert_eq!(top[0].conversation, Conversation::new(ip("10.0.0.2"), ip("10.0.0.1")));
        assert_eq!(top[0].conversation.a, ip("10.0.0.1"));
    }

    #[test]
    fn test_top_sorted_with_stable_ties() {
        let mut tracker = ConversationTracker::new();
        tracker.record(ip("10.0.0.5"), ip("10.0.0.6"));
        tracker.record(ip("10.0.0.3"), ip("10.0.0.4"));
        tracker.record(ip("10.0.0.1"), ip("10.0.0.2"));
        tracker.record(ip("10.0.0.2"), ip("10.0.0.1"));

        let top = tracker.top(3);
        assert_eq!(top[0].conversation, Conversation::new(ip("10.0.0.1"), ip("10.0.0.2")));
        assert_eq!(top[1].conversation, Conversation::new(ip("10.0.0.5"), ip("10.0.0.6")));
        assert_eq!(top[2].conversation, Conversation::new(ip("10.0.0.3"), ip("10.0.0.4")));
    }

    #[test]
    fn test_top_truncates() {
        let mut tracker = ConversationTracker::new();
        for last in 1..=8u8 {
            tracker.record(ip("10.0.0.100"), IpAddr::from([10, 0, 0, last]));
        }

        assert_eq!(tracker.top(5).len(), 5);
        assert_eq!(tracker.top(20).len(), 8);
        assert!(tracker.top(0).is_empty());
    }
}
