use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;

use crate::domain::{ChannelId, Utterance};

/// Per-channel bounded conversation log used as generation context.
///
/// Logs are created lazily on the first append and evict oldest-first once full.
#[derive(Debug)]
pub struct ConversationMemory {
    capacity: Option<usize>,
    logs: Mutex<HashMap<ChannelId, VecDeque<Utterance>>>,
}

impl ConversationMemory {
    /// `None` keeps every utterance for the process lifetime.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            logs: Mutex::new(HashMap::new()),
        }
    }

    pub async fn append(&self, channel: ChannelId, utterance: Utterance) {
        if self.capacity == Some(0) {
            return;
        }

        let mut logs = self.logs.lock().await;
        let log = logs.entry(channel).or_default();
        if let Some(cap) = self.capacity {
            while log.len() >= cap {
                log.pop_front();
            }
        }
        log.push_back(utterance);
    }

    /// Oldest-first copy of a channel's log. Unknown channels yield an empty log
    /// and are not created.
    pub async fn snapshot(&self, channel: ChannelId) -> Vec<Utterance> {
        let logs = self.logs.lock().await;
        logs.get(&channel)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn len(&self, channel: ChannelId) -> usize {
        self.logs
            .lock()
            .await
            .get(&channel)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRef;
    use chrono::Utc;

    fn said(text: &str) -> Utterance {
        Utterance::user(UserRef::new(7, "ana"), text, Utc::now())
    }

    #[tokio::test]
    async fn keeps_only_the_newest_entries() {
        let mem = ConversationMemory::new(Some(3));
        let ch = ChannelId(1);
        for text in ["a", "b", "c", "d", "e"] {
            mem.append(ch, said(text)).await;
        }

        let texts: Vec<String> = mem.snapshot(ch).await.into_iter().map(|u| u.text).collect();
        assert_eq!(texts, vec!["c", "d", "e"]);
    }

    #[tokio::test]
    async fn unknown_channel_is_empty_and_not_created() {
        let mem = ConversationMemory::new(Some(3));
        assert!(mem.snapshot(ChannelId(42)).await.is_empty());
        assert!(mem.logs.lock().await.is_empty());
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let mem = ConversationMemory::new(Some(2));
        mem.append(ChannelId(1), said("one")).await;
        mem.append(ChannelId(2), said("two")).await;
        mem.append(ChannelId(2), Utterance::assistant("reply", Utc::now()))
            .await;

        assert_eq!(mem.len(ChannelId(1)).await, 1);
        let two = mem.snapshot(ChannelId(2)).await;
        assert_eq!(two.len(), 2);
        assert_eq!(two[1].text, "reply");
    }

    #[tokio::test]
    async fn unbounded_memory_keeps_everything() {
        let mem = ConversationMemory::new(None);
        for i in 0..100 {
            mem.append(ChannelId(1), said(&i.to_string())).await;
        }
        assert_eq!(mem.len(ChannelId(1)).await, 100);
    }
}
