use std::collections::{BTreeMap, HashMap, VecDeque};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

/// Entries kept per room.
pub const RING_CAPACITY: usize = 40;

/// One logged room message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub seqnum: u64,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    /// XHTML rendering when the message had one, else the plain body.
    pub rendered_body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    pub raw_text: String,
    /// Long-form product text, attached after asynchronous lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_product_text: Option<String>,
}

/// An entry before it has been assigned a sequence number.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub rendered_body: String,
    pub product_id: Option<String>,
    pub raw_text: String,
}

impl EntryDraft {
    fn into_entry(self, seqnum: u64) -> ChatLogEntry {
        ChatLogEntry {
            seqnum,
            timestamp: self.timestamp,
            author: self.author,
            rendered_body: self.rendered_body,
            product_id: self.product_id,
            raw_text: self.raw_text,
            resolved_product_text: None,
        }
    }
}

/// Fixed-capacity ring for one room, newest at index 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomLog {
    entries: VecDeque<ChatLogEntry>,
}

impl RoomLog {
    /// Insert at the head, evicting the oldest entry past capacity.
    pub fn push(&mut self, entry: ChatLogEntry) {
        self.entries.push_front(entry);
        if self.entries.len() > RING_CAPACITY {
            self.entries.pop_back();
        }
    }

    /// Insert keeping newest-first order.
    ///
    /// Returns `false` for a seqnum already present, or one older than every
    /// entry of a full ring.
    pub fn insert(&mut self, entry: ChatLogEntry) -> bool {
        let pos = self
            .entries
            .iter()
            .position(|e| e.seqnum <= entry.seqnum)
            .unwrap_or(self.entries.len());
        if pos >= RING_CAPACITY || self.entries.get(pos).is_some_and(|e| e.seqnum == entry.seqnum) {
            return false;
        }
        self.entries.insert(pos, entry);
        self.entries.truncate(RING_CAPACITY);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatLogEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ChatLogEntry> {
        self.entries.get(index)
    }

    fn get_mut_by_seqnum(&mut self, seqnum: u64) -> Option<&mut ChatLogEntry> {
        self.entries.iter_mut().find(|e| e.seqnum == seqnum)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Durable form of the whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatLogSnapshot {
    pub seqnum: u64,
    /// Per-room entries, newest first.
    pub rooms: BTreeMap<String, Vec<ChatLogEntry>>,
}

impl ChatLogSnapshot {
    /// Largest sequence number present, counter included.
    #[must_use]
    pub fn max_seqnum(&self) -> u64 {
        self.rooms
            .values()
            .flatten()
            .map(|e| e.seqnum)
            .fold(self.seqnum, u64::max)
    }
}

/// All room logs plus the shared counter.
///
/// Owned by the session loop; no interior locking.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    rooms: HashMap<String, RoomLog>,
    seqnum: u64,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment and return the counter. Shared by all rooms.
    pub fn next_seqnum(&mut self) -> u64 {
        self.seqnum += 1;
        self.seqnum
    }

    #[must_use]
    pub fn current_seqnum(&self) -> u64 {
        self.seqnum
    }

    /// Assign the next sequence number and insert into the room's ring.
    pub fn append(&mut self, room: &str, draft: EntryDraft) -> u64 {
        let seqnum = self.next_seqnum();
        self.rooms
            .entry(room.to_string())
            .or_default()
            .push(draft.into_entry(seqnum));
        debug!(room, seqnum, "chat log entry appended");
        seqnum
    }

    /// Insert under a sequence number handed out earlier by
    /// [`next_seqnum`](Self::next_seqnum). The counter is raised to `seqnum`
    /// if it is behind, never lowered.
    ///
    /// Returns `false` when the room already holds that seqnum.
    pub fn insert_at(&mut self, room: &str, seqnum: u64, draft: EntryDraft) -> bool {
        self.seqnum = self.seqnum.max(seqnum);
        let inserted = self
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(draft.into_entry(seqnum));
        if inserted {
            debug!(room, seqnum, "chat log entry inserted");
        }
        inserted
    }

    /// Entries with `seqnum > since`, newest first. Unknown rooms are empty.
    pub fn get_recent(&self, room: &str, since: u64) -> Vec<ChatLogEntry> {
        self.rooms
            .get(room)
            .map(|log| {
                log.iter()
                    .take_while(|e| e.seqnum > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn room(&self, room: &str) -> Option<&RoomLog> {
        self.rooms.get(room)
    }

    /// Attach long-form text to an entry still in the ring.
    ///
    /// Returns `false` when the entry has already been evicted.
    pub fn attach_product_text(&mut self, room: &str, seqnum: u64, text: String) -> bool {
        match self
            .rooms
            .get_mut(room)
            .and_then(|log| log.get_mut_by_seqnum(seqnum))
        {
            Some(entry) => {
                entry.resolved_product_text = Some(text);
                true
            },
            None => false,
        }
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.rooms.values().map(RoomLog::len).sum()
    }

    /// Point-in-time copy for a background write.
    pub fn snapshot(&self) -> ChatLogSnapshot {
        ChatLogSnapshot {
            seqnum: self.seqnum,
            rooms: self
                .rooms
                .iter()
                .map(|(name, log)| (name.clone(), log.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Replace the rings with a snapshot's. The counter never goes backwards:
    /// it becomes the largest of its current value, the stored counter and
    /// every stored seqnum.
    pub fn restore(&mut self, snapshot: ChatLogSnapshot) {
        self.seqnum = self.seqnum.max(snapshot.max_seqnum());
        self.rooms = snapshot
            .rooms
            .into_iter()
            .map(|(name, entries)| {
                let mut log = RoomLog::default();
                // Stored newest first; push oldest first to rebuild order.
                for entry in entries.into_iter().take(RING_CAPACITY).rev() {
                    log.push(entry);
                }
                (name, log)
            })
            .collect();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str) -> EntryDraft {
        EntryDraft {
            timestamp: Utc::now(),
            author: "dmxbot".into(),
            rendered_body: format!("<p>{text}</p>"),
            product_id: None,
            raw_text: text.into(),
        }
    }

    #[test]
    fn counter_is_shared_across_rooms() {
        let mut log = ChatLog::new();
        assert_eq!(log.append("dmxchat", draft("a")), 1);
        assert_eq!(log.append("fsdchat", draft("b")), 2);
        assert_eq!(log.next_seqnum(), 3);
        assert_eq!(log.append("dmxchat", draft("c")), 4);
        assert_eq!(log.current_seqnum(), 4);
    }

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let mut log = ChatLog::new();
        for i in 0..=RING_CAPACITY {
            log.append("dmxchat", draft(&format!("msg {i}")));
        }
        let room = log.room("dmxchat").unwrap();
        assert_eq!(room.len(), RING_CAPACITY);
        assert_eq!(room.get(0).unwrap().raw_text, format!("msg {RING_CAPACITY}"));
        assert_eq!(room.get(RING_CAPACITY - 1).unwrap().raw_text, "msg 1");
        assert!(room.iter().all(|e| e.raw_text != "msg 0"));
    }

    #[test]
    fn insert_at_reuses_one_seqnum_across_rooms() {
        let mut log = ChatLog::new();
        let seq = log.next_seqnum();
        assert!(log.insert_at("botstalk", seq, draft("a")));
        assert!(log.insert_at("dmxchat", seq, draft("a")));
        assert!(!log.insert_at("dmxchat", seq, draft("a")));
        assert_eq!(log.current_seqnum(), 1);
        assert_eq!(log.message_count(), 2);
    }

    #[test]
    fn insert_at_keeps_newest_first_when_echoes_cross() {
        let mut log = ChatLog::new();
        let first = log.next_seqnum();
        let second = log.next_seqnum();
        log.insert_at("dmxchat", second, draft("second"));
        log.insert_at("dmxchat", first, draft("first"));
        let order: Vec<u64> = log.get_recent("dmxchat", 0).iter().map(|e| e.seqnum).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(log.get_recent("dmxchat", 1).len(), 1);
    }

    #[test]
    fn insert_at_raises_counter_and_drops_stale_past_capacity() {
        let mut log = ChatLog::new();
        assert!(log.insert_at("dmxchat", 9, draft("late")));
        assert_eq!(log.current_seqnum(), 9);
        for i in 0..RING_CAPACITY {
            log.append("dmxchat", draft(&format!("m{i}")));
        }
        assert!(!log.insert_at("dmxchat", 5, draft("too old")));
        assert_eq!(log.room("dmxchat").unwrap().len(), RING_CAPACITY);
    }

    #[test]
    fn get_recent_filters_by_seqnum() {
        let mut log = ChatLog::new();
        for i in 0..5 {
            log.append("dmxchat", draft(&format!("m{i}")));
        }
        let recent = log.get_recent("dmxchat", 3);
        assert_eq!(
            recent.iter().map(|e| e.seqnum).collect::<Vec<_>>(),
            vec![5, 4]
        );
        assert_eq!(log.get_recent("dmxchat", 0).len(), 5);
        assert!(log.get_recent("nowhere", 0).is_empty());
    }

    #[test]
    fn attaches_product_text_in_place() {
        let mut log = ChatLog::new();
        let seq = log.append("dmxchat", draft("short"));
        assert!(log.attach_product_text("dmxchat", seq, "LONG FORM".into()));
        assert_eq!(
            log.room("dmxchat").unwrap().get(0).unwrap().resolved_product_text.as_deref(),
            Some("LONG FORM")
        );
        assert!(!log.attach_product_text("dmxchat", 999, "x".into()));
    }

    #[test]
    fn restore_never_regresses_counter() {
        let mut log = ChatLog::new();
        for _ in 0..7 {
            log.append("dmxchat", draft("x"));
        }
        let before = log.current_seqnum();
        let snapshot = log.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();

        let mut reloaded = ChatLog::new();
        reloaded.restore(serde_json::from_str(&json).unwrap());
        assert!(reloaded.current_seqnum() >= before);
        assert_eq!(reloaded.room("dmxchat").unwrap().get(0).unwrap().seqnum, 7);
        assert!(reloaded.next_seqnum() > before);

        // A stale snapshot with a lower counter but higher entries still wins.
        let mut stale = snapshot.clone();
        stale.seqnum = 2;
        let mut fresh = ChatLog::new();
        fresh.restore(stale);
        assert_eq!(fresh.current_seqnum(), 7);
    }
}
