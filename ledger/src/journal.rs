//! Ordered, append-only notification journal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use wtt_common::{Address, Wad};

/// Capacity of the live watcher channel.
const WATCHER_CAPACITY: usize = 1024;

/// A notification emitted by a successful mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// Native value wrapped into `dst`'s balance.
    Deposit { dst: Address, wad: Wad },
    /// Token balance of `src` unwrapped back to native value.
    Withdrawal { src: Address, wad: Wad },
    /// Balance moved from `src` to `dst`.
    Transfer { src: Address, dst: Address, wad: Wad },
    /// `src` set the allowance of `guy` to `wad`.
    Approval { src: Address, guy: Address, wad: Wad },
}

impl Event {
    /// Event name as external watchers know it.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Deposit { .. } => "Deposit",
            Event::Withdrawal { .. } => "Withdrawal",
            Event::Transfer { .. } => "Transfer",
            Event::Approval { .. } => "Approval",
        }
    }

    /// Amount carried by the event.
    pub fn wad(&self) -> Wad {
        match self {
            Event::Deposit { wad, .. }
            | Event::Withdrawal { wad, .. }
            | Event::Transfer { wad, .. }
            | Event::Approval { wad, .. } => *wad,
        }
    }
}

/// A journaled event with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at zero.
    pub sequence: u64,
    /// The event.
    #[serde(flatten)]
    pub event: Event,
    /// When the event was appended.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only log of ledger notifications.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
    watchers: Option<broadcast::Sender<EventRecord>>,
}

impl EventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event and forward it to live watchers.
    pub fn append(&mut self, event: Event) -> &EventRecord {
        let record = EventRecord {
            sequence: self.records.len() as u64,
            event,
            recorded_at: Utc::now(),
        };

        if let Some(sender) = &self.watchers {
            // No receivers left is not an error for the ledger.
            let _ = sender.send(record.clone());
        }

        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    /// Subscribe to events appended from now on.
    pub fn subscribe(&mut self) -> broadcast::Receiver<EventRecord> {
        self.watchers
            .get_or_insert_with(|| broadcast::channel(WATCHER_CAPACITY).0)
            .subscribe()
    }

    /// All records in append order.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `sequence >= from`.
    pub fn since(&self, from: u64) -> &[EventRecord] {
        let start = usize::try_from(from)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
