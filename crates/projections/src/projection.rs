//! Core projection trait and position tracking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_store::{EventId, StoredEvent, VersionedEvent};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Durable cursor of one projection.
///
/// The cursor key is the store order of the last applied event:
/// `(last_timestamp, last_event_id)`. The zero state (no event id, sequence
/// 0) means nothing has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionPosition {
    pub projection_name: String,

    /// Id of the last applied event, used as the exclusive catch-up cursor.
    pub last_event_id: Option<EventId>,

    /// Store timestamp of the last applied event.
    pub last_timestamp: Option<DateTime<Utc>>,

    /// Store sequence of the last applied event. Informational only: append
    /// order and store order may disagree.
    pub last_sequence: i64,

    /// Number of events processed since the last reset.
    pub events_processed: u64,

    pub updated_at: DateTime<Utc>,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero(projection_name: impl Into<String>) -> Self {
        Self {
            projection_name: projection_name.into(),
            last_event_id: None,
            last_timestamp: None,
            last_sequence: 0,
            events_processed: 0,
            updated_at: Utc::now(),
        }
    }

    /// Advances the position past one event.
    pub fn advance(&self, event_id: EventId, timestamp: DateTime<Utc>, sequence: i64) -> Self {
        Self {
            projection_name: self.projection_name.clone(),
            last_event_id: Some(event_id),
            last_timestamp: Some(timestamp),
            last_sequence: sequence,
            events_processed: self.events_processed + 1,
            updated_at: Utc::now(),
        }
    }

    /// Returns true if the event with store key `(timestamp, event_id)` sorts
    /// at or before the cursor, i.e. catch-up has already moved past it.
    pub fn has_applied(&self, timestamp: DateTime<Utc>, event_id: EventId) -> bool {
        match (self.last_timestamp, self.last_event_id) {
            (Some(last_ts), Some(last_id)) => (timestamp, event_id) <= (last_ts, last_id),
            _ => false,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.last_event_id.is_none() && self.events_processed == 0
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.last_event_id {
            Some(id) => write!(
                f,
                "{}@{} (seq {}, {} processed)",
                self.projection_name, id, self.last_sequence, self.events_processed
            ),
            None => write!(f, "{}@start", self.projection_name),
        }
    }
}

/// What a projection did with one delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// The read model changed and the position advanced.
    Applied,

    /// The event was older than the record (or its record is missing). The
    /// position still advanced past it.
    Skipped,

    /// The event sorts at or before the stored position. Nothing changed.
    Duplicate,
}

impl Handled {
    pub fn advanced(&self) -> bool {
        !matches!(self, Handled::Duplicate)
    }
}

/// A projection that folds stored events into a read model.
///
/// Implementations must be idempotent: handling an event twice leaves the read
/// model and position as handling it once.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Event type this projection decodes the log into.
    type Event: VersionedEvent;

    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single event, updating the read model and then the position.
    async fn handle(&self, event: &StoredEvent<Self::Event>) -> Result<Handled>;

    /// Returns the current position, or the zero state if never run.
    async fn position(&self) -> Result<ProjectionPosition>;

    /// Clears the read model and resets the position to zero.
    async fn reset(&self) -> Result<()>;
}
