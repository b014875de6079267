use crate::AggregateId;

/// Filter and pagination for [`EventStore::query_events`](crate::EventStore::query_events).
///
/// Results are always returned in store order (timestamp, then event id);
/// `offset` and `limit` apply after filtering.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub aggregate_id: Option<AggregateId>,

    pub aggregate_type: Option<String>,

    /// Any of these event types.
    pub event_types: Option<Vec<String>>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// One page of the whole log.
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
            ..Default::default()
        }
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the envelope passes every filter of this query.
    pub(crate) fn matches(&self, event: &crate::EventEnvelope) -> bool {
        if let Some(id) = self.aggregate_id
            && event.aggregate_id != id
        {
            return false;
        }
        if let Some(ref agg_type) = self.aggregate_type
            && &event.aggregate_type != agg_type
        {
            return false;
        }
        if let Some(ref types) = self.event_types
            && !types.contains(&event.event_type)
        {
            return false;
        }
        true
    }
}
