use std::collections::{BTreeMap, HashMap};

use shared::{
    domain::{Iti, LineId, TransportMode},
    protocol::{LineRecord, LinesResponse},
};
use tracing::warn;

use crate::{
    error::{FeedError, TrackerError},
    feed::FeedSource,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: LineId,
    pub bg_color: String,
    pub fg_color: String,
    pub mode: TransportMode,
    destinations: BTreeMap<Iti, String>,
}

impl Line {
    pub fn from_record(id: LineId, record: LineRecord) -> Self {
        let destinations = record.destinations();
        Self {
            id,
            bg_color: record.bgcolor,
            fg_color: record.fgcolor,
            mode: record.mode,
            destinations,
        }
    }

    pub fn destination(&self, iti: Iti) -> Option<&str> {
        self.destinations.get(&iti).map(String::as_str)
    }
}

/// Read-only line metadata, loaded once before any vehicle is tracked.
#[derive(Debug, Clone, Default)]
pub struct LineCatalog {
    lines: HashMap<LineId, Line>,
}

impl LineCatalog {
    pub async fn load<F>(feed: &F) -> Result<Self, FeedError>
    where
        F: FeedSource + ?Sized,
    {
        Ok(Self::from_records(feed.fetch_lines().await?))
    }

    /// Builds the catalog from the raw feed body. A record that does not
    /// decode is skipped, so only events on that line are affected.
    pub fn from_records(records: LinesResponse) -> Self {
        let mut lines = HashMap::with_capacity(records.len());
        for (id, raw) in records {
            let id = LineId::new(id);
            let record = match LineRecord::decode(raw) {
                Ok(record) => record,
                Err(err) => {
                    warn!(line = %id, %err, "catalog: skipping malformed line");
                    continue;
                }
            };
            if let Some(record_id) = record.id.as_ref().filter(|r| **r != id) {
                warn!(line = %id, %record_id, "catalog: record id differs from its key");
            }
            lines.insert(id.clone(), Line::from_record(id, record));
        }
        Self { lines }
    }

    pub fn lookup(&self, id: &LineId) -> Result<&Line, TrackerError> {
        self.lines
            .get(id)
            .ok_or_else(|| TrackerError::UnknownLine(id.clone()))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
