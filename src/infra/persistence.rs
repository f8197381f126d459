//! Persistence sink for offline population tooling. The live request path
//! never writes here; the `populate` command flattens aggregated events and
//! hands them to an [`EventSink`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::common::error::Result;
use crate::common::types::SourcedEvent;
use crate::observability::metrics;

/// A denormalized event row, one per line in the JSONL sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatEventRecord {
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_time: String,
    pub venue_name: String,
    pub venue_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub category: String,
    pub price: String,
    pub image_url: Option<String>,
    pub ticket_url: Option<String>,
    pub source: String,
    pub external_id: String,
    pub organizer_name: String,
    pub attendees_count: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlatEventRecord {
    pub fn from_sourced(sourced: &SourcedEvent, now: DateTime<Utc>) -> Self {
        let event = &sourced.event;
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            event_date: event.date.clone(),
            event_time: event.time.clone(),
            venue_name: event.location.clone(),
            venue_address: event.address.clone(),
            latitude: event.coordinates.map(|c| c.lat),
            longitude: event.coordinates.map(|c| c.lng),
            category: event.category.to_string(),
            price: event.price.clone(),
            image_url: event.image_url.clone(),
            ticket_url: event.ticket_links.first().map(|t| t.link.clone()),
            source: sourced.source.provider.clone(),
            external_id: sourced.source.original_id.clone(),
            organizer_name: event.organizer.name.clone(),
            attendees_count: event.attendees,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Write-only sink accepting flattened event records.
pub trait EventSink {
    fn write_records(&mut self, records: &[FlatEventRecord]) -> Result<usize>;
}

/// Appends one JSON document per line to a file.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl EventSink for JsonlSink {
    fn write_records(&mut self, records: &[FlatEventRecord]) -> Result<usize> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        for record in records {
            let line = serde_json::to_string(record)?;
            writeln!(file, "{}", line)?;
        }

        metrics::sink::records_written(records.len() as u64);
        info!(
            path = %self.path.display(),
            count = records.len(),
            "wrote event records to sink"
        );
        Ok(records.len())
    }
}
