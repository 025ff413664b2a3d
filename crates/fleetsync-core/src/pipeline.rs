use tracing::info;

use crate::equipment::EquipmentSource;
use crate::error::Result;
use crate::sink::RecordSink;
use crate::timestamps::PublishTimestamps;

/// Outcome of one successful sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub record_count: usize,
    pub destination: String,
    pub updated: String,
}

/// Fetches the full snapshot, then hands it to the sink in one piece.
///
/// Nothing is published unless the fetch (including per-entry validation) succeeds.
pub fn run_sync(
    source: &dyn EquipmentSource,
    sink: &mut dyn RecordSink,
    timestamps: &PublishTimestamps,
) -> Result<SyncSummary> {
    let records = source.fetch_equipment()?;
    let destination = sink.destination();

    sink.publish(&records, timestamps)?;
    info!(count = records.len(), destination = %destination, "Snapshot published");

    Ok(SyncSummary {
        record_count: records.len(),
        destination,
        updated: timestamps.updated_iso8601(),
    })
}
