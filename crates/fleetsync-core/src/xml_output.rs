use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::sink::{PublishError, RecordSink};
use crate::timestamps::PublishTimestamps;
use crate::types::EquipmentRecord;

/// Writes the snapshot to a single XML file, replacing whatever was there before.
#[derive(Debug, Clone)]
pub struct XmlFileSink {
    path: PathBuf,
}

impl XmlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for XmlFileSink {
    fn publish(
        &mut self,
        records: &[EquipmentRecord],
        timestamps: &PublishTimestamps,
    ) -> Result<(), PublishError> {
        let document = render_document(records, timestamps);
        std::fs::write(&self.path, document).map_err(|source| PublishError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), count = records.len(), "Wrote XML snapshot");
        Ok(())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

/// Renders the full document. The layout has no whitespace between elements, which
/// downstream consumers rely on.
pub fn render_document(records: &[EquipmentRecord], timestamps: &PublishTimestamps) -> String {
    let mut out = String::from(r#"<?xml version="1.0"?><data><vehicles>"#);

    for record in records {
        let _ = write!(
            out,
            "<vehicle><name>{}</name><hours>{}</hours><kms>{}</kms></vehicle>",
            escape_text(&record.name),
            record.hours_display(),
            record.km_display(),
        );
    }

    let _ = write!(
        out,
        "</vehicles><updated>{}</updated><googletime_updated>{}</googletime_updated></data>",
        timestamps.updated_iso8601(),
        timestamps.day_number_display(),
    );

    out
}

fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
