use std::path::PathBuf;

use thiserror::Error;

use crate::config::{Config, OutputMode};
use crate::oauth::{AuthError, Authorizer};
use crate::sheets::{SheetsClient, SheetsError, SpreadsheetSink};
use crate::timestamps::PublishTimestamps;
use crate::types::EquipmentRecord;
use crate::xml_output::XmlFileSink;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sheets(#[from] SheetsError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// A destination that receives the complete snapshot and replaces its previous contents.
pub trait RecordSink {
    fn publish(
        &mut self,
        records: &[EquipmentRecord],
        timestamps: &PublishTimestamps,
    ) -> Result<(), PublishError>;

    /// Human-readable destination, used in logs and the run summary.
    fn destination(&self) -> String;
}

/// Picks the sink for the configured output mode.
pub fn sink_for(config: &Config) -> Result<Box<dyn RecordSink>, PublishError> {
    match config.output_mode {
        OutputMode::File => Ok(Box::new(XmlFileSink::new(&config.xml_file_name))),
        OutputMode::Spreadsheet => {
            let authorizer = Authorizer::from_config(config)?;
            let client = SheetsClient::new(config)?;
            Ok(Box::new(SpreadsheetSink::new(
                client,
                authorizer,
                config.special_sheet_name.clone(),
            )))
        }
    }
}
