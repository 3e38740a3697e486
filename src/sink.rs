//! Durable persistence of accumulated records.
//!
//! Both tables are rewritten in full at every flush, so a crash or
//! interrupt costs at most the rows since the last checkpoint.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::OutputConfig;
use crate::records::{ExtractionSession, BASIC_HEADERS};

pub trait RecordSink {
    fn flush(&mut self, session: &ExtractionSession) -> Result<()>;
}

pub struct CsvSink {
    basic_path: PathBuf,
    detailed_path: PathBuf,
}

impl CsvSink {
    pub fn new(output: &OutputConfig) -> Self {
        CsvSink {
            basic_path: PathBuf::from(&output.basic_csv),
            detailed_path: PathBuf::from(&output.detailed_csv),
        }
    }
}

impl RecordSink for CsvSink {
    fn flush(&mut self, session: &ExtractionSession) -> Result<()> {
        if session.basic.is_empty() && session.detailed.is_empty() {
            log::info!("nothing to flush yet");
            return Ok(());
        }

        if !session.basic.is_empty() {
            let mut writer = csv::Writer::from_path(&self.basic_path)
                .context(format!("Failed to open {:?}", self.basic_path))?;
            writer.write_record(BASIC_HEADERS)?;
            for record in &session.basic {
                writer.write_record(record.fields())?;
            }
            writer.flush()?;
            log::info!(
                "Basic table rewritten: {} records -> {:?}",
                session.basic.len(),
                self.basic_path
            );
        }

        if !session.detailed.is_empty() {
            // Dynamic union of every column seen so far; a record missing
            // a column renders as an empty cell.
            let columns: BTreeSet<&str> = session
                .detailed
                .iter()
                .flat_map(|record| record.nutrients.keys().map(String::as_str))
                .collect();

            let mut writer = csv::Writer::from_path(&self.detailed_path)
                .context(format!("Failed to open {:?}", self.detailed_path))?;

            let header: Vec<&str> = BASIC_HEADERS
                .iter()
                .copied()
                .chain(columns.iter().copied())
                .collect();
            writer.write_record(&header)?;

            for record in &session.detailed {
                let mut fields: Vec<&str> = record.basic.fields().to_vec();
                for column in &columns {
                    fields.push(
                        record
                            .nutrients
                            .get(*column)
                            .map(String::as_str)
                            .unwrap_or(""),
                    );
                }
                writer.write_record(&fields)?;
            }
            writer.flush()?;
            log::info!(
                "Detailed table rewritten: {} records, {} nutrient columns -> {:?}",
                session.detailed.len(),
                columns.len(),
                self.detailed_path
            );
        }

        Ok(())
    }
}
