//! CSV encoding of the canonical price tables and the lagged feature dataset

use crate::domain::errors::PipelineError;
use crate::domain::market::{PriceTable, RawFrame};
use crate::domain::ml::FeatureFrame;
use chrono::SecondsFormat;

pub const PRICE_TABLE_COLUMNS: [&str; 7] =
    ["timestamp", "open", "high", "low", "close", "volume", "trades"];

pub fn encode_price_table(table: &PriceTable) -> Result<Vec<u8>, PipelineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(PRICE_TABLE_COLUMNS)?;

    for row in table.rows() {
        writer.write_record([
            row.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            row.open.to_string(),
            row.high.to_string(),
            row.low.to_string(),
            row.close.to_string(),
            row.volume.map(|v| v.to_string()).unwrap_or_default(),
            row.trades.map(|t| t.to_string()).unwrap_or_default(),
        ])?;
    }

    into_bytes(writer)
}

/// Only rows with a known target are written: the dataset is training input
pub fn encode_feature_dataset(frame: &FeatureFrame) -> Result<Vec<u8>, PipelineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = Vec::with_capacity(frame.width() + 2);
    header.push("timestamp".to_string());
    header.extend(frame.feature_names.iter().cloned());
    header.push(frame.target_name.clone());
    writer.write_record(&header)?;

    for ((ts, row), target) in frame
        .timestamps
        .iter()
        .zip(frame.rows.iter())
        .zip(frame.targets.iter())
    {
        let Some(target) = target else { continue };
        let mut record = Vec::with_capacity(header.len());
        record.push(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        record.extend(row.iter().map(|v| v.to_string()));
        record.push(target.to_string());
        writer.write_record(&record)?;
    }

    into_bytes(writer)
}

fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, PipelineError> {
    writer
        .into_inner()
        .map_err(|e| PipelineError::pipeline(format!("CSV flush failed: {}", e)))
}

/// Reads any headed CSV into an untyped frame
pub fn decode_frame(bytes: &[u8]) -> Result<RawFrame, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    Ok(RawFrame::new(columns, rows))
}
