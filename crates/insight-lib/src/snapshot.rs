//! Aggregate table snapshots
//!
//! Flat CSV files whose columns are the `_`-joined [`AggregateRecord`]
//! field names (`cpu_utilization_mean`, `cost_usd_sum`, ...).

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::models::AggregateRecord;

/// Write the aggregate table, creating parent directories as needed
pub fn write_snapshot(records: &[AggregateRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;

    info!(
        path = %path.display(),
        records = records.len(),
        "Aggregate snapshot written"
    );
    Ok(())
}

/// Load an aggregate table previously written by [`write_snapshot`]
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Vec<AggregateRecord>> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut records = Vec::new();
    for (index, row) in reader.deserialize().enumerate() {
        let record: AggregateRecord = row.map_err(|e| Error::Parse {
            record: index + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}
