//! Raw telemetry file loading

use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::RawEvent;

/// Read raw events from a CSV file with a header row
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<RawEvent>> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    parse_events(file)
}

/// Parse raw events from any CSV source
///
/// Empty cells become nulls; a cell that is not a number aborts the load.
pub fn parse_events<R: Read>(source: R) -> Result<Vec<RawEvent>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut events = Vec::new();
    for (index, row) in reader.deserialize().enumerate() {
        let event: RawEvent = row.map_err(|e| Error::Parse {
            record: index + 1,
            message: e.to_string(),
        })?;
        events.push(event);
    }
    Ok(events)
}
