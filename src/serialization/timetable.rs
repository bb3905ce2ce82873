use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::network::{ExtStopId, ExtStopTime, ExtTransfer, ExtTrip};
use crate::primitives::parse_time;

/// One `stop_times`-style CSV row. Rows of a trip must be consecutive
/// and in travel order.
#[derive(Debug, Deserialize)]
struct StopTimeRow {
    trip_id: String,
    route_id: u32,
    stop_id: u32,
    arrival: String,
    departure: String,
    #[serde(default)]
    slack_class: u32,
    #[serde(default)]
    group_bit: u32,
}

#[derive(Debug, Deserialize)]
struct TransferRow {
    from_stop: u32,
    to_stop: u32,
    duration: i32,
    #[serde(default)]
    cost: i32,
}

#[derive(Debug)]
pub enum TimetableReadError {
    Csv(csv::Error),
    BadTime { row: usize, message: String },
    Empty,
}

impl From<csv::Error> for TimetableReadError {
    fn from(e: csv::Error) -> Self {
        TimetableReadError::Csv(e)
    }
}

/// Reads a demo timetable. This is tooling for the binary and the test
/// fixtures, not a data-import subsystem; validation beyond time syntax
/// happens in the network builder.
pub fn read_trips_csv(path: &Path) -> Result<Vec<ExtTrip>, TimetableReadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut trips: Vec<ExtTrip> = Vec::new();
    let mut current_id: Option<String> = None;

    for (row_idx, row) in reader.deserialize::<StopTimeRow>().enumerate() {
        let row = row?;
        let bad_time = |message: String| TimetableReadError::BadTime {
            row: row_idx + 1,
            message,
        };
        let stop_time = ExtStopTime {
            stop: ExtStopId(row.stop_id),
            arrival: parse_time(&row.arrival).map_err(bad_time)?,
            departure: parse_time(&row.departure).map_err(bad_time)?,
        };
        if current_id.as_deref() == Some(row.trip_id.as_str()) {
            trips.last_mut().unwrap().stop_times.push(stop_time);
        } else {
            current_id = Some(row.trip_id.clone());
            trips.push(ExtTrip {
                route: row.route_id,
                slack_class: row.slack_class,
                group_bit: row.group_bit,
                stop_times: vec![stop_time],
            });
        }
    }

    if trips.is_empty() {
        return Err(TimetableReadError::Empty);
    }
    info!("Read {} trips from {}", trips.len(), path.display());
    Ok(trips)
}

pub fn read_transfers_csv(path: &Path) -> Result<Vec<ExtTransfer>, TimetableReadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut transfers = Vec::new();
    for row in reader.deserialize::<TransferRow>() {
        let row = row?;
        transfers.push(ExtTransfer {
            from: ExtStopId(row.from_stop),
            to: ExtStopId(row.to_stop),
            duration: row.duration,
            c1: row.cost,
        });
    }
    info!("Read {} transfers from {}", transfers.len(), path.display());
    Ok(transfers)
}
