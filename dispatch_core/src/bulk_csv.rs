// dispatch_core/src/bulk_csv.rs

//! Bulk historical unit solution dumps: many intervals per file, sorted by timestamp.
//!
//! Only fields 0 (record type), 4 (interval), 6 (generator), 9 (intervention flag)
//! and 13 (megawatts) are read.

use crate::row;
use crate::utils;

pub const RECORD_TYPE: &str = "D";
pub const MIN_FIELDS: usize = 14;
/// Intervention flag value marking a regulator-revised figure.
pub const INTERVENTION_OVERRIDE: i32 = 1;

const TIMESTAMP_FIELD: usize = 4;
const GENERATOR_FIELD: usize = 6;
const INTERVENTION_FIELD: usize = 9;
const MEGAWATTS_FIELD: usize = 13;

/// Rows of one timestamp group. A group whose timestamp failed to parse is kept
/// so its lines are recognised and dropped, but it is never written.
struct Group {
    raw_timestamp: String,
    row: Option<row::DispatchRow>,
}

/// Streams a bulk dump into `sink`, writing one row per contiguous timestamp group.
///
/// Within a group the first positive value for a generator is kept, unless a later
/// record carries the intervention override flag, which replaces it.
///
/// # Returns
/// * Number of rows the sink accepted.
pub fn load_bulk_dispatch<R, S>(reader: R, sink: &mut S, source: &str) -> anyhow::Result<usize>
where
    R: std::io::BufRead,
    S: row::RowSink + ?Sized,
{
    let mut group: Option<Group> = None;
    let mut rows = 0;

    for line in reader.split(b'\n') {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        let fields: Vec<&str> = line.trim().split(',').collect();
        if fields.len() < MIN_FIELDS {
            continue;
        }
        if fields[0] != RECORD_TYPE {
            continue;
        }

        let raw_timestamp = fields[TIMESTAMP_FIELD];
        let generator = fields[GENERATOR_FIELD].trim();
        let intervention = match fields[INTERVENTION_FIELD].trim().parse::<i32>() {
            Ok(flag) => flag,
            Err(e) => {
                log::warn!("{}: bad intervention flag '{}': {}", source, fields[INTERVENTION_FIELD], e);
                continue;
            }
        };
        let megawatts = match fields[MEGAWATTS_FIELD].trim().parse::<f32>() {
            Ok(mw) => mw,
            Err(e) => {
                log::warn!("{}: bad megawatt value '{}': {}", source, fields[MEGAWATTS_FIELD], e);
                continue;
            }
        };

        if group.as_ref().map(|g| g.raw_timestamp.as_str()) != Some(raw_timestamp) {
            if let Some(done) = group.take() {
                rows += flush(done, sink)?;
            }
            let row = match utils::string_to_date_time(raw_timestamp, utils::DISPATCH_TIME_FORMAT) {
                Ok(timestamp) => Some(row::DispatchRow::new(timestamp)),
                Err(e) => {
                    log::warn!("{}: dropping interval group: {}", source, e);
                    None
                }
            };
            group = Some(Group {
                raw_timestamp: raw_timestamp.to_string(),
                row,
            });
        }

        let Some(current) = group.as_mut().and_then(|g| g.row.as_mut()) else {
            continue;
        };
        if megawatts > 0.0
            && (intervention == INTERVENTION_OVERRIDE || !current.values.contains_key(generator))
        {
            current.values.insert(generator.to_string(), megawatts);
        }
    }

    if let Some(done) = group.take() {
        rows += flush(done, sink)?;
    }

    anyhow::Ok(rows)
}

fn flush<S: row::RowSink + ?Sized>(group: Group, sink: &mut S) -> anyhow::Result<usize> {
    match group.row {
        Some(row) => anyhow::Ok(sink.push_row(&row)? as usize),
        None => anyhow::Ok(0),
    }
}
