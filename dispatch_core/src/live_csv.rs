// dispatch_core/src/live_csv.rs

//! Live unit SCADA files: one 5-minute interval per file.
//!
//! ```text
//! D,DISPATCH,UNIT_SCADA,1,"2014/01/01 00:05:00",BAYSW1,652.3
//! ```

use crate::row;
use crate::utils;

pub const RECORD_MARKER: &str = "D,";
pub const MIN_FIELDS: usize = 7;

const TIMESTAMP_FIELD: usize = 4;
const GENERATOR_FIELD: usize = 5;
const MEGAWATTS_FIELD: usize = 6;

/// Folds a live dispatch file into a single row.
///
/// The first timestamp that parses becomes the row's timestamp; every record with a
/// positive megawatt value contributes to the row, whatever its own timestamp says.
///
/// # Returns
/// * `None` if no record carried a parsable timestamp.
pub fn parse_live_dispatch<R: std::io::BufRead>(
    reader: R,
    source: &str,
) -> anyhow::Result<Option<row::DispatchRow>> {
    let mut timestamp = None;
    let mut values = std::collections::BTreeMap::new();

    for line in reader.split(b'\n') {
        let line = line?;
        let line = String::from_utf8_lossy(&line);
        if !line.starts_with(RECORD_MARKER) {
            continue;
        }

        let fields: Vec<&str> = line.trim_end().split(',').collect();
        if fields.len() < MIN_FIELDS {
            log::warn!("{}: unexpected number of fields in SCADA dispatch record", source);
            continue;
        }

        if timestamp.is_none() {
            match utils::string_to_date_time(fields[TIMESTAMP_FIELD], utils::DISPATCH_TIME_FORMAT) {
                Ok(dt) => timestamp = Some(dt),
                Err(e) => log::warn!("{}: failed to parse dispatch time: {}", source, e),
            }
        }

        let megawatts = match fields[MEGAWATTS_FIELD].trim().parse::<f32>() {
            Ok(mw) => mw,
            Err(e) => {
                log::warn!("{}: bad megawatt value '{}': {}", source, fields[MEGAWATTS_FIELD], e);
                continue;
            }
        };
        if megawatts > 0.0 {
            values.insert(fields[GENERATOR_FIELD].trim().to_string(), megawatts);
        }
    }

    anyhow::Ok(timestamp.map(|timestamp| row::DispatchRow { timestamp, values }))
}
