// dispatch_core/src/generators.rs

//! Reads the published generator list used to seed the registry.
//! Columns used: region (2), station id (13), maximum capacity (15).

use anyhow::Context;

pub const MIN_FIELDS: usize = 17;
pub const NO_STATION_ID: &str = "-";

const REGION_FIELD: usize = 2;
const STATION_ID_FIELD: usize = 13;
const CAPACITY_FIELD: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorInfo {
    pub station_id: String,
    pub region: String,
    pub max_capacity: f64,
}

/// Parses the generator list, skipping the heading row and rows without an id.
pub fn parse_generator_list<R: std::io::Read>(reader: R, source: &str) -> anyhow::Result<Vec<GeneratorInfo>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut generators = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{}: skipping unreadable row {}: {}", source, line + 2, e);
                continue;
            }
        };
        if record.len() < MIN_FIELDS {
            continue;
        }

        let station_id = record[STATION_ID_FIELD].trim();
        if station_id.is_empty() || station_id == NO_STATION_ID {
            continue;
        }

        let max_capacity = match record[CAPACITY_FIELD].trim().parse::<f64>() {
            Ok(capacity) => capacity,
            Err(e) => {
                log::warn!(
                    "{}: bad capacity '{}' for {}: {}",
                    source,
                    &record[CAPACITY_FIELD],
                    station_id,
                    e,
                );
                continue;
            }
        };

        generators.push(GeneratorInfo {
            station_id: station_id.to_string(),
            region: record[REGION_FIELD].trim().to_string(),
            max_capacity,
        });
    }

    anyhow::Ok(generators)
}

/// Station ids ordered by region, then by descending capacity.
pub fn ordered_station_ids(mut generators: Vec<GeneratorInfo>) -> Vec<String> {
    generators.sort_by(|a, b| {
        a.region
            .cmp(&b.region)
            .then_with(|| b.max_capacity.total_cmp(&a.max_capacity))
    });
    generators.into_iter().map(|g| g.station_id).collect()
}

/// Reads the generator list at `path`. A missing file yields an empty list.
pub fn read_generators_csv(path: &std::path::Path) -> anyhow::Result<Vec<String>> {
    if !path.exists() {
        log::warn!("Generator list {} does not exist", path.display());
        return anyhow::Ok(Vec::new());
    }

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open generator list {}", path.display()))?;
    let generators = parse_generator_list(file, &path.display().to_string())?;
    let ids = ordered_station_ids(generators);

    log::info!("Read {} generators from {}", ids.len(), path.display());
    anyhow::Ok(ids)
}
