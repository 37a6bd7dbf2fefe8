// dispatch_core/src/row.rs

/// One 5-minute observation: megawatts per generator id at a single timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRow {
    pub timestamp: chrono::NaiveDateTime,
    pub values: std::collections::BTreeMap<String, f32>,
}

impl DispatchRow {
    pub fn new(timestamp: chrono::NaiveDateTime) -> Self {
        DispatchRow {
            timestamp,
            values: std::collections::BTreeMap::new(),
        }
    }
}

/// Destination for parsed rows.
pub trait RowSink {
    /// Writes `row`; returns false when it was dropped (e.g. before the epoch).
    fn push_row(&mut self, row: &DispatchRow) -> anyhow::Result<bool>;
}

impl RowSink for Vec<DispatchRow> {
    fn push_row(&mut self, row: &DispatchRow) -> anyhow::Result<bool> {
        self.push(row.clone());
        anyhow::Ok(true)
    }
}
