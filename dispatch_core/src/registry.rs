// dispatch_core/src/registry.rs

//! Append-only mapping of generator identifiers to dense column indices.
//! Persisted as a table of fixed-width, NUL-padded text cells.

/// Width in bytes of one generator id cell in the store file.
pub const GEN_ID_WIDTH: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct GeneratorRegistry {
    ids: Vec<String>,
    index: std::collections::HashMap<String, usize>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from its fixed-width cell table.
    pub fn from_cells(cells: &[u8]) -> anyhow::Result<Self> {
        if cells.len() % GEN_ID_WIDTH != 0 {
            anyhow::bail!(
                "Generator id table has {} bytes, not a multiple of {}",
                cells.len(),
                GEN_ID_WIDTH,
            );
        }

        let mut registry = Self::new();
        for (i, cell) in cells.chunks_exact(GEN_ID_WIDTH).enumerate() {
            let end = cell.iter().position(|&b| b == 0).unwrap_or(GEN_ID_WIDTH);
            let id = std::str::from_utf8(&cell[..end])
                .map_err(|e| anyhow::anyhow!("Generator id cell {} is not UTF-8: {}", i, e))?;
            let (index, added) = registry.register(id)?;
            if !added || index != i {
                anyhow::bail!("Generator id '{}' appears more than once in the store", id);
            }
        }

        anyhow::Ok(registry)
    }

    /// Encodes the registry as `len() * GEN_ID_WIDTH` bytes.
    pub fn to_cells(&self) -> Vec<u8> {
        let mut cells = vec![0u8; self.ids.len() * GEN_ID_WIDTH];
        for (cell, id) in cells.chunks_exact_mut(GEN_ID_WIDTH).zip(&self.ids) {
            cell[..id.len()].copy_from_slice(id.as_bytes());
        }
        cells
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Registers `id` if unseen.
    ///
    /// # Returns
    /// * `(index, added)` where `added` is false for an already-known id.
    pub fn register(&mut self, id: &str) -> anyhow::Result<(usize, bool)> {
        if let Some(index) = self.get(id) {
            return anyhow::Ok((index, false));
        }
        validate_id(id)?;

        let index = self.ids.len();
        self.ids.push(id.to_string());
        self.index.insert(id.to_string(), index);
        anyhow::Ok((index, true))
    }

}

fn validate_id(id: &str) -> anyhow::Result<()> {
    if id.is_empty() {
        anyhow::bail!("Generator id cannot be empty");
    }
    if id.len() > GEN_ID_WIDTH {
        anyhow::bail!("Generator id '{}' exceeds {} bytes", id, GEN_ID_WIDTH);
    }
    if id.as_bytes().contains(&0) {
        anyhow::bail!("Generator id {:?} contains a NUL byte", id);
    }
    anyhow::Ok(())
}
