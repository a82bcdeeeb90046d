use camino::{Utf8Path, Utf8PathBuf};

/// Collection of files awaiting packaging, split by provenance.
///
/// Deletable resources are artifacts this pipeline produced and may remove
/// once safely archived; undeletable resources are catalog-resident files the
/// subsystem must never destroy. Both lists preserve insertion order, keep
/// duplicates, and are append-only: the only thing that ever consumes entries
/// is the packaging step, which works on the lists as-is.
#[derive(Debug, Default)]
pub struct ResourceBundle {
    deletable: Vec<Utf8PathBuf>,
    undeletable: Vec<Utf8PathBuf>,
}

impl ResourceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_deletable(&mut self, path: impl Into<Utf8PathBuf>) {
        self.deletable.push(path.into());
    }

    pub fn add_undeletable(&mut self, path: impl Into<Utf8PathBuf>) {
        self.undeletable.push(path.into());
    }

    pub fn deletable_resources(&self) -> impl Iterator<Item = &Utf8Path> {
        self.deletable.iter().map(Utf8PathBuf::as_path)
    }

    pub fn undeletable_resources(&self) -> impl Iterator<Item = &Utf8Path> {
        self.undeletable.iter().map(Utf8PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.deletable.len() + self.undeletable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletable.is_empty() && self.undeletable.is_empty()
    }
}
