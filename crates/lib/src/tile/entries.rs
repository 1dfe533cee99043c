use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;

use super::TileError;

/// Where an archive entry's contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
  /// In-memory contents (generated metadata, content migrations).
  Bytes(Vec<u8>),
  /// Contents copied from a file on disk.
  File(PathBuf),
  /// A file copied with its unix permission bits.
  FileWithMode { path: PathBuf, mode: u32 },
  /// A zero-length file (stubbed releases).
  Empty,
  /// An empty directory.
  Folder,
}

/// Archive paths mapped to their sources, iterated in lexicographic path order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntrySet {
  entries: BTreeMap<String, Source>,
}

impl EntrySet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add an entry. Two sources for the same archive path are an error.
  pub fn insert(&mut self, path: String, source: Source) -> Result<(), TileError> {
    match self.entries.entry(path) {
      Entry::Vacant(vacant) => {
        vacant.insert(source);
        Ok(())
      }
      Entry::Occupied(occupied) => Err(TileError::DuplicateEntry {
        path: occupied.key().clone(),
      }),
    }
  }

  pub fn contains(&self, path: &str) -> bool {
    self.entries.contains_key(path)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Source)> {
    self.entries.iter().map(|(path, source)| (path.as_str(), source))
  }
}
