//! Lexicographic directory walk used by the fragment reader.

use std::iter::FusedIterator;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// What a walked path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
  File,
  Directory,
  /// Symlinks to nowhere, sockets and similar.
  Other,
}

/// A lazy, finite walk over every entry below a root, in file-name order.
///
/// The first error ends the walk: it is yielded as the last item and every
/// later call to `next` returns `None`. The walk cannot be restarted.
pub struct Walk {
  inner: walkdir::IntoIter,
  done: bool,
}

impl Walk {
  pub fn new(root: &Path) -> Self {
    Self {
      inner: WalkDir::new(root).follow_links(true).sort_by_file_name().into_iter(),
      done: false,
    }
  }
}

impl Iterator for Walk {
  type Item = Result<(PathBuf, EntryKind), walkdir::Error>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    match self.inner.next() {
      None => {
        self.done = true;
        None
      }
      Some(Err(e)) => {
        self.done = true;
        Some(Err(e))
      }
      Some(Ok(entry)) => {
        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
          EntryKind::Directory
        } else if file_type.is_file() {
          EntryKind::File
        } else {
          EntryKind::Other
        };
        Some(Ok((entry.into_path(), kind)))
      }
    }
  }
}

impl FusedIterator for Walk {}
