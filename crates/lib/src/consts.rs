//! Shared constants: archive layout, fragment file conventions and template delimiters.

/// Opening delimiter of a template action.
pub const ACTION_OPEN: &str = "$(";

/// Closing delimiter of a template action.
pub const ACTION_CLOSE: char = ')';

/// Extension of fragment files considered by directory readers.
pub const FRAGMENT_EXTENSION: &str = "yml";

/// Name of the optional ordering file inside a fragment directory.
pub const ORDER_FILENAME: &str = "_order.yml";

/// Maximum depth of helper calls nested inside looked-up values.
pub const MAX_INTERPOLATION_DEPTH: usize = 32;

pub const METADATA_DIR: &str = "metadata";
pub const RELEASES_DIR: &str = "releases";
pub const MIGRATIONS_DIR: &str = "migrations/v1";
pub const CONTENT_MIGRATIONS_PATH: &str = "content_migrations/migrations.yml";
pub const EMBED_DIR: &str = "embed";

/// Extension appended to the tile path for the checksum sidecar.
pub const CHECKSUM_EXTENSION: &str = "sha256";

/// Suffixes recognised as release tarballs when scanning a releases directory.
pub const TARBALL_SUFFIXES: &[&str] = &[".tgz", ".tar.gz"];
