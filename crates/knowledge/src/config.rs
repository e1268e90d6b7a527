//! On-disk locations for knowledge data.

use std::path::{Path, PathBuf};

/// Directory holding local search indexes.
pub fn get_index_dir(workspace: &Path) -> PathBuf {
    workspace.join(".tally").join("index")
}

/// Path of the SQLite index for `index_name`.
pub fn get_index_path(workspace: &Path, index_name: &str) -> PathBuf {
    get_index_dir(workspace).join(format!("{}.sqlite", index_name))
}
