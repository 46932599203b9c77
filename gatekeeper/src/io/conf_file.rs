//! Load and store `gitosis.conf` inside the working copy.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::config_store::{self, ConfigDocument};
use crate::error::AccessError;

/// Read and parse the config file.
pub fn load(path: &Path) -> Result<ConfigDocument, AccessError> {
    let bytes = fs::read(path).map_err(|source| AccessError::Persistence {
        action: "read",
        path: path.to_path_buf(),
        source,
    })?;
    let doc = config_store::parse(&bytes).map_err(AccessError::MalformedConfig)?;
    debug!(path = %path.display(), sections = doc.sections().count(), "config loaded");
    Ok(doc)
}

/// Atomically replace the config file (temp file + rename).
pub fn store(path: &Path, doc: &ConfigDocument) -> Result<(), AccessError> {
    let contents = config_store::serialize(doc);
    let tmp_path = path.with_extension("conf.tmp");
    fs::write(&tmp_path, contents).map_err(|source| AccessError::Persistence {
        action: "write",
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| AccessError::Persistence {
        action: "replace",
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "config stored");
    Ok(())
}
