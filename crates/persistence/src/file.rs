//! JSON snapshot files

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::PersistenceError;

/// Load a snapshot; a missing or unreadable-as-JSON file yields `T::default()`
pub async fn load_or_default<T>(path: &Path) -> Result<T, PersistenceError>
where
    T: DeserializeOwned + Default,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt data file, starting empty");
            Ok(T::default())
        }
    }
}

/// Replace the file contents via a temporary file and rename
pub async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), PersistenceError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
