use crate::error::{ErrorType, IntoResult};
use crate::Result;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Write a file.
pub(crate) async fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, contents)
        .await
        .context(format!("Unable to write to {}", path.to_string_lossy()))
        .pub_result(ErrorType::Io)
}

/// Read a file to a `String`.
pub(crate) async fn read(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file at {}", path.display()))
        .pub_result(ErrorType::Io)
}

/// Deserialize a JSON file into type `T`.
pub(crate) async fn deserialize<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = read(path).await?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file at {}", path.display()))
}

/// Serialize `value` as JSON with four-space indentation and write it to `path`.
pub(crate) async fn serialize<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize,
{
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .with_context(|| format!("Unable to serialize JSON for {}", path.display()))?;
    write(path, buf).await
}

/// Create a directory and its parents.
pub(crate) async fn make_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("Unable to create directory at {}", path.display()))
        .pub_result(ErrorType::Io)
}

/// Canonicalize `path`, which must exist.
pub(crate) async fn canonicalize(path: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("Unable to canonicalize the path {}", path.display()))
        .pub_result(ErrorType::Io)
}

/// Returns `p` unchanged if it is absolute, otherwise joins it onto `root`.
pub(crate) fn resolve(root: &Path, p: impl AsRef<Path>) -> PathBuf {
    let p = p.as_ref();
    if p.is_absolute() {
        return p.to_path_buf();
    }
    root.join(p)
}
