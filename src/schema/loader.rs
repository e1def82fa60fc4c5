//! Administrative bulk copy of schema files into a cache directory.
//!
//! Lets an operator pre-seed `<cache-root>/<dir>` before the device that
//! uses it is configured, so resolution never has to reach the device.

use std::path::Path;

use serde::Serialize;

use super::cache::validate_directory_name;

/// Result of a [`load_models`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum LoadModelsOutcome {
    /// The directory was created and populated.
    Created,
    /// The directory already existed; nothing was copied.
    AlreadyExists,
    /// The operation failed.
    Error(String),
}

/// Copies `source_path` into `<cache_root>/<directory>`.
///
/// A directory source has each of its regular files copied; per-file
/// failures are logged and skipped. Any other source is copied as a single
/// file. An existing target directory is left untouched.
pub async fn load_models(cache_root: &Path, directory: &str, source_path: &Path) -> LoadModelsOutcome {
    if let Err(err) = validate_directory_name(directory) {
        return LoadModelsOutcome::Error(err.to_string());
    }
    let target = cache_root.join(directory);

    match tokio::fs::try_exists(&target).await {
        Ok(true) => {
            tracing::info!(target = %target.display(), "schema cache directory already exists");
            return LoadModelsOutcome::AlreadyExists;
        }
        Ok(false) => {}
        Err(err) => return LoadModelsOutcome::Error(err.to_string()),
    }

    if let Err(err) = tokio::fs::create_dir_all(&target).await {
        return LoadModelsOutcome::Error(format!("cannot create {}: {err}", target.display()));
    }

    let is_dir = tokio::fs::metadata(source_path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);

    if is_dir {
        let mut entries = match tokio::fs::read_dir(source_path).await {
            Ok(entries) => entries,
            Err(err) => {
                return LoadModelsOutcome::Error(format!(
                    "cannot list {}: {err}",
                    source_path.display()
                ));
            }
        };
        let mut copied = 0usize;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => return LoadModelsOutcome::Error(err.to_string()),
            };
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let destination = target.join(entry.file_name());
            match tokio::fs::copy(entry.path(), &destination).await {
                Ok(_) => copied += 1,
                Err(err) => tracing::error!(
                    file = %entry.path().display(),
                    error = %err,
                    "failed to copy schema file"
                ),
            }
        }
        tracing::info!(target = %target.display(), copied, "loaded schema models");
    } else {
        let Some(file_name) = source_path.file_name() else {
            return LoadModelsOutcome::Error(format!(
                "{} does not name a file",
                source_path.display()
            ));
        };
        if let Err(err) = tokio::fs::copy(source_path, target.join(file_name)).await {
            return LoadModelsOutcome::Error(format!(
                "cannot copy {}: {err}",
                source_path.display()
            ));
        }
        tracing::info!(target = %target.display(), "loaded schema model");
    }

    LoadModelsOutcome::Created
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_directory_contents() {
        let Ok(root) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let Ok(source) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        for name in ["a@2024-01-01.yang", "b.yang"] {
            if let Err(err) = std::fs::write(source.path().join(name), "module x {}") {
                panic!("write: {err}");
            }
        }

        let outcome = load_models(root.path(), "dev", source.path()).await;
        assert_eq!(outcome, LoadModelsOutcome::Created);
        assert!(root.path().join("dev/a@2024-01-01.yang").exists());
        assert!(root.path().join("dev/b.yang").exists());

        let again = load_models(root.path(), "dev", source.path()).await;
        assert_eq!(again, LoadModelsOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn copies_single_file() {
        let Ok(root) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let file = root.path().join("single.yang");
        if let Err(err) = std::fs::write(&file, "module single {}") {
            panic!("write: {err}");
        }
        let outcome = load_models(root.path(), "one", &file).await;
        assert_eq!(outcome, LoadModelsOutcome::Created);
        assert!(root.path().join("one/single.yang").exists());
    }

    #[tokio::test]
    async fn missing_source_file_is_an_error() {
        let Ok(root) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let outcome = load_models(root.path(), "x", &root.path().join("nope.yang")).await;
        assert!(matches!(outcome, LoadModelsOutcome::Error(_)));
    }

    #[tokio::test]
    async fn rejects_escaping_directory_names() {
        let Ok(root) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let outcome = load_models(root.path(), "../up", root.path()).await;
        assert!(matches!(outcome, LoadModelsOutcome::Error(_)));
    }
}
