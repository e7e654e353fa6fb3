//! Local existence probing.
//!
//! # Responsibilities
//! - Resolve a relative target against the data root
//! - Decide between a local file and a remote fetch
//!
//! # Design Decisions
//! - Any probe failure (missing, permission, malformed path) means "remote"
//! - Paths escaping the data root are not local, even when they exist
//! - Only regular files count; directories fall through to remote

use std::path::{Path, PathBuf};

use tokio::fs;

/// Where a target's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// An existing regular file under the data root.
    Local { path: PathBuf, byte_size: u64 },
    /// Nothing local; the target must be fetched.
    Remote,
}

/// Probe `relative` under `data_root`.
pub async fn locate(data_root: &Path, relative: &str) -> SourceLocation {
    if relative.is_empty() || relative.contains('\0') {
        return SourceLocation::Remote;
    }

    let root = match fs::canonicalize(data_root).await {
        Ok(root) => root,
        Err(e) => {
            tracing::debug!(data_root = %data_root.display(), error = %e, "Data root unavailable");
            return SourceLocation::Remote;
        }
    };

    let Ok(candidate) = fs::canonicalize(root.join(relative)).await else {
        return SourceLocation::Remote;
    };
    if !candidate.starts_with(&root) {
        tracing::warn!(
            requested = relative,
            resolved = %candidate.display(),
            "Target escapes data root, not serving locally"
        );
        return SourceLocation::Remote;
    }

    match fs::metadata(&candidate).await {
        Ok(meta) if meta.is_file() => SourceLocation::Local {
            path: candidate,
            byte_size: meta.len(),
        },
        _ => SourceLocation::Remote,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn existing_file_is_local() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("a.csv"), b"x,y\n1,2\n").unwrap();

        match locate(root.path(), "a.csv").await {
            SourceLocation::Local { path, byte_size } => {
                assert_eq!(byte_size, 8);
                assert!(path.ends_with("a.csv"));
            }
            other => panic!("expected local, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nested_file_is_local() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();
        std::fs::write(root.path().join("sub/b.json"), b"{}").unwrap();

        assert!(matches!(
            locate(root.path(), "sub/b.json").await,
            SourceLocation::Local { byte_size: 2, .. }
        ));
    }

    #[tokio::test]
    async fn missing_file_is_remote() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(locate(root.path(), "nope.csv").await, SourceLocation::Remote);
    }

    #[tokio::test]
    async fn url_looking_target_is_remote() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(
            locate(root.path(), "http://example.test/data.csv").await,
            SourceLocation::Remote
        );
    }

    #[tokio::test]
    async fn directory_is_remote() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();
        assert_eq!(locate(root.path(), "sub").await, SourceLocation::Remote);
    }

    #[tokio::test]
    async fn traversal_outside_root_is_remote() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("data");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(outer.path().join("secret.txt"), b"s").unwrap();

        assert_eq!(locate(&root, "../secret.txt").await, SourceLocation::Remote);
    }

    #[tokio::test]
    async fn malformed_path_is_remote() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(locate(root.path(), "bad\0name").await, SourceLocation::Remote);
    }

    #[tokio::test]
    async fn missing_root_is_remote() {
        assert_eq!(
            locate(Path::new("/definitely/not/a/root"), "a.csv").await,
            SourceLocation::Remote
        );
    }
}
