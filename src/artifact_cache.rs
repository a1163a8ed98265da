//! Existence-based artifact cache.
//!
//! A file at the target path is trusted as-is: no checksum, no expiry. Every write goes
//! through its own uniquely named `.part` file and a rename, so an interrupted write never
//! counts as cached and two records sharing a target never clobber each other's temp file.

use crate::error::ScrapeResult;
use crate::http_client::Fetcher;
use std::ffi::OsString;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Fetched,
    AlreadyPresent,
    Failed(String),
}

impl ArtifactOutcome {
    /// The artifact exists locally after this outcome
    pub fn is_available(&self) -> bool {
        matches!(self, ArtifactOutcome::Fetched | ArtifactOutcome::AlreadyPresent)
    }
}

pub struct ArtifactCache<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
}

impl<'a, F: Fetcher + ?Sized> ArtifactCache<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self { fetcher }
    }

    /// Make sure `url` is stored at `path`, touching the network only when it is missing.
    pub async fn ensure(&self, url: &str, path: &Path) -> ArtifactOutcome {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            log::info!("Skipping download, already exists: {}", path.display());
            return ArtifactOutcome::AlreadyPresent;
        }

        let bytes = match self.fetcher.fetch_bytes(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to download {}: {}", url, e);
                return ArtifactOutcome::Failed(e.to_string());
            }
        };

        let target = path.to_path_buf();
        let written = tokio::task::spawn_blocking(move || {
            write_atomically(&target, &bytes).map(|()| bytes.len())
        })
        .await
        .unwrap_or_else(|e| Err(std::io::Error::other(e).into()));

        match written {
            Ok(len) => {
                log::debug!("Saved {} ({} bytes)", path.display(), len);
                ArtifactOutcome::Fetched
            }
            Err(e) => {
                log::warn!("Failed to write {}: {}", path.display(), e);
                ArtifactOutcome::Failed(e.to_string())
            }
        }
    }
}

/// `1002.gif` → `1002.gif.` so temp files read as `1002.gif.<random>.part`
fn part_prefix(path: &Path) -> OsString {
    let mut prefix = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    prefix.push(".");
    prefix
}

/// Write `bytes` to a fresh temp file beside `path`, then rename it into place.
/// The temp file is removed if anything before the rename fails.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> ScrapeResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(&part_prefix(path))
        .suffix(".part")
        .tempfile_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch_text(&self, _url: &str) -> ScrapeResult<String> {
            unreachable!("artifact cache never fetches text")
        }

        async fn fetch_bytes(&self, url: &str) -> ScrapeResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScrapeError::transport(format!("connection refused: {}", url)));
            }
            Ok(b"GIF89a".to_vec())
        }
    }

    #[tokio::test]
    async fn test_second_run_makes_no_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("1002.gif");
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0), fail: false };
        let cache = ArtifactCache::new(&fetcher);

        assert_eq!(cache.ensure("https://x.test/1002.gif", &path).await, ArtifactOutcome::Fetched);
        assert_eq!(std::fs::read(&path).unwrap(), b"GIF89a");
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);

        assert_eq!(
            cache.ensure("https://x.test/1002.gif", &path).await,
            ArtifactOutcome::AlreadyPresent
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1002.gif");
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0), fail: true };

        let outcome = ArtifactCache::new(&fetcher).ensure("https://x.test/1002.gif", &path).await;
        assert!(matches!(outcome, ArtifactOutcome::Failed(ref reason) if reason.contains("connection refused")));
        assert!(!outcome.is_available());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_writers_of_one_target_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1002.gif");
        let fetcher = CountingFetcher { calls: AtomicUsize::new(0), fail: false };
        let cache = ArtifactCache::new(&fetcher);

        let outcomes = futures::future::join_all(
            (0..4).map(|_| cache.ensure("https://x.test/1002.gif", &path)),
        )
        .await;

        assert!(outcomes.iter().all(ArtifactOutcome::is_available), "{:?}", outcomes);
        assert_eq!(std::fs::read(&path).unwrap(), b"GIF89a");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_part_prefix() {
        assert_eq!(part_prefix(Path::new("out/1002.gif")), OsString::from("1002.gif."));
    }
}
