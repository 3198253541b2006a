//! Replaying a directory of saved feed snapshots, one file per cycle.

use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::FeedSource;

/// Slowest accepted simulation speed.
const MIN_SPEED: f64 = 0.1;

/// `.pb` and `.pb.gz` files of a directory, in file-name order.
#[derive(Debug, Clone)]
pub struct ReplayDir {
    files: Vec<PathBuf>,
}

impl ReplayDir {
    #[tracing::instrument(skip(dir), fields(dir = %dir.display()))]
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry?.path();
            if path.is_file() && is_snapshot(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            bail!("no .pb snapshots in {}", dir.display());
        }
        files.sort();
        info!(files = files.len(), "Replaying snapshots");
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Source for the zero-based `cycle`, `None` once the files run out.
    pub fn source(&self, cycle: usize) -> Option<FeedSource> {
        self.files.get(cycle).cloned().map(FeedSource::File)
    }
}

fn is_snapshot(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(OsStr::to_str) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    name.ends_with(".pb") || name.ends_with(".pb.gz")
}

/// Pause between replayed cycles: the interval divided by `speed`.
pub fn replay_pause(interval_secs: u64, speed: f64) -> Duration {
    Duration::from_secs_f64(interval_secs as f64 / speed.max(MIN_SPEED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::env;
    use std::fs;
    use std::io::Write;

    fn fresh_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_files_replay_in_name_order() {
        let dir = fresh_dir("gtfs_rt_reconciler_replay_order");
        fs::write(dir.join("20240301T0810.pb"), [3u8]).unwrap();
        fs::write(dir.join("20240301T0800.pb"), [1u8]).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[2]).unwrap();
        fs::write(dir.join("20240301T0805.pb.gz"), encoder.finish().unwrap()).unwrap();
        fs::write(dir.join("notes.txt"), "skip me").unwrap();
        fs::create_dir(dir.join("nested.pb")).unwrap();

        let replay = ReplayDir::open(&dir).unwrap();
        assert_eq!(replay.len(), 3);

        let client = BasicClient::new(Duration::from_secs(1), "test").unwrap();
        let mut seen = Vec::new();
        let mut cycle = 0;
        while let Some(source) = replay.source(cycle) {
            seen.push(source.fetch(&client).await.unwrap()[0]);
            cycle += 1;
        }
        assert_eq!(seen, vec![1, 2, 3]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_directory_without_snapshots_errors() {
        let dir = fresh_dir("gtfs_rt_reconciler_replay_empty");
        fs::write(dir.join("readme.md"), "nothing").unwrap();

        assert!(ReplayDir::open(&dir).is_err());
        assert!(ReplayDir::open(&dir.join("missing")).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_replay_pause_scales_with_speed() {
        assert_eq!(replay_pause(60, 1.0), Duration::from_secs(60));
        assert_eq!(replay_pause(60, 2.0), Duration::from_secs(30));
        assert_eq!(replay_pause(60, 0.0), Duration::from_secs(600));
        assert_eq!(replay_pause(0, 4.0), Duration::ZERO);
    }
}
