//! Size-bounded rotating file writer.
//!
//! # Responsibilities
//! - Append lines to a file, rotating before a write would exceed the size cap
//! - Name rotated files `<stem>-<UTC timestamp>.<ext>`, optionally gzipped
//! - Prune rotated files beyond the backup count or older than the age cap
//!
//! # Design Decisions
//! - The active file is opened lazily and appended to across restarts
//! - A zero backup count or zero age disables that pruning rule

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::StatsConfig;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const COMPRESS_SUFFIX: &str = ".gz";
const MEGABYTE: u64 = 1024 * 1024;

/// When to rotate and what to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Maximum size of the active file in bytes.
    pub max_size: u64,
    /// Rotated files to keep (0 keeps all).
    pub max_backups: usize,
    /// Maximum age of a rotated file (`None` keeps all).
    pub max_age: Option<ChronoDuration>,
    /// Gzip rotated files.
    pub compress: bool,
}

impl From<&StatsConfig> for RotationPolicy {
    fn from(config: &StatsConfig) -> Self {
        let max_age = if config.max_age_days == 0 {
            None
        } else {
            i64::try_from(config.max_age_days)
                .ok()
                .and_then(ChronoDuration::try_days)
        };
        Self {
            max_size: config.max_size_mb.saturating_mul(MEGABYTE).max(1),
            max_backups: config.max_backups,
            max_age,
            compress: config.compress,
        }
    }
}

/// Append-only file that rotates itself.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    policy: RotationPolicy,
    file: Option<File>,
    size: u64,
}

impl RotatingFile {
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
            file: None,
            size: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line` plus a newline, rotating first if it would not fit.
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64 + 1;
        if len > self.policy.max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "line of {} bytes exceeds maximum file size {}",
                    len, self.policy.max_size
                ),
            ));
        }

        self.open_if_needed()?;
        if self.size + len > self.policy.max_size {
            self.rotate()?;
            self.open_if_needed()?;
        }

        let file = self.active()?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        self.size += len;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    /// Move the active file aside now. The next write starts a fresh file.
    pub fn rotate(&mut self) -> io::Result<()> {
        self.rotate_at(Utc::now())
    }

    pub fn rotate_at(&mut self, now: DateTime<Utc>) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        self.size = 0;

        if !self.path.exists() {
            return Ok(());
        }

        let mut stamp = now;
        let mut backup = self.backup_path(stamp);
        while backup.exists() || self.compressed(&backup).exists() {
            stamp += ChronoDuration::milliseconds(1);
            backup = self.backup_path(stamp);
        }
        fs::rename(&self.path, &backup)?;
        tracing::debug!(from = %self.path.display(), to = %backup.display(), "Rotated stats file");

        if self.policy.compress {
            compress_file(&backup, &self.compressed(&backup))?;
        }

        self.prune_at(now)
    }

    /// Remove rotated files beyond the backup count or older than the age cap.
    pub fn prune_at(&self, now: DateTime<Utc>) -> io::Result<()> {
        let mut backups = self.list_backups()?;
        // newest first
        backups.sort_by(|a, b| b.0.cmp(&a.0));

        for (i, (stamp, path)) in backups.iter().enumerate() {
            let over_count = self.policy.max_backups > 0 && i >= self.policy.max_backups;
            let too_old = self
                .policy
                .max_age
                .is_some_and(|age| now.signed_duration_since(*stamp) > age);
            if over_count || too_old {
                fs::remove_file(path)?;
                tracing::debug!(file = %path.display(), "Removed old stats file");
            }
        }
        Ok(())
    }

    /// Rotated files belonging to this writer, with their timestamps.
    pub fn list_backups(&self) -> io::Result<Vec<(DateTime<Utc>, PathBuf)>> {
        let dir = self.dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(stamp) = name.to_str().and_then(|n| self.parse_backup_name(n)) {
                found.push((stamp, entry.path()));
            }
        }
        Ok(found)
    }

    fn open_if_needed(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let dir = self.dir();
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(&dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn active(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("stats file is not open"))
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
    }

    fn backup_path(&self, at: DateTime<Utc>) -> PathBuf {
        let stamp = at.format(TIMESTAMP_FORMAT);
        let name = match self.extension() {
            Some(ext) => format!("{}-{}.{}", self.stem(), stamp, ext),
            None => format!("{}-{}", self.stem(), stamp),
        };
        self.dir().join(name)
    }

    fn compressed(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(COMPRESS_SUFFIX);
        PathBuf::from(name)
    }

    fn parse_backup_name(&self, name: &str) -> Option<DateTime<Utc>> {
        let prefix = format!("{}-", self.stem());
        let rest = name.strip_prefix(&prefix)?;
        let rest = rest.strip_suffix(COMPRESS_SUFFIX).unwrap_or(rest);
        let stamp = match self.extension() {
            Some(ext) => rest.strip_suffix(&format!(".{}", ext))?,
            None => rest,
        };
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }
}

fn compress_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let mut encoder = GzEncoder::new(File::create(dst)?, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.sync_all()?;
    fs::remove_file(src)
}
