//! On-disk recording store
//!
//! Recordings are flat WAV files named `{prefix}_YYYYMMDD_HHMMSS.wav` in
//! a single directory, next to the greeting file. The fixed-width,
//! zero-padded timestamp makes descending lexicographic order equal
//! descending chronological order; `most_recent` relies on exactly that
//! property, so the format must keep its shape.

use crate::audio::AudioChunk;
use crate::error::StoreError;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

const EXTENSION: &str = "wav";

/// Descriptor of a persisted recording. The file is immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub path: PathBuf,
}

/// Store rooted at a fixed directory, filtering by filename prefix
pub struct RecordingStore {
    dir: PathBuf,
    prefix: String,
}

impl RecordingStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Timestamped filename at second granularity.
    ///
    /// Two calls within the same wall-clock second return the same name;
    /// the later write wins. Known limitation, kept from the original
    /// naming scheme.
    pub fn next_filename(&self, now: DateTime<Local>) -> String {
        format!("{}_{}.{}", self.prefix, now.format("%Y%m%d_%H%M%S"), EXTENSION)
    }

    /// Concatenate `chunks` in capture order into one mono 16-bit PCM
    /// WAV file named for the current wall-clock time.
    pub fn persist(
        &self,
        chunks: &[AudioChunk],
        sample_rate: u32,
    ) -> Result<Recording, StoreError> {
        let path = self.dir.join(self.next_filename(Local::now()));
        self.persist_at(&path, chunks, sample_rate)
    }

    fn persist_at(
        &self,
        path: &Path,
        chunks: &[AudioChunk],
        sample_rate: u32,
    ) -> Result<Recording, StoreError> {
        let write_err = |e: &dyn std::fmt::Display| StoreError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(&e))?;
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec).map_err(|e| write_err(&e))?;
        for chunk in chunks {
            for &sample in &chunk.samples {
                writer.write_sample(sample).map_err(|e| write_err(&e))?;
            }
        }
        writer.finalize().map_err(|e| write_err(&e))?;

        let total: usize = chunks.iter().map(|c| c.samples.len()).sum();
        tracing::info!("Wrote {} samples to {:?}", total, path);

        Ok(Recording {
            path: path.to_path_buf(),
        })
    }

    /// Most recently written recording, by descending filename order.
    pub fn most_recent(&self) -> Result<Option<Recording>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StoreError::Scan {
            dir: self.dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(&self.prefix) && name.ends_with(EXTENSION))
            .collect();

        names.sort_unstable_by(|a, b| b.cmp(a));

        Ok(names
            .into_iter()
            .next()
            .map(|name| Recording {
                path: self.dir.join(name),
            }))
    }

    /// Path of the greeting file inside the store directory
    pub fn greeting_path(&self, greeting: &str) -> PathBuf {
        self.dir.join(greeting)
    }
}
