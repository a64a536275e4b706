//! Audit recorder appending entries to a JSON-lines file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use super::format::{AuditEntry, encode_entry};
use crate::compute::TickReport;
use crate::schema::AuditConfig;

/// Configuration for audit recording.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Append observation entries.
    pub record_observations: bool,
    /// Append fitness entries.
    pub record_fitness: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            record_observations: true,
            record_fitness: true,
        }
    }
}

impl From<&AuditConfig> for RecorderConfig {
    fn from(config: &AuditConfig) -> Self {
        Self {
            record_observations: config.record_observations,
            record_fitness: config.record_fitness,
        }
    }
}

/// Appends audit entries to a file, one JSON object per line.
///
/// Usage:
/// ```ignore
/// let mut recorder = AuditRecorder::open("field.audit.jsonl", RecorderConfig::default())?;
/// let report = manager.tick(&mut feed);
/// recorder.record_tick(&report)?;
/// recorder.flush()?;
/// ```
pub struct AuditRecorder {
    writer: BufWriter<File>,
    config: RecorderConfig,
    entries_written: u64,
    entries_skipped: u64,
    bytes_written: u64,
}

impl AuditRecorder {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open<P: AsRef<Path>>(path: P, config: RecorderConfig) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            config,
            entries_written: 0,
            entries_skipped: 0,
            bytes_written: 0,
        })
    }

    /// Append one entry.
    ///
    /// Returns false when the configuration filters the entry out.
    pub fn record(&mut self, entry: &AuditEntry) -> io::Result<bool> {
        let wanted = match entry {
            AuditEntry::Observation(_) => self.config.record_observations,
            AuditEntry::Fitness(_) => self.config.record_fitness,
            _ => true,
        };
        if !wanted {
            self.entries_skipped += 1;
            return Ok(false);
        }

        let line = encode_entry(entry)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.entries_written += 1;
        self.bytes_written += line.len() as u64 + 1;
        Ok(true)
    }

    /// Append everything a tick produced: observations, fitness records and
    /// lineage records. Returns the number of entries written.
    pub fn record_tick(&mut self, report: &TickReport) -> io::Result<usize> {
        let mut written = 0;
        for event in &report.observations {
            written += usize::from(self.record(&AuditEntry::Observation(event.clone()))?);
        }
        for record in &report.fitness {
            written += usize::from(self.record(&AuditEntry::Fitness(record.clone()))?);
        }
        for record in &report.lineage {
            written += usize::from(self.record(&AuditEntry::Lineage(record.clone()))?);
        }
        Ok(written)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Get number of entries written so far.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Flush and close the file.
    pub fn finish(mut self) -> io::Result<AuditStats> {
        self.writer.flush()?;
        Ok(AuditStats {
            entries_written: self.entries_written,
            entries_skipped: self.entries_skipped,
            bytes_written: self.bytes_written,
        })
    }
}

/// Statistics from a recording session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    /// Entries appended.
    pub entries_written: u64,
    /// Entries filtered out by configuration.
    pub entries_skipped: u64,
    /// Bytes appended, including newlines.
    pub bytes_written: u64,
}

impl std::fmt::Display for AuditStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries written ({} bytes), {} skipped",
            self.entries_written, self.bytes_written, self.entries_skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::PopulationManager;
    use crate::schema::{FieldConfig, ObservationEvent, ObservationFeed, FeedError};
    use tempfile::tempdir;

    struct OneShot(Option<Vec<ObservationEvent>>);

    impl ObservationFeed for OneShot {
        fn poll_batch(&mut self, _max: usize) -> Result<Vec<ObservationEvent>, FeedError> {
            Ok(self.0.take().unwrap_or_default())
        }
    }

    fn tick_report() -> TickReport {
        let config = FieldConfig {
            random_seed: Some(11),
            ..FieldConfig::default()
        };
        let mut manager = PopulationManager::new(config).unwrap();
        let mut feed = OneShot(Some(vec![
            ObservationEvent::now("user", "first", 0.1),
            ObservationEvent::now("user", "second", -0.1),
        ]));
        manager.tick(&mut feed)
    }

    #[test]
    fn test_recorder_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");
        let report = tick_report();

        let mut recorder = AuditRecorder::open(&path, RecorderConfig::default()).unwrap();
        let written = recorder.record_tick(&report).unwrap();
        assert_eq!(written, 2 + 25);
        let stats = recorder.finish().unwrap();
        assert_eq!(stats.entries_written, 27);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 27);
        assert_eq!(stats.bytes_written, content.len() as u64);

        // Reopening appends rather than truncating.
        let mut recorder = AuditRecorder::open(&path, RecorderConfig::default()).unwrap();
        recorder
            .record(&AuditEntry::Observation(ObservationEvent::now("x", "y", 0.0)))
            .unwrap();
        recorder.finish().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 28);
    }

    #[test]
    fn test_recorder_filters() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let report = tick_report();

        let config = RecorderConfig {
            record_observations: false,
            record_fitness: false,
        };
        let mut recorder = AuditRecorder::open(&path, config).unwrap();
        assert_eq!(recorder.record_tick(&report).unwrap(), 0);
        let stats = recorder.finish().unwrap();
        assert_eq!(stats.entries_skipped, 27);
        assert_eq!(stats.entries_written, 0);
    }
}
