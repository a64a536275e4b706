//! Audit player for reading back recorded entries.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use super::format::{AuditEntry, decode_entry};

/// Reads a JSON-lines audit file.
///
/// Usage:
/// ```ignore
/// let player = AuditPlayer::open("field.audit.jsonl")?;
/// let recent = player.tail(500);
/// manager.replay(&recent);
/// ```
pub struct AuditPlayer {
    entries: Vec<AuditEntry>,
}

impl AuditPlayer {
    /// Read and validate every entry in `path`. Blank lines are ignored.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(decode_entry(&line, index + 1)?);
        }
        Ok(Self { entries })
    }

    /// Read only the last `n` entries, holding at most `n` in memory.
    pub fn open_tail<P: AsRef<Path>>(path: P, n: usize) -> io::Result<Vec<AuditEntry>> {
        let reader = BufReader::new(File::open(path)?);
        let mut tail = VecDeque::with_capacity(n);
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = decode_entry(&line, index + 1)?;
            if n == 0 {
                continue;
            }
            if tail.len() == n {
                tail.pop_front();
            }
            tail.push_back(entry);
        }
        Ok(tail.into())
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` entries in file order.
    pub fn tail(&self, n: usize) -> &[AuditEntry] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditRecorder, RecorderConfig};
    use crate::schema::ObservationEvent;
    use std::fs;
    use tempfile::tempdir;

    fn observation(i: usize) -> AuditEntry {
        AuditEntry::Observation(ObservationEvent::now("test", format!("event {i}"), 0.0))
    }

    #[test]
    fn test_round_trip_and_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let mut recorder = AuditRecorder::open(&path, RecorderConfig::default()).unwrap();
        let written: Vec<_> = (0..10).map(observation).collect();
        for entry in &written {
            recorder.record(entry).unwrap();
        }
        recorder.finish().unwrap();

        let player = AuditPlayer::open(&path).unwrap();
        assert_eq!(player.len(), 10);
        assert_eq!(player.entries(), &written[..]);
        assert_eq!(player.tail(3), &written[7..]);
        assert_eq!(player.tail(50).len(), 10);
        assert!(player.tail(0).is_empty());

        let tail = AuditPlayer::open_tail(&path, 4).unwrap();
        assert_eq!(tail, written[6..].to_vec());
        assert!(AuditPlayer::open_tail(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line_is_invalid_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        let good = crate::audit::encode_entry(&observation(0)).unwrap();
        fs::write(&path, format!("{good}\n\n{{not json\n")).unwrap();

        let err = AuditPlayer::open(&path).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = AuditPlayer::open(dir.path().join("absent.jsonl")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
