//! Session management for saving and loading conversations
//!
//! A session file is JSONL: one metadata line, then one full snapshot per
//! line. The last snapshot wins when loading. Once enough snapshots pile up
//! the file is rewritten down to the metadata and the latest snapshot.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use twig_engine::ConversationSnapshot;

/// Snapshots appended before the file is compacted
const COMPACT_AFTER: usize = 32;

/// Session entry types for JSONL format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEntry {
    /// Session metadata
    Metadata {
        id: String,
        created_at: i64,
        working_dir: String,
    },
    /// Full conversation state after a change
    Snapshot {
        snapshot: ConversationSnapshot,
        timestamp: i64,
    },
}

/// Session manager for persisting conversations
pub struct SessionManager {
    /// Session ID (same as the conversation id)
    id: String,
    /// Path to the session file
    path: PathBuf,
    /// First line of the file, rewritten on compaction
    metadata: SessionEntry,
    /// Writer for appending entries
    writer: BufWriter<File>,
    /// Snapshot lines currently in the file
    snapshots: usize,
}

impl SessionManager {
    /// Create a new session file in `dir`
    pub fn new(dir: &Path, id: &str) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;

        let path = session_path(dir, id);
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        let metadata = new_metadata(id);
        writeln!(writer, "{}", serde_json::to_string(&metadata)?)?;
        writer.flush()?;

        tracing::debug!(id, path = %path.display(), "created session");
        Ok(Self {
            id: id.to_string(),
            path,
            metadata,
            writer,
            snapshots: 0,
        })
    }

    /// Load an existing session, returning its latest snapshot if it has one
    pub fn load(dir: &Path, id: &str) -> std::io::Result<(Self, Option<ConversationSnapshot>)> {
        let path = session_path(dir, id);

        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Session not found: {}", id),
            ));
        }

        let mut latest = None;
        let mut metadata = None;
        let mut snapshots = 0;
        for (lineno, line) in BufReader::new(File::open(&path)?).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionEntry>(&line) {
                Ok(SessionEntry::Snapshot { snapshot, .. }) => {
                    snapshots += 1;
                    latest = Some(snapshot);
                }
                Ok(entry @ SessionEntry::Metadata { .. }) => {
                    metadata.get_or_insert(entry);
                }
                Err(e) => tracing::warn!("Skipping unreadable line {} in {}: {}", lineno + 1, id, e),
            }
        }

        let file = File::options().append(true).open(&path)?;
        let mut manager = Self {
            id: id.to_string(),
            metadata: metadata.unwrap_or_else(|| new_metadata(id)),
            path,
            writer: BufWriter::new(file),
            snapshots,
        };
        if snapshots > 1 {
            if let Some(snapshot) = &latest {
                manager.compact(snapshot)?;
            }
        }
        Ok((manager, latest))
    }

    /// Get session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the session file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the current conversation state, compacting the file once it
    /// holds `COMPACT_AFTER` snapshots
    pub fn save_snapshot(&mut self, snapshot: &ConversationSnapshot) -> std::io::Result<()> {
        if self.snapshots >= COMPACT_AFTER {
            return self.compact(snapshot);
        }
        writeln!(self.writer, "{}", serde_json::to_string(&snapshot_entry(snapshot))?)?;
        self.writer.flush()?;
        self.snapshots += 1;
        Ok(())
    }

    /// Replace the file with the metadata line and `snapshot`.
    ///
    /// Written to a sibling temp file first and renamed over the original.
    fn compact(&mut self, snapshot: &ConversationSnapshot) -> std::io::Result<()> {
        self.writer.flush()?;
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            writeln!(out, "{}", serde_json::to_string(&self.metadata)?)?;
            writeln!(out, "{}", serde_json::to_string(&snapshot_entry(snapshot))?)?;
            out.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        self.writer = BufWriter::new(File::options().append(true).open(&self.path)?);

        tracing::debug!(id = %self.id, replaced = self.snapshots, "compacted session");
        self.snapshots = 1;
        Ok(())
    }

    /// List all sessions in `dir`, newest first
    pub fn list_sessions(dir: &Path) -> std::io::Result<Vec<SessionInfo>> {
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut sessions = Vec::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                if let Some(info) = Self::read_session_info(&path) {
                    sessions.push(info);
                }
            }
        }

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(sessions)
    }

    fn read_session_info(path: &Path) -> Option<SessionInfo> {
        let reader = BufReader::new(File::open(path).ok()?);
        let mut lines = reader.lines().map_while(Result::ok);

        let Ok(SessionEntry::Metadata {
            id,
            created_at,
            working_dir,
        }) = serde_json::from_str(&lines.next()?)
        else {
            return None;
        };

        let mut snapshot_count = 0;
        let mut message_count = 0;
        for line in lines {
            if let Ok(SessionEntry::Snapshot { snapshot, .. }) = serde_json::from_str(&line) {
                snapshot_count += 1;
                message_count = snapshot.len();
            }
        }

        Some(SessionInfo {
            id,
            created_at,
            working_dir,
            snapshot_count,
            message_count,
        })
    }

    /// Delete a session
    pub fn delete(dir: &Path, id: &str) -> std::io::Result<()> {
        fs::remove_file(session_path(dir, id))
    }
}

fn session_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{}.jsonl", id))
}

fn new_metadata(id: &str) -> SessionEntry {
    SessionEntry::Metadata {
        id: id.to_string(),
        created_at: chrono::Utc::now().timestamp_millis(),
        working_dir: std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| ".".to_string()),
    }
}

fn snapshot_entry(snapshot: &ConversationSnapshot) -> SessionEntry {
    SessionEntry::Snapshot {
        snapshot: snapshot.clone(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

/// Information about a saved session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: i64,
    pub working_dir: String,
    pub snapshot_count: usize,
    /// Node count in the latest snapshot
    pub message_count: usize,
}

impl SessionInfo {
    /// Format the created_at timestamp for display
    pub fn created_at_display(&self) -> String {
        use chrono::{TimeZone, Utc};
        Utc.timestamp_millis_opt(self.created_at)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twig_engine::{ChatMessage, Conversation};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("twig-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_last_snapshot_wins() {
        let dir = temp_dir();
        let mut conv = Conversation::with_id("s1");
        let mut session = SessionManager::new(&dir, conv.id()).unwrap();

        conv.add_message(ChatMessage::system("sys")).unwrap();
        session.save_snapshot(&conv.snapshot()).unwrap();
        conv.add_message(ChatMessage::user("hi")).unwrap();
        session.save_snapshot(&conv.snapshot()).unwrap();
        drop(session);

        let (loaded, snapshot) = SessionManager::load(&dir, "s1").unwrap();
        assert_eq!(loaded.id(), "s1");
        assert_eq!(snapshot, Some(conv.snapshot()));

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_missing_session() {
        let dir = temp_dir();
        let err = SessionManager::load(&dir, "nope").err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_skips_corrupt_lines() {
        let dir = temp_dir();
        let mut conv = Conversation::with_id("s2");
        let mut session = SessionManager::new(&dir, conv.id()).unwrap();
        conv.add_message(ChatMessage::user("hi")).unwrap();
        session.save_snapshot(&conv.snapshot()).unwrap();
        let path = session.path().to_path_buf();
        drop(session);

        let mut file = File::options().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let (_, snapshot) = SessionManager::load(&dir, "s2").unwrap();
        assert_eq!(snapshot.map(|s| s.len()), Some(1));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_list_and_delete() {
        let dir = temp_dir();
        let mut conv = Conversation::with_id("listed");
        let mut session = SessionManager::new(&dir, conv.id()).unwrap();
        conv.add_message(ChatMessage::system("sys")).unwrap();
        conv.add_message(ChatMessage::user("hi")).unwrap();
        session.save_snapshot(&conv.snapshot()).unwrap();
        drop(session);
        SessionManager::new(&dir, "empty").unwrap();

        let sessions = SessionManager::list_sessions(&dir).unwrap();
        assert_eq!(sessions.len(), 2);
        let listed = sessions.iter().find(|s| s.id == "listed").unwrap();
        assert_eq!(listed.snapshot_count, 1);
        assert_eq!(listed.message_count, 2);
        assert_ne!(listed.created_at_display(), "unknown");

        SessionManager::delete(&dir, "listed").unwrap();
        let remaining = SessionManager::list_sessions(&dir).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "empty");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_compaction_bounds_file_size() {
        let dir = temp_dir();
        let mut conv = Conversation::with_id("busy");
        let mut session = SessionManager::new(&dir, conv.id()).unwrap();
        conv.add_message(ChatMessage::system("sys")).unwrap();
        for i in 0..COMPACT_AFTER + 3 {
            conv.add_message(ChatMessage::user(format!("m{}", i))).unwrap();
            session.save_snapshot(&conv.snapshot()).unwrap();
        }
        let path = session.path().to_path_buf();
        drop(session);

        let line_count = |p: &Path| fs::read_to_string(p).unwrap().lines().count();
        // metadata, the compacted snapshot, then two appended after it
        assert_eq!(line_count(&path), 4);

        let (_, snapshot) = SessionManager::load(&dir, "busy").unwrap();
        assert_eq!(snapshot, Some(conv.snapshot()));
        assert_eq!(line_count(&path), 2);

        let info = SessionManager::list_sessions(&dir).unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].id, "busy");
        assert_eq!(info[0].snapshot_count, 1);
        assert_eq!(info[0].message_count, COMPACT_AFTER + 4);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = std::env::temp_dir().join(format!("twig-missing-{}", uuid::Uuid::new_v4()));
        assert!(SessionManager::list_sessions(&dir).unwrap().is_empty());
    }
}
