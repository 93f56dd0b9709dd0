use crate::common::{EventEnvelope, EventJournal};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Appends controller events to a single JSON Lines file.
pub struct FileEventJournal {
    path: PathBuf,
}

impl FileEventJournal {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_parent_dir(&self) -> Result<(), String> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create journal directory {}: {}", parent.display(), e)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EventJournal for FileEventJournal {
    async fn append(&self, events: Vec<EventEnvelope>) -> Result<(), String> {
        self.ensure_parent_dir().await?;

        let mut buffer = Vec::new();
        for event in &events {
            let line = serde_json::to_string(event)
                .map_err(|e| format!("Failed to serialize event {}: {}", event.event_id, e))?;
            buffer.extend_from_slice(line.as_bytes());
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| format!("Failed to open journal {}: {}", self.path.display(), e))?;
        file.write_all(&buffer)
            .await
            .map_err(|e| format!("Failed to write journal: {}", e))?;
        file.flush()
            .await
            .map_err(|e| format!("Failed to flush journal: {}", e))?;
        Ok(())
    }

    async fn load(&self) -> Result<Vec<EventEnvelope>, String> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(vec![]);
        }

        let file = File::open(&self.path)
            .await
            .map_err(|e| format!("Failed to open journal {}: {}", self.path.display(), e))?;
        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();
        let mut line_number = 0u64;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| format!("Failed to read journal: {}", e))?
        {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let event: EventEnvelope = serde_json::from_str(&line)
                .map_err(|e| format!("Corrupt journal entry at line {}: {}", line_number, e))?;
            events.push(event);
        }
        Ok(events)
    }
}
