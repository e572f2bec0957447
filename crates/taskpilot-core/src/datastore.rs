use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::app_data::AppData;

/// Oldest snapshots are dropped past this many.
pub const UNDO_LIMIT: usize = 100;

#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub data_path: PathBuf,
    pub undo_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let data_path = data_dir.join("taskpilot.json");
        let undo_path = data_dir.join("undo.data");

        if !data_path.exists() {
            fs::write(&data_path, "")?;
        }
        if !undo_path.exists() {
            fs::write(&undo_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            data = %data_path.display(),
            undo = %undo_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            data_path,
            undo_path,
        })
    }

    /// Reads the document. An empty file is a fresh, empty document.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<AppData> {
        let raw = fs::read_to_string(&self.data_path)
            .with_context(|| format!("failed reading {}", self.data_path.display()))?;
        if raw.trim().is_empty() {
            debug!("data file empty, starting fresh");
            return Ok(AppData::default());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.data_path.display()))
    }

    #[tracing::instrument(skip(self, data))]
    pub fn save(&self, data: &AppData) -> anyhow::Result<()> {
        let mut serialized = serde_json::to_string_pretty(data)?;
        serialized.push('\n');
        write_atomic(&self.data_path, serialized.as_bytes())
            .context("failed to save taskpilot.json")
    }

    #[tracing::instrument(skip(self, data))]
    pub fn push_undo_snapshot(&self, data: &AppData) -> anyhow::Result<()> {
        let mut entries = load_undo_entries(&self.undo_path)?;
        entries.push(data.clone());
        if entries.len() > UNDO_LIMIT {
            let excess = entries.len() - UNDO_LIMIT;
            entries.drain(..excess);
        }
        save_jsonl_atomic(&self.undo_path, &entries).context("failed to save undo.data")
    }

    /// Hands the newest snapshot to `apply` and drops it from the journal only
    /// if `apply` succeeds. Returns `None` when the journal is empty.
    #[tracing::instrument(skip(self, apply))]
    pub fn pop_undo_snapshot_with<T>(
        &self,
        apply: impl FnOnce(AppData) -> anyhow::Result<T>,
    ) -> anyhow::Result<Option<T>> {
        let mut entries = load_undo_entries(&self.undo_path)?;
        let Some(entry) = entries.pop() else {
            return Ok(None);
        };
        let out = apply(entry)?;
        save_jsonl_atomic(&self.undo_path, &entries).context("failed to save undo.data")?;
        Ok(Some(out))
    }

    pub fn undo_depth(&self) -> anyhow::Result<usize> {
        Ok(load_undo_entries(&self.undo_path)?.len())
    }
}

#[tracing::instrument(skip(path))]
fn load_undo_entries(path: &Path) -> anyhow::Result<Vec<AppData>> {
    debug!(file = %path.display(), "loading undo entries");
    let file = fs::File::open(path)
        .with_context(|| format!("failed opening {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry: AppData = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(entry);
    }

    Ok(out)
}

#[tracing::instrument(skip(path, entries))]
fn save_jsonl_atomic<T: Serialize>(path: &Path, entries: &[T]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = entries.len(), "saving jsonl atomically");
    let mut buf = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut buf, entry)?;
        buf.push(b'\n');
    }
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DataStore, UNDO_LIMIT};
    use crate::app_data::AppData;

    #[test]
    fn empty_file_loads_as_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        let data = store.load().expect("load");
        assert!(data.projects.is_empty());
        assert_eq!(data.scratchpad_content, "");
        assert!(store.pop_undo_snapshot_with(Ok).expect("pop").is_none());
    }

    #[test]
    fn undo_journal_is_capped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        for n in 0..UNDO_LIMIT + 3 {
            let data = AppData {
                scratchpad_content: n.to_string(),
                ..AppData::default()
            };
            store.push_undo_snapshot(&data).expect("push");
        }
        assert_eq!(store.undo_depth().expect("depth"), UNDO_LIMIT);

        let newest = store.pop_undo_snapshot_with(Ok).expect("pop").expect("entry");
        assert_eq!(newest.scratchpad_content, (UNDO_LIMIT + 2).to_string());
    }

    #[test]
    fn failed_undo_keeps_the_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        store.push_undo_snapshot(&AppData::default()).expect("push");

        let result = store.pop_undo_snapshot_with(|_| -> anyhow::Result<()> {
            anyhow::bail!("cannot apply")
        });
        assert!(result.is_err());
        assert_eq!(store.undo_depth().expect("depth"), 1);

        assert!(store.pop_undo_snapshot_with(|_| Ok(())).expect("pop").is_some());
        assert_eq!(store.undo_depth().expect("depth"), 0);
    }

    #[test]
    fn corrupt_document_names_the_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open");
        std::fs::write(&store.data_path, "{not json").expect("write");
        let err = store.load().expect_err("corrupt");
        assert!(format!("{err:#}").contains("taskpilot.json"));
    }
}
