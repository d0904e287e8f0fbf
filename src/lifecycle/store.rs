use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::model::{StrategyRecord, TransitionRecord};

/// Persistence seam for the lifecycle manager. The core only needs atomic
/// read-modify-write per strategy and a durable append for the transition
/// log; the manager serializes writers per strategy key above this.
pub trait StrategyStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<StrategyRecord>>;
    fn get(&self, id: &str) -> Result<Option<StrategyRecord>>;
    fn upsert(&self, record: &StrategyRecord) -> Result<()>;
    fn append_transition(&self, record: &TransitionRecord) -> Result<()>;
    fn transitions(&self) -> Result<Vec<TransitionRecord>>;
}

/// Roster as one pretty-printed JSON document replaced atomically via a
/// temp-file rename; transitions as an append-only JSON-lines file.
pub struct JsonFileStore {
    roster_path: PathBuf,
    transitions_path: PathBuf,
    // Guards the read-modify-write of the roster document.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(roster_path: &Path, transitions_path: &Path) -> Result<Self> {
        for path in [roster_path, transitions_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        Ok(Self {
            roster_path: roster_path.to_path_buf(),
            transitions_path: transitions_path.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    fn read_roster(&self) -> Result<Vec<StrategyRecord>> {
        if !self.roster_path.exists() {
            return Ok(Vec::new());
        }
        let payload = std::fs::read_to_string(&self.roster_path)
            .with_context(|| format!("failed to read {}", self.roster_path.display()))?;
        serde_json::from_str(&payload).context("failed to parse roster json")
    }

    fn write_roster(&self, roster: &[StrategyRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(roster).context("failed to serialize roster")?;
        let tmp = self.roster_path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.roster_path)
            .with_context(|| format!("failed to replace {}", self.roster_path.display()))?;
        Ok(())
    }
}

impl StrategyStore for JsonFileStore {
    fn load_all(&self) -> Result<Vec<StrategyRecord>> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("roster write lock poisoned"))?;
        self.read_roster()
    }

    fn get(&self, id: &str) -> Result<Option<StrategyRecord>> {
        Ok(self.load_all()?.into_iter().find(|r| r.id == id))
    }

    fn upsert(&self, record: &StrategyRecord) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("roster write lock poisoned"))?;
        let mut roster = self.read_roster()?;
        match roster.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => roster.push(record.clone()),
        }
        self.write_roster(&roster)
    }

    fn append_transition(&self, record: &TransitionRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("failed to serialize transition")?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.transitions_path)
            .with_context(|| format!("failed to open {}", self.transitions_path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append {}", self.transitions_path.display()))?;
        file.sync_data()
            .with_context(|| format!("failed to sync {}", self.transitions_path.display()))?;
        Ok(())
    }

    fn transitions(&self) -> Result<Vec<TransitionRecord>> {
        if !self.transitions_path.exists() {
            return Ok(Vec::new());
        }
        let payload = std::fs::read_to_string(&self.transitions_path)
            .with_context(|| format!("failed to read {}", self.transitions_path.display()))?;
        let mut out = Vec::new();
        for line in payload.lines().filter(|l| !l.trim().is_empty()) {
            out.push(serde_json::from_str(line).context("failed to parse transition line")?);
        }
        Ok(out)
    }
}

/// In-memory store for tests; `fail_writes` simulates a broken disk so
/// surfaced-persistence-failure paths can be exercised.
#[derive(Default)]
pub struct MemoryStore {
    strategies: Mutex<HashMap<String, StrategyRecord>>,
    transition_log: Mutex<Vec<TransitionRecord>>,
    pub fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn writes_failing(&self) -> bool {
        self.fail_writes.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl StrategyStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<StrategyRecord>> {
        let guard = self
            .strategies
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        let mut all: Vec<_> = guard.values().cloned().collect();
        all.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    fn get(&self, id: &str) -> Result<Option<StrategyRecord>> {
        let guard = self
            .strategies
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(guard.get(id).cloned())
    }

    fn upsert(&self, record: &StrategyRecord) -> Result<()> {
        if self.writes_failing() {
            anyhow::bail!("simulated write failure");
        }
        let mut guard = self
            .strategies
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        guard.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn append_transition(&self, record: &TransitionRecord) -> Result<()> {
        if self.writes_failing() {
            anyhow::bail!("simulated write failure");
        }
        let mut guard = self
            .transition_log
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        guard.push(record.clone());
        Ok(())
    }

    fn transitions(&self) -> Result<Vec<TransitionRecord>> {
        let guard = self
            .transition_log
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(guard.clone())
    }
}
