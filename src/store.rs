// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Cycle Store

//! Persistence of the ordered cycle sequence.
//!
//! The store is a single JSON array rewritten in full on every save. Writes go
//! through a sibling temp file and a rename so a crash never leaves a
//! truncated store behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};
use crate::types::CycleRecord;

pub trait CycleStore {
    /// Full sequence in cycle order; empty when the store was never written.
    fn load(&self) -> EngineResult<Vec<CycleRecord>>;

    /// Replace the whole sequence.
    fn save(&self, cycles: &[CycleRecord]) -> EngineResult<()>;
}

// ─── JsonFileStore ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record next to the store as `cycle-{n}.json`.
    pub fn write_cycle_file(&self, record: &CycleRecord) -> EngineResult<PathBuf> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let target = dir.join(format!("cycle-{}.json", record.cycle));
        write_json_atomic(&target, record)?;
        Ok(target)
    }
}

impl CycleStore for JsonFileStore {
    fn load(&self) -> EngineResult<Vec<CycleRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("store {} not found, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(EngineError::Persistence(format!("{}: {e}", self.path.display()))),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw)
            .map_err(|e| EngineError::Persistence(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, cycles: &[CycleRecord]) -> EngineResult<()> {
        write_json_atomic(&self.path, cycles)
    }
}

/// Pretty-print `value` to `path` via a synced temp file and a rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> EngineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_vec_pretty(value)?;

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&body)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        EngineError::Persistence(format!("{}: {e}", path.display()))
    })
}

// ─── MemoryStore ─────────────────────────────────────────────────────────────

/// In-process store for the browser build and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cycles: Mutex<Vec<CycleRecord>>,
    fail_saves: bool,
}

impl MemoryStore {
    pub fn new(cycles: Vec<CycleRecord>) -> Self {
        Self {
            cycles: Mutex::new(cycles),
            fail_saves: false,
        }
    }

    /// A store whose saves always fail, for exercising degraded refreshes.
    pub fn read_only(cycles: Vec<CycleRecord>) -> Self {
        Self {
            cycles: Mutex::new(cycles),
            fail_saves: true,
        }
    }

    pub fn snapshot(&self) -> Vec<CycleRecord> {
        self.cycles.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CycleStore for MemoryStore {
    fn load(&self) -> EngineResult<Vec<CycleRecord>> {
        self.cycles
            .lock()
            .map(|c| c.clone())
            .map_err(|_| EngineError::Persistence("memory store poisoned".into()))
    }

    fn save(&self, cycles: &[CycleRecord]) -> EngineResult<()> {
        if self.fail_saves {
            return Err(EngineError::Persistence("store is read-only".into()));
        }
        let mut guard = self
            .cycles
            .lock()
            .map_err(|_| EngineError::Persistence("memory store poisoned".into()))?;
        *guard = cycles.to_vec();
        Ok(())
    }
}

impl<S: CycleStore + ?Sized> CycleStore for Box<S> {
    fn load(&self) -> EngineResult<Vec<CycleRecord>> {
        (**self).load()
    }

    fn save(&self, cycles: &[CycleRecord]) -> EngineResult<()> {
        (**self).save(cycles)
    }
}
