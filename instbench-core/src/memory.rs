//! Resident memory sampling for the current process

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::error::{BenchError, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of resident-memory readings, in megabytes.
pub trait MemoryProbe {
    fn resident_mb(&mut self) -> Result<f64>;
}

/// Reads the RSS of this process through `sysinfo`
pub struct ProcessMemory {
    system: System,
    pid: Pid,
}

impl ProcessMemory {
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| BenchError::Memory(e.to_string()))?;
        Ok(Self {
            system: System::new(),
            pid,
        })
    }
}

impl MemoryProbe for ProcessMemory {
    fn resident_mb(&mut self) -> Result<f64> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| BenchError::Memory(format!("process {} not visible", self.pid)))?;
        Ok(process.memory() as f64 / BYTES_PER_MB)
    }
}
