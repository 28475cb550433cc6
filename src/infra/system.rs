use std::sync::Mutex;

use sysinfo::System;

use crate::application::health::{MemoryProbe, MemorySample};

/// Host memory readings for the health report.
pub struct SysinfoMemoryProbe {
    system: Mutex<System>,
}

impl SysinfoMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        let mut system = self.system.lock().ok()?;
        system.refresh_memory();
        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return None;
        }
        Some(MemorySample {
            used_bytes: system.used_memory(),
            total_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_host_memory() {
        let probe = SysinfoMemoryProbe::new();
        if let Some(sample) = probe.sample() {
            assert!(sample.total_bytes >= sample.used_bytes);
            assert!((0.0..=100.0).contains(&sample.used_percent()));
        }
    }
}
