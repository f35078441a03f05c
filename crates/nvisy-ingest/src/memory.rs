//! Best-effort resident memory estimation, used by the metrics ticker's
//! memory-pressure check.

/// Returns the process's resident set size in MiB, or `0` if it cannot be
/// determined (non-Linux platforms, or a malformed `/proc` entry).
///
/// This intentionally avoids pulling in a full system-info crate: the core
/// only needs a coarse, cheap-to-sample number to compare against
/// [`crate::config::IngestConfig::memory_threshold_bytes`].
pub fn resident_set_size_mb() -> u64 {
    read_vm_rss_kb().map(|kb| kb / 1024).unwrap_or(0)
}

#[cfg(target_os = "linux")]
fn read_vm_rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest.trim().split_whitespace().next()?.parse().ok();
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn read_vm_rss_kb() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_panic_on_any_platform() {
        let _ = resident_set_size_mb();
    }
}
