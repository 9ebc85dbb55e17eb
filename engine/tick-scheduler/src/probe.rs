//! Host capability probe

use std::sync::OnceLock;

static HIGH_RESOLUTION: OnceLock<bool> = OnceLock::new();

/// Whether a monotonic high-resolution clock is available to this process.
///
/// Evaluated once per process; later calls return the cached answer.
pub fn high_resolution_available() -> bool {
    *HIGH_RESOLUTION.get_or_init(probe)
}

fn probe() -> bool {
    // bare wasm has no time source; `Instant::now` panics there
    let available = !cfg!(all(target_arch = "wasm32", target_os = "unknown"));
    tracing::debug!("High-resolution monotonic clock available: {}", available);
    available
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_is_cached() {
        let first = high_resolution_available();
        assert_eq!(high_resolution_available(), first);
        assert_eq!(HIGH_RESOLUTION.get().copied(), Some(first));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_targets_have_monotonic_clock() {
        assert!(high_resolution_available());
    }
}
