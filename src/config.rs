
/// Property polled by the unleashed backend daemon. The daemon maps its
/// value to cpufreq caps and a mi_thermald profile.
pub const MODE_PROP: &str = "persist.unleashed.mode";

/// Elevation binary. Magisk and KernelSU both put a `su` on PATH.
pub const SU_BIN: &str = "su";

/// The backend refreshes its settings at most once per minute, so an
/// applied mode can take this long to become visible.
pub const APPLY_HINT_SECS: u64 = 60;

// Main loop tick; config changes are rare.
pub const LOOP_TICK_MS: u64 = 1500;

// Bounds for the property re-read period.
pub const REFRESH_SECS_MIN: u64 = 5;
pub const REFRESH_SECS_MAX: u64 = 3600;
