use std::sync::{Mutex, MutexGuard, OnceLock};

/// Serialises tests that read or modify process environment variables
/// used during settings expansion.
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
