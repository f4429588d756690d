use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock `mutex`, taking the guard back if a previous holder panicked.
pub(crate) fn lock_or_recover<'a, T>(
  mutex: &'a Mutex<T>,
  what: &'static str,
) -> MutexGuard<'a, T> {
  match mutex.lock() {
    Ok(guard) => guard,
    Err(poisoned) => {
      warn!(what, "recovered poisoned lock");
      poisoned.into_inner()
    }
  }
}
