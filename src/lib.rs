pub mod aggregator;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod focus_cache;
pub mod ledger;
pub mod platform;
pub mod store;
#[cfg(test)]
mod test_utils;
pub mod timer;
pub mod tracker;
pub mod validation;

use log::warn;
use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context} mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
