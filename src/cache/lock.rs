use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// A panic while holding the lock leaves the cache readable. Worst case the
/// caller sees a stale entry that expires on its own.
fn recover<G>(poisoned: PoisonError<G>, store: &'static str, op: &'static str, kind: &str) -> G {
    warn!(
        target: "yatube::cache::lock",
        store,
        op,
        lock_kind = kind,
        result = "poisoned_recovered",
        "Recovered from poisoned cache lock"
    );
    poisoned.into_inner()
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| recover(poisoned, store, op, "rwlock.read"))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, store, op, "rwlock.write"))
}
