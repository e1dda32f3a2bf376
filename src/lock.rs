use std::sync::{Mutex, MutexGuard};

/// Lock `lock`, taking the inner value back if a previous holder panicked.
///
/// The analyser mutex is shared with the device callback thread, so a panic
/// there must not wedge the detection loop.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        tracing::warn!(context, "mutex poisoned; recovering inner state");
        crate::log_debug(&format!("Mutex poisoned in {context}; recovering"));
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn recovers_after_poisoning_panic() {
        let shared = Arc::new(Mutex::new(7u32));
        let clone = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(shared.is_poisoned());
        let guard = lock_or_recover(&shared, "test");
        assert_eq!(*guard, 7);
    }
}
