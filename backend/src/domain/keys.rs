use std::sync::atomic::{AtomicI64, Ordering};

/// Issues record keys from epoch milliseconds.
///
/// Keys are strictly increasing within the process, so two saves in the same
/// millisecond still get distinct keys.
#[derive(Debug, Default)]
pub struct RecordKeyGenerator {
    last: AtomicI64,
}

impl RecordKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&self, now_millis: i64) -> i64 {
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = if now_millis > last { now_millis } else { last + 1 };
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}
