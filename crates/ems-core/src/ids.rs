//! Local id assignment for records created before the data store confirms them.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

/// Random suffix range appended to the millisecond clock.
const SUFFIX_RANGE: u64 = 1000;

/// Issues ids of the form `now_ms * 1000 + random(0..1000)`.
///
/// Ids are strictly increasing within a process, so sequential creates never
/// collide even inside one millisecond. Values stay below 2^53, which keeps
/// them exact for JavaScript consumers of the same sheet. Two processes can
/// still collide; a server-assigned id replaces the local one when the store
/// returns it.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: Mutex<u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id that `taken` does not report as already in use.
    pub fn next(&self, taken: impl Fn(u64) -> bool) -> u64 {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let suffix = rand::thread_rng().gen_range(0..SUFFIX_RANGE);

        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut candidate = (now_ms * SUFFIX_RANGE + suffix).max(*last + 1);
        while taken(candidate) {
            candidate += 1;
        }
        *last = candidate;
        candidate
    }
}
