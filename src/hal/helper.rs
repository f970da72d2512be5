use std::{thread, time::Duration};

/// Blocking wait used for hardware settle times and status polling.
pub fn wait_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}
