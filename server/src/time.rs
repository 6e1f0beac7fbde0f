//! Unix clock helpers for activity tracking and queue timestamps

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix time in whole seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Current unix time in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clocks_agree() {
        let secs = now_secs();
        let millis = now_millis();
        assert!(millis / 1000 >= secs);
        assert!(millis / 1000 - secs <= 2);
    }
}
