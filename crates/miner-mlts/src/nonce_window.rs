use std::collections::HashMap;
use std::sync::Mutex;

/// Nonces accepted within the handshake timeout. A nonce reappearing inside
/// the window fails the handshake (§4.3).
pub struct NonceWindow {
    seen: Mutex<HashMap<String, i64>>,
}

impl NonceWindow {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` (accepted, and recorded) if `nonce` has not been seen
    /// within `timeout_secs` of `now_unix`; otherwise `false` and the
    /// existing record is left untouched.
    pub fn check_and_record(&self, nonce: &str, now_unix: i64, timeout_secs: i64) -> bool {
        let mut seen = self.seen.lock().unwrap();
        if let Some(first_seen) = seen.get(nonce) {
            if now_unix - first_seen < timeout_secs {
                return false;
            }
        }
        seen.insert(nonce.to_string(), now_unix);
        true
    }

    pub fn reap(&self, now_unix: i64, timeout_secs: i64) -> usize {
        let mut seen = self.seen.lock().unwrap();
        let before = seen.len();
        seen.retain(|_, first_seen| now_unix - *first_seen < timeout_secs);
        before - seen.len()
    }
}

impl Default for NonceWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_use_is_accepted() {
        let window = NonceWindow::new();
        assert!(window.check_and_record("n1", 0, 60));
    }

    #[test]
    fn replay_within_window_is_rejected() {
        let window = NonceWindow::new();
        assert!(window.check_and_record("n1", 0, 60));
        assert!(!window.check_and_record("n1", 30, 60));
    }

    #[test]
    fn reuse_after_window_is_accepted() {
        let window = NonceWindow::new();
        assert!(window.check_and_record("n1", 0, 60));
        assert!(window.check_and_record("n1", 61, 60));
    }
}
