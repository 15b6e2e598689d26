use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub struct CacheKeys;

impl CacheKeys {
    /// Cached analysis result: tl:analysis:{fingerprint}
    pub fn analysis(fingerprint: &str) -> String {
        format!("tl:analysis:{}", fingerprint)
    }

    /// Computation lock: tl:lock:{fingerprint}
    pub fn lock(fingerprint: &str) -> String {
        format!("tl:lock:{}", fingerprint)
    }

    /// Fingerprint identifying one logical analysis request.
    ///
    /// SHA-256 over (requesting user, normalized username, UTC calendar day),
    /// hex-encoded. Repeats of the same request within a day hash to the
    /// same fingerprint; a new day, user, or profile produces a new one.
    pub fn request_fingerprint(user_id: Uuid, username: &str, day: NaiveDate) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"user:");
        hasher.update(user_id.as_bytes());
        hasher.update(b"\x00");
        hasher.update(b"profile:");
        hasher.update(username.as_bytes());
        hasher.update(b"\x00");
        hasher.update(b"day:");
        hasher.update(day.format("%Y-%m-%d").to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let user = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let a = CacheKeys::request_fingerprint(user, "khaby.lame", day(2026, 8, 26));
        let b = CacheKeys::request_fingerprint(user, "khaby.lame", day(2026, 8, 26));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_varies_by_user_profile_and_day() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let base = CacheKeys::request_fingerprint(user, "khaby.lame", day(2026, 8, 26));

        assert_ne!(
            base,
            CacheKeys::request_fingerprint(other, "khaby.lame", day(2026, 8, 26))
        );
        assert_ne!(
            base,
            CacheKeys::request_fingerprint(user, "zachking", day(2026, 8, 26))
        );
        assert_ne!(
            base,
            CacheKeys::request_fingerprint(user, "khaby.lame", day(2026, 8, 27))
        );
    }

    #[test]
    fn key_formats() {
        assert_eq!(CacheKeys::analysis("abc123"), "tl:analysis:abc123");
        assert_eq!(CacheKeys::lock("abc123"), "tl:lock:abc123");
    }
}
