// src/utils/url.rs

//! URL validation and state-key fingerprinting.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use url::Url;

use crate::models::TargetConfig;

/// Length of a state-key fingerprint in characters.
pub const FINGERPRINT_LEN: usize = 12;

/// Check that `candidate` points at a watchable page of the target site.
///
/// Scheme and host must match exactly and the path must start with the
/// configured prefix. Anything that fails to parse is simply not valid.
///
/// # Examples
/// ```
/// use seatwatch::models::TargetConfig;
/// use seatwatch::utils::url::is_valid_target_url;
///
/// let target = TargetConfig::default();
/// assert!(is_valid_target_url("https://testflight.apple.com/join/AbCdEf12", &target));
/// assert!(!is_valid_target_url("https://example.com/join/AbCdEf12", &target));
/// ```
pub fn is_valid_target_url(candidate: &str, target: &TargetConfig) -> bool {
    let Ok(parsed) = Url::parse(candidate.trim()) else {
        return false;
    };

    parsed.scheme() == target.scheme
        && parsed
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&target.host))
        && parsed.path().starts_with(&target.path_prefix)
}

/// Stable short identifier for a URL: truncated hex SHA-1.
///
/// This is the derivation existing `state-<fingerprint>.json` records are
/// keyed by, so it must not change.
///
/// # Examples
/// ```
/// use seatwatch::utils::url::fingerprint;
///
/// let a = fingerprint("https://testflight.apple.com/join/AbCdEf12");
/// assert_eq!(a.len(), 12);
/// assert_eq!(a, fingerprint("https://testflight.apple.com/join/AbCdEf12"));
/// ```
pub fn fingerprint(url: &str) -> String {
    truncated_hex(Sha1::digest(url.as_bytes()))
}

/// Truncated hex SHA-256, for stores that opted out of the SHA-1 keys.
pub fn sha256_fingerprint(url: &str) -> String {
    truncated_hex(Sha256::digest(url.as_bytes()))
}

fn truncated_hex(digest: impl AsRef<[u8]>) -> String {
    let mut encoded = hex::encode(digest);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}

/// Digest-free identifier: the URL's ASCII alphanumerics, truncated.
///
/// URLs sharing a long common prefix collide, so this is only a fallback.
pub fn degraded_fingerprint(url: &str) -> String {
    url.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(FINGERPRINT_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetConfig {
        TargetConfig::default()
    }

    #[test]
    fn test_valid_join_urls() {
        let t = target();
        assert!(is_valid_target_url("https://testflight.apple.com/join/AbCdEf12", &t));
        assert!(is_valid_target_url("https://testflight.apple.com/join/x?ref=1", &t));
        assert!(is_valid_target_url("  https://TestFlight.apple.com/join/x  ", &t));
    }

    #[test]
    fn test_wrong_host() {
        let t = target();
        assert!(!is_valid_target_url("https://apple.com/join/AbCdEf12", &t));
        assert!(!is_valid_target_url("https://testflight.apple.com.evil.io/join/x", &t));
    }

    #[test]
    fn test_wrong_scheme() {
        let t = target();
        assert!(!is_valid_target_url("http://testflight.apple.com/join/AbCdEf12", &t));
        assert!(!is_valid_target_url("ftp://testflight.apple.com/join/AbCdEf12", &t));
    }

    #[test]
    fn test_missing_path_prefix() {
        let t = target();
        assert!(!is_valid_target_url("https://testflight.apple.com/", &t));
        assert!(!is_valid_target_url("https://testflight.apple.com/v1/join/x", &t));
        assert!(!is_valid_target_url("https://testflight.apple.com/joinx", &t));
    }

    #[test]
    fn test_malformed_input() {
        let t = target();
        assert!(!is_valid_target_url("", &t));
        assert!(!is_valid_target_url("not a url", &t));
        assert!(!is_valid_target_url("testflight.apple.com/join/x", &t));
        assert!(!is_valid_target_url("https://", &t));
    }

    #[test]
    fn test_custom_target() {
        let t = TargetConfig {
            scheme: "http".into(),
            host: "127.0.0.1".into(),
            path_prefix: "/join/".into(),
            full_marker: "full".into(),
        };
        assert!(is_valid_target_url("http://127.0.0.1:8080/join/abc", &t));
        assert!(!is_valid_target_url("https://127.0.0.1:8080/join/abc", &t));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let url = "https://testflight.apple.com/join/AbCdEf12";
        let first = fingerprint(url);
        for _ in 0..5 {
            assert_eq!(fingerprint(url), first);
        }
        assert_eq!(first.len(), FINGERPRINT_LEN);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_fingerprint_known_value() {
        // sha1("abc") = a9993e364706816a...
        assert_eq!(fingerprint("abc"), "a9993e364706");
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(sha256_fingerprint("abc"), "ba7816bf8f01");
    }

    #[test]
    fn test_sha256_keys_differ_from_default() {
        let url = "https://testflight.apple.com/join/AbCdEf12";
        assert_ne!(fingerprint(url), sha256_fingerprint(url));
        assert_eq!(sha256_fingerprint(url).len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_fingerprint_distinguishes_urls() {
        assert_ne!(
            fingerprint("https://testflight.apple.com/join/aaaa"),
            fingerprint("https://testflight.apple.com/join/aaab")
        );
    }

    #[test]
    fn test_degraded_fingerprint() {
        assert_eq!(
            degraded_fingerprint("https://testflight.apple.com/join/x"),
            "httpstestfli"
        );
        assert_eq!(degraded_fingerprint("a-b"), "ab");
    }
}
