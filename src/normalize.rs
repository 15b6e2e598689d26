//! Input normalization for profile references and hashtags.
//!
//! Clients submit anything from a bare username to a full profile URL with
//! query strings. Everything downstream (fingerprints, cache keys, provider
//! calls) works on the normalized username, so two spellings of the same
//! profile collapse to one logical request.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("profile input is empty")]
    Empty,
    #[error("no username found in input")]
    NoUsername,
    #[error("invalid hashtag format")]
    InvalidHashtag,
}

fn username_charset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._]").expect("valid regex"))
}

fn hashtag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\w+").expect("valid regex"))
}

/// Extract a clean username from a profile URL, `@handle`, or bare name.
///
/// URLs keep only the first path segment (minus a leading `@`); everything
/// outside `[A-Za-z0-9._]` is stripped. Errors when nothing usable remains.
pub fn normalize_profile_input(input: &str) -> Result<String, NormalizeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let raw = if input.starts_with("http://") || input.starts_with("https://") {
        let parsed = Url::parse(input).map_err(|_| NormalizeError::NoUsername)?;
        let path = parsed.path().trim_matches('/');
        let first = path.split('/').next().unwrap_or_default();
        first.strip_prefix('@').unwrap_or(first).to_string()
    } else {
        input.trim_start_matches('@').to_string()
    };

    let username = username_charset().replace_all(&raw, "").into_owned();
    if username.is_empty() {
        return Err(NormalizeError::NoUsername);
    }

    Ok(username)
}

/// Pull hashtags out of free text: lowercase, `#` stripped, order-preserving
/// dedup. The pattern is Unicode-aware, so CJK tags survive.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in hashtag_pattern().find_iter(text) {
        let tag = m.as_str()[1..].to_lowercase();
        if !tag.is_empty() && !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

/// Validate a single hashtag (with or without `#`), returning it lowercased.
pub fn clean_hashtag(tag: &str) -> Result<String, NormalizeError> {
    let cleaned = tag.trim_start_matches('#').trim();
    if cleaned.is_empty() {
        return Err(NormalizeError::InvalidHashtag);
    }
    if cleaned.chars().any(|c| !c.is_alphanumeric() && c != '_') {
        return Err(NormalizeError::InvalidHashtag);
    }
    Ok(cleaned.to_lowercase())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("charlidamelio", "charlidamelio")]
    #[case("@charlidamelio", "charlidamelio")]
    #[case("  @user.name_01  ", "user.name_01")]
    #[case("https://www.tiktok.com/@khaby.lame", "khaby.lame")]
    #[case("https://www.tiktok.com/@khaby.lame/video/7123", "khaby.lame")]
    #[case("http://tiktok.com/zachking?lang=en", "zachking")]
    #[case("@user!!name", "username")]
    fn normalizes_profile_inputs(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_profile_input(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn empty_input_is_rejected(#[case] input: &str) {
        assert_eq!(normalize_profile_input(input), Err(NormalizeError::Empty));
    }

    #[rstest]
    #[case("@")]
    #[case("!!!")]
    #[case("https://www.tiktok.com/")]
    fn inputs_without_a_username_are_rejected(#[case] input: &str) {
        assert_eq!(
            normalize_profile_input(input),
            Err(NormalizeError::NoUsername)
        );
    }

    #[test]
    fn extracts_hashtags_in_order_without_duplicates() {
        let text = "Morning #Workout with #fitness tips #workout #гимнастика";
        assert_eq!(
            extract_hashtags(text),
            vec!["workout", "fitness", "гимнастика"]
        );
    }

    #[test]
    fn extract_handles_text_without_hashtags() {
        assert!(extract_hashtags("no tags here").is_empty());
    }

    #[rstest]
    #[case("#Fitness", "fitness")]
    #[case("dance_moves", "dance_moves")]
    #[case("#日常", "日常")]
    fn cleans_valid_hashtags(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_hashtag(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("#")]
    #[case("#bad tag")]
    #[case("tag!")]
    fn rejects_invalid_hashtags(#[case] input: &str) {
        assert_eq!(clean_hashtag(input), Err(NormalizeError::InvalidHashtag));
    }
}
