use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.[a-z]{2,}")
        .expect("email pattern is valid")
});

/// Emails extracted from free-text buddy-request cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRequests {
    pub emails: BTreeSet<String>,
    /// Non-empty tokens that yielded no email
    pub malformed: usize,
}

/// Lower-case and trim an email for comparison
#[inline]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().trim_matches(|c| c == '<' || c == '>').to_lowercase()
}

/// Extract email-like strings from bracket/quote/comma-delimited cells
///
/// Tokens that contain no email are dropped and counted, never an error.
pub fn parse_buddy_requests<S: AsRef<str>>(tokens: &[S]) -> ParsedRequests {
    let mut parsed = ParsedRequests::default();

    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }

        let before = parsed.emails.len();
        let mut matched = false;
        for m in EMAIL_PATTERN.find_iter(token) {
            matched = true;
            parsed.emails.insert(normalize_email(m.as_str()));
        }

        if !matched {
            tracing::debug!("Dropping buddy-request token with no email: {:?}", token);
            parsed.malformed += 1;
        } else if parsed.emails.len() == before {
            tracing::trace!("Buddy-request token repeated known emails: {:?}", token);
        }
    }

    parsed
}

/// Sorted, comma-joined request set used to spot repeated requests
pub fn request_key(emails: &BTreeSet<String>) -> String {
    emails.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
