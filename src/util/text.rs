use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Maximum length (in chars) of a derived article summary.
pub const SUMMARY_MAX_CHARS: usize = 240;

/// Normalize a feed entry body for use as a dedup key: drop anything inside
/// angle brackets, collapse whitespace runs to single spaces, and trim.
///
/// This is not an HTML parser - it only has to map the same upstream body
/// to the same string every time, and markup noise (tags, attribute churn)
/// must not make two copies of one article look distinct.
pub fn normalize_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len().min(SUMMARY_MAX_CHARS * 2));
    let mut in_tag = false;
    let mut last_was_space = true;
    for ch in body.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                // A tag boundary separates words ("<p>a</p><p>b</p>")
                if !last_was_space {
                    out.push(' ');
                    last_was_space = true;
                }
            }
            _ if in_tag => {}
            c if c.is_whitespace() => {
                if !last_was_space {
                    out.push(' ');
                    last_was_space = true;
                }
            }
            c => {
                out.push(c);
                last_was_space = false;
            }
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Derive the secondary dedup key for an article.
///
/// The normalized body truncated to [`SUMMARY_MAX_CHARS`] chars; when the
/// body is missing or normalizes to nothing, a hex digest of
/// `link|title|published` so the key never degenerates to the empty string
/// (which would make every body-less article collide with the next one).
///
/// Deterministic: the same entry always derives the same summary.
pub fn derive_summary(
    body: Option<&str>,
    link: &str,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    if let Some(body) = body {
        let normalized = normalize_body(body);
        if !normalized.is_empty() {
            return normalized.chars().take(SUMMARY_MAX_CHARS).collect();
        }
    }

    let input = format!(
        "{}|{}|{}",
        link,
        title,
        published.map(|p| p.timestamp().to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
