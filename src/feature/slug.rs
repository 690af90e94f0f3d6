//! Slug normalization and branch derivation.
//!
//! A feature's branch name is derived deterministically from its id and
//! slug: `{id:03}-{slug}`. The slug is a lowercase, hyphen-separated
//! normalization of the user's name hint with stop words removed and the
//! length capped.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Words dropped during slug normalization.
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "for", "to", "in", "on", "at", "with", "by", "from",
    "add", "adds", "adding", "new",
];

/// Pattern every derived branch name must match.
static BRANCH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{3}-[a-z0-9]+(-[a-z0-9]+)*$").expect("valid branch regex"));

/// Upper bound on branch name length, including the id prefix.
pub const MAX_BRANCH_LENGTH: usize = 48;

/// Normalize a name hint into a slug.
///
/// Lowercases, replaces non-alphanumeric runs with hyphens, removes stop
/// words, and keeps at most `max_words` words within `max_length` chars.
pub fn slugify(hint: &str, max_words: usize, max_length: usize) -> String {
    let normalized: String = hint
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();

    let words: Vec<&str> = normalized
        .split('-')
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .take(max_words)
        .collect();

    let mut slug = String::new();
    for word in words {
        let next_len = if slug.is_empty() {
            word.len()
        } else {
            slug.len() + 1 + word.len()
        };
        if next_len > max_length && !slug.is_empty() {
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word);
    }

    slug.truncate(max_length);
    // A truncation mid-word can leave a trailing hyphen.
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Derive the branch name for a feature id and slug.
pub fn derive_branch(id: u32, slug: &str) -> String {
    format!("{id:03}-{slug}")
}

/// Validate a branch name against the `NNN-slug` pattern and length bound.
pub fn validate_branch(branch: &str) -> Result<()> {
    if !BRANCH_PATTERN.is_match(branch) || branch.len() > MAX_BRANCH_LENGTH {
        return Err(Error::InvalidBranch(branch.to_string()));
    }
    Ok(())
}
