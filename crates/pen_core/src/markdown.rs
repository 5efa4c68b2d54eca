//! Pure content helpers shared by the store and its rendering collaborators.
//!
//! # Responsibility
//! - Extract hashtag tags from note content.
//! - Rewrite `[[Title]]` wiki-links into markdown note links.
//! - Parse `image:<id>` / `file:<id>` blob references.

use crate::model::attachment::{AttachmentId, AttachmentKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#'([^']+)'|#(\w+)").expect("valid tag regex"));
static WIKI_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(.+?)\]\]").expect("valid wiki-link regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Extracts `#word` and `#'quoted phrase'` tags.
///
/// Tags are trimmed, lower-cased, deduplicated and returned sorted.
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut unique = BTreeSet::new();
    for caps in TAG_RE.captures_iter(text) {
        let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let tag = raw.as_str().trim().to_lowercase();
        if !tag.is_empty() {
            unique.insert(tag);
        }
    }
    unique.into_iter().collect()
}

/// Normalizes a user-typed tag filter (`#Work`, ` work `) to its cached form.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    let trimmed = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let trimmed = trimmed.trim_matches('\'').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Slug used by wiki-links: trimmed, lower-cased, whitespace runs as `-`.
pub fn slugify(title: &str) -> String {
    WHITESPACE_RE.replace_all(title.trim(), "-").to_lowercase()
}

/// Rewrites every `[[Title]]` into `[Title](note:<slug>)`.
pub fn render_wiki_links(text: &str) -> String {
    WIKI_LINK_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let title = &caps[1];
            format!("[{title}](note:{})", slugify(title))
        })
        .into_owned()
}

/// A parsed `image:<id>` / `file:<id>` content reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobRef {
    pub kind: AttachmentKind,
    pub id: AttachmentId,
}

impl BlobRef {
    /// Parses a reference string. Returns `None` for anything else (plain
    /// urls, malformed ids), which renders as "unresolved".
    pub fn parse(reference: &str) -> Option<Self> {
        let (scheme, id) = reference.trim().split_once(':')?;
        let kind = match scheme {
            "image" => AttachmentKind::Image,
            "file" => AttachmentKind::File,
            _ => return None,
        };
        let id = id.trim().parse().ok()?;
        Some(Self { kind, id })
    }

    /// Formats the reference the way it is embedded in note content.
    pub fn to_reference(self) -> String {
        format!("{}:{}", self.kind.scheme(), self.id)
    }
}
