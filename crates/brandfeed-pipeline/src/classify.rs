//! Brand inference for extracted posts.
//!
//! Signals are tried strongest first and the first hit wins:
//!
//! 1. the author handle is a known account,
//! 2. a hashtag (explicit list, then `#word` tokens in the caption) is a known alias,
//! 3. the caption contains a hashtag or keyword alias, or a brand's display name,
//! 4. an `@mention` in the caption is a known account,
//! 5. the author handle contains a rule's alias.
//!
//! Substring scans walk [`BrandDirectory::rules`] top-down. A hit on a brand
//! that is not tracked counts as no brand at all.

use std::sync::LazyLock;

use brandfeed_core::BrandDirectory;
use regex::Regex;

use crate::extract::PostFields;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("valid hashtag regex"));
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_.]+)").expect("valid mention regex"));

/// Which signal produced a classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Account,
    Hashtag(String),
    CaptionKeyword(String),
    Mention(String),
    HandleKeyword(String),
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Account => write!(f, "account"),
            Signal::Hashtag(tag) => write!(f, "hashtag #{tag}"),
            Signal::CaptionKeyword(alias) => write!(f, "caption keyword '{alias}'"),
            Signal::Mention(handle) => write!(f, "mention @{handle}"),
            Signal::HandleKeyword(alias) => write!(f, "handle keyword '{alias}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub brand: String,
    pub signal: Signal,
}

/// Classify `fields`, returning `None` when no signal names a tracked brand.
#[must_use]
pub fn classify(directory: &BrandDirectory, fields: &PostFields) -> Option<Classification> {
    let hit = infer_brand(directory, fields)?;
    if directory.is_tracked(&hit.brand) {
        Some(hit)
    } else {
        tracing::debug!(
            brand = %hit.brand,
            signal = %hit.signal,
            handle = %fields.handle,
            "classified brand is not tracked"
        );
        None
    }
}

/// The ordered fallback without the tracked-brand restriction.
#[must_use]
pub fn infer_brand(directory: &BrandDirectory, fields: &PostFields) -> Option<Classification> {
    let handle = fields.handle.trim().to_lowercase();
    let caption = fields.caption.to_lowercase();

    by_account(directory, &handle)
        .or_else(|| by_hashtag(directory, &fields.hashtags, &caption))
        .or_else(|| by_caption_keyword(directory, &caption))
        .or_else(|| by_mention(directory, &caption))
        .or_else(|| by_handle_keyword(directory, &handle))
}

fn found(brand: &str, signal: Signal) -> Classification {
    Classification {
        brand: brand.to_string(),
        signal,
    }
}

fn by_account(directory: &BrandDirectory, handle: &str) -> Option<Classification> {
    if handle.is_empty() {
        return None;
    }
    directory
        .account_brand(handle)
        .map(|brand| found(brand, Signal::Account))
}

fn by_hashtag(
    directory: &BrandDirectory,
    explicit: &[String],
    caption: &str,
) -> Option<Classification> {
    let explicit = explicit.iter().map(|t| t.to_lowercase());
    let inline = HASHTAG_RE
        .captures_iter(caption)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    explicit.chain(inline).find_map(|tag| {
        directory
            .lookup(&tag)
            .map(|brand| found(brand, Signal::Hashtag(tag.clone())))
    })
}

fn by_caption_keyword(directory: &BrandDirectory, caption: &str) -> Option<Classification> {
    if caption.is_empty() {
        return None;
    }
    directory.rules().iter().find_map(|rule| {
        let hit = (rule.caption_term && caption.contains(rule.alias.as_str()))
            || caption.contains(rule.brand.to_lowercase().as_str());
        hit.then(|| found(&rule.brand, Signal::CaptionKeyword(rule.alias.clone())))
    })
}

fn by_mention(directory: &BrandDirectory, caption: &str) -> Option<Classification> {
    MENTION_RE
        .captures_iter(caption)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('.'))
        .find_map(|mention| {
            directory
                .account_brand(mention)
                .map(|brand| found(brand, Signal::Mention(mention.to_string())))
        })
}

fn by_handle_keyword(directory: &BrandDirectory, handle: &str) -> Option<Classification> {
    if handle.is_empty() {
        return None;
    }
    directory.rules().iter().find_map(|rule| {
        handle
            .contains(rule.alias.as_str())
            .then(|| found(&rule.brand, Signal::HandleKeyword(rule.alias.clone())))
    })
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
