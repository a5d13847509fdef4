//! Compiled brand lookup tables.
//!
//! [`BrandDirectory`] flattens a [`BrandsFile`] into an explicit, ordered list
//! of [`AliasRule`]s. Substring scans walk that list top-down, so precedence
//! is the order of registration in `brands.yaml` and nothing else.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::brands::{BrandsFile, ParentBrand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasKind {
    Account,
    Hashtag,
    Keyword,
}

impl std::fmt::Display for AliasKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AliasKind::Account => write!(f, "account"),
            AliasKind::Hashtag => write!(f, "hashtag"),
            AliasKind::Keyword => write!(f, "keyword"),
        }
    }
}

/// One lower-cased alias mapped to the display name it classifies as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRule {
    pub alias: String,
    pub brand: String,
    /// Kind of the first registration of this alias.
    pub kind: AliasKind,
    /// Registered at least once as a hashtag or keyword, so caption text
    /// containing it counts as a keyword hit.
    pub caption_term: bool,
}

/// An alias registered for two different brands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasOverlap {
    pub alias: String,
    /// Brand the alias pointed to before the conflicting registration.
    pub replaced: String,
    /// Brand the alias resolves to now.
    pub winner: String,
}

/// Static registry mapping accounts, hashtags, and keywords to brand names.
#[derive(Debug, Clone)]
pub struct BrandDirectory {
    rules: Vec<AliasRule>,
    index: HashMap<String, usize>,
    accounts: HashMap<String, String>,
    tracked: HashSet<String>,
    tracked_order: Vec<String>,
    parents: Vec<ParentBrand>,
    overlaps: Vec<AliasOverlap>,
}

impl BrandDirectory {
    /// Compile the lookup tables from a validated brands file.
    ///
    /// Rule order is: for each sub-brand in file order, its account, its
    /// alternate accounts, its hashtags, then its keywords. An alias that was
    /// already registered keeps its position but takes the later brand.
    #[must_use]
    pub fn from_config(config: &BrandsFile) -> Self {
        let mut directory = Self {
            rules: Vec::new(),
            index: HashMap::new(),
            accounts: HashMap::new(),
            tracked: config.tracked.iter().cloned().collect(),
            tracked_order: config.tracked.clone(),
            parents: config.brands.clone(),
            overlaps: Vec::new(),
        };

        for sub in config.brands.iter().flat_map(|p| p.sub_brands.iter()) {
            for account in std::iter::once(&sub.account).chain(&sub.alt_accounts) {
                let handle = account.trim().to_lowercase();
                directory.accounts.insert(handle.clone(), sub.name.clone());
                directory.register(handle, &sub.name, AliasKind::Account);
            }
            for tag in &sub.hashtags {
                let tag = tag.trim().trim_start_matches('#').to_lowercase();
                directory.register(tag, &sub.name, AliasKind::Hashtag);
            }
            for keyword in &sub.keywords {
                directory.register(keyword.trim().to_lowercase(), &sub.name, AliasKind::Keyword);
            }
        }

        directory
    }

    fn register(&mut self, alias: String, brand: &str, kind: AliasKind) {
        if alias.is_empty() {
            return;
        }
        let caption_term = kind != AliasKind::Account;
        if let Some(&pos) = self.index.get(&alias) {
            let rule = &mut self.rules[pos];
            rule.caption_term |= caption_term;
            if rule.brand != brand {
                self.overlaps.push(AliasOverlap {
                    alias: alias.clone(),
                    replaced: rule.brand.clone(),
                    winner: brand.to_string(),
                });
                rule.brand = brand.to_string();
            }
            return;
        }
        self.index.insert(alias.clone(), self.rules.len());
        self.rules.push(AliasRule {
            alias,
            brand: brand.to_string(),
            kind,
            caption_term,
        });
    }

    /// All rules in precedence order.
    #[must_use]
    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    /// Exact lookup of a lower-cased alias of any kind.
    #[must_use]
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.index
            .get(alias)
            .map(|&pos| self.rules[pos].brand.as_str())
    }

    /// Exact lookup of a lower-cased account handle.
    #[must_use]
    pub fn account_brand(&self, handle: &str) -> Option<&str> {
        self.accounts.get(handle).map(String::as_str)
    }

    #[must_use]
    pub fn is_tracked(&self, brand: &str) -> bool {
        self.tracked.contains(brand)
    }

    /// Tracked display names in configuration order.
    #[must_use]
    pub fn tracked(&self) -> &[String] {
        &self.tracked_order
    }

    /// Aliases registered for more than one brand, in the order they were found.
    #[must_use]
    pub fn overlaps(&self) -> &[AliasOverlap] {
        &self.overlaps
    }

    #[must_use]
    pub fn parents(&self) -> &[ParentBrand] {
        &self.parents
    }

    #[must_use]
    pub fn parent_brands(&self) -> Vec<&str> {
        self.parents.iter().map(|p| p.name.as_str()).collect()
    }

    /// Every parent and sub-brand display name, deduplicated, in file order.
    #[must_use]
    pub fn all_brands(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.parents
            .iter()
            .flat_map(|p| {
                std::iter::once(p.name.as_str()).chain(p.sub_brands.iter().map(|s| s.name.as_str()))
            })
            .filter(|name| seen.insert(*name))
            .collect()
    }

    #[must_use]
    pub fn sub_brands_of(&self, parent: &str) -> Vec<&str> {
        self.parents
            .iter()
            .find(|p| p.name == parent)
            .map(|p| p.sub_brands.iter().map(|s| s.name.as_str()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parent_of(&self, sub_brand: &str) -> Option<&str> {
        self.parents
            .iter()
            .find(|p| p.sub_brands.iter().any(|s| s.name == sub_brand))
            .map(|p| p.name.as_str())
    }

    /// Display names grouped by category, categories in first-seen order.
    #[must_use]
    pub fn brands_by_category(&self) -> Vec<(String, Vec<String>)> {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for parent in &self.parents {
            let names = std::iter::once(parent.name.clone())
                .chain(parent.sub_brands.iter().map(|s| s.name.clone()));
            if let Some((_, bucket)) = grouped.iter_mut().find(|(c, _)| *c == parent.category) {
                bucket.extend(names);
            } else {
                grouped.push((parent.category.clone(), names.collect()));
            }
        }
        grouped
    }

    /// Profile URLs handed to the upstream scraper, one per primary account.
    #[must_use]
    pub fn profile_urls(&self) -> Vec<String> {
        self.parents
            .iter()
            .flat_map(|p| p.sub_brands.iter())
            .map(|s| format!("https://www.instagram.com/{}/", s.account))
            .collect()
    }
}

/// Generate a URL-safe slug from a brand display name.
///
/// `"Claude AI"` becomes `"claude-ai"`; non-ASCII characters are dropped.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else if c.is_whitespace() {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
