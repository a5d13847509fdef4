use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A tracked account (or family of accounts) publishing under one display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubBrand {
    /// Canonical display name assigned to classified posts, e.g. `"Nike"`.
    pub name: String,
    /// Primary account handle on the scraped platform.
    pub account: String,
    /// Additional handles that publish for the same brand (regional or legacy accounts).
    #[serde(default)]
    pub alt_accounts: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// Free-text phrases matched case-insensitively inside captions and handles.
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A parent brand grouping one or more [`SubBrand`]s under a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentBrand {
    pub name: String,
    pub category: String,
    /// Parent-level keywords; informational only, they are not compiled into
    /// classification rules because they would shadow the sub-brands.
    #[serde(default)]
    pub keywords: Vec<String>,
    pub sub_brands: Vec<SubBrand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandsFile {
    /// Display names whose posts are kept. Classification results outside
    /// this list are discarded.
    pub tracked: Vec<String>,
    pub brands: Vec<ParentBrand>,
}

/// Load and validate the brands configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_brands(path: &Path) -> Result<BrandsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::BrandsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_brands(&content)
}

/// Parse and validate a brands configuration from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_brands(yaml: &str) -> Result<BrandsFile, ConfigError> {
    let brands_file: BrandsFile = serde_yaml::from_str(yaml)?;
    validate_brands(&brands_file)?;
    Ok(brands_file)
}

fn validate_brands(brands_file: &BrandsFile) -> Result<(), ConfigError> {
    let mut seen_parents = HashSet::new();
    let mut seen_names = HashSet::new();
    let mut seen_accounts = HashSet::new();

    for parent in &brands_file.brands {
        if parent.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brand name must be non-empty".to_string(),
            ));
        }
        if parent.category.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "brand '{}' has an empty category",
                parent.name
            )));
        }
        if !seen_parents.insert(parent.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate parent brand: '{}'",
                parent.name
            )));
        }
        if parent.sub_brands.is_empty() {
            return Err(ConfigError::Validation(format!(
                "brand '{}' has no sub_brands",
                parent.name
            )));
        }

        for sub in &parent.sub_brands {
            if sub.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "brand '{}' has a sub-brand with an empty name",
                    parent.name
                )));
            }
            if sub.account.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "sub-brand '{}' has no account",
                    sub.name
                )));
            }

            if !seen_names.insert(sub.name.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate brand name: '{}'",
                    sub.name
                )));
            }

            for account in std::iter::once(&sub.account).chain(&sub.alt_accounts) {
                if !seen_accounts.insert(account.trim().to_lowercase()) {
                    return Err(ConfigError::Validation(format!(
                        "duplicate account: '{account}' (sub-brand '{}')",
                        sub.name
                    )));
                }
            }
        }
    }

    for tracked in &brands_file.tracked {
        let known = brands_file
            .brands
            .iter()
            .flat_map(|p| p.sub_brands.iter())
            .any(|s| s.name == *tracked);
        if !known {
            return Err(ConfigError::Validation(format!(
                "tracked brand '{tracked}' is not defined by any sub-brand"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "brands_test.rs"]
mod tests;
