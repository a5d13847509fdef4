//! Shared types for the brandfeed workspace.
//!
//! Holds the brand configuration and the compiled [`BrandDirectory`], the
//! persisted record types ([`CanonicalPost`], [`RunRecord`]), the upstream
//! [`RunSource`] contract, and environment-driven [`AppConfig`].

mod app_config;
mod brands;
mod config;
mod directory;
mod error;
mod posts;
mod source;

pub use app_config::{AppConfig, Environment, StorageKind};
pub use brands::{load_brands, parse_brands, BrandsFile, ParentBrand, SubBrand};
pub use config::{load_app_config, load_app_config_from_env};
pub use directory::{slugify, AliasKind, AliasOverlap, AliasRule, BrandDirectory};
pub use error::ConfigError;
pub use posts::{is_sample_post, CanonicalPost, RunRecord, SAMPLE_POST_IDS};
pub use source::{RunSource, SourceError, SourceRun};
