use brandfeed_core::BrandDirectory;
use chrono::TimeDelta;

/// Why a candidate post was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No brand, or a brand outside the tracked list.
    Brand,
    /// Older than the configured maximum age.
    Age,
    /// No media URL.
    Media,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Brand => write!(f, "no tracked brand"),
            Rejection::Age => write!(f, "too old"),
            Rejection::Media => write!(f, "no media url"),
        }
    }
}

/// Age window and required-field policy for candidate posts.
#[derive(Debug, Clone, Copy)]
pub struct RecordFilter<'a> {
    directory: &'a BrandDirectory,
    max_age_ms: i64,
    now_ms: i64,
}

impl<'a> RecordFilter<'a> {
    #[must_use]
    pub fn new(directory: &'a BrandDirectory, max_age: TimeDelta, now_ms: i64) -> Self {
        Self {
            directory,
            max_age_ms: max_age.num_milliseconds(),
            now_ms,
        }
    }

    /// Check brand, then age, then media; the first failing check is reported.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] reason when the candidate is not kept.
    pub fn check(
        &self,
        brand: Option<&str>,
        timestamp: i64,
        media_url: Option<&str>,
    ) -> Result<(), Rejection> {
        if !brand.is_some_and(|b| self.directory.is_tracked(b)) {
            return Err(Rejection::Brand);
        }
        if self.now_ms.saturating_sub(timestamp) > self.max_age_ms {
            return Err(Rejection::Age);
        }
        if media_url.is_none_or(|url| url.trim().is_empty()) {
            return Err(Rejection::Media);
        }
        Ok(())
    }

    #[must_use]
    pub fn accept(&self, brand: Option<&str>, timestamp: i64, media_url: Option<&str>) -> bool {
        self.check(brand, timestamp, media_url).is_ok()
    }
}
