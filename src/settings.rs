use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::CrawlError;

const CONFIG_FILE: &str = "vessel_crawler";
const ENV_PREFIX: &str = "VESSEL";

/// Static crawl settings, loaded once before crawling starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    /// Listing endpoint; query parameters are appended per page.
    pub base_url: String,
    /// Vessel type codes (outer loop).
    pub categories: Vec<u32>,
    /// Two-letter flag codes (inner loop).
    pub regions: Vec<String>,
    /// Safety ceiling on pages requested per filter combination.
    pub max_pages: u32,
    /// Fixed `minYear` constraint sent with every request.
    pub min_year: u32,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub db_path: PathBuf,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        CrawlSettings {
            base_url: "https://www.vesselfinder.com/vessels".to_string(),
            categories: vec![0],
            regions: vec!["ID".to_string()],
            max_pages: 200,
            min_year: 2010,
            user_agent: concat!("vessel_crawler/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
            db_path: PathBuf::from("data/vessels.sqlite"),
        }
    }
}

/// Command-line values that take precedence over file and environment settings.
#[derive(Debug, Default)]
pub struct Overrides {
    pub categories: Vec<u32>,
    pub regions: Vec<String>,
    pub max_pages: Option<u32>,
    pub min_year: Option<u32>,
    pub db_path: Option<PathBuf>,
}

impl CrawlSettings {
    /// Defaults, then `vessel_crawler.toml` if present, then `VESSEL_*` env vars.
    pub fn load() -> Result<Self, CrawlError> {
        let settings: CrawlSettings = Config::builder()
            .add_source(Config::try_from(&CrawlSettings::default())?)
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("categories")
                    .with_list_parse_key("regions"),
            )
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    pub fn apply(mut self, overrides: Overrides) -> Result<Self, CrawlError> {
        if !overrides.categories.is_empty() {
            self.categories = overrides.categories;
        }
        if !overrides.regions.is_empty() {
            self.regions = overrides.regions;
        }
        if let Some(n) = overrides.max_pages {
            self.max_pages = n;
        }
        if let Some(y) = overrides.min_year {
            self.min_year = y;
        }
        if let Some(p) = overrides.db_path {
            self.db_path = p;
        }
        self.validated()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Normalizes region codes and rejects settings the crawl cannot run with.
    fn validated(mut self) -> Result<Self, CrawlError> {
        if self.categories.is_empty() {
            return Err(CrawlError::InvalidConfig("no categories configured".into()));
        }
        if self.regions.is_empty() {
            return Err(CrawlError::InvalidConfig("no regions configured".into()));
        }
        if self.max_pages == 0 {
            return Err(CrawlError::InvalidConfig("max_pages must be at least 1".into()));
        }

        for region in self.regions.iter_mut() {
            let code = region.trim().to_ascii_uppercase();
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(CrawlError::InvalidConfig(format!(
                    "region {:?} is not a two-letter code",
                    region
                )));
            }
            *region = code;
        }

        let mut seen = std::collections::HashSet::new();
        self.categories.retain(|c| seen.insert(*c));
        let mut seen = std::collections::HashSet::new();
        self.regions.retain(|r| seen.insert(r.clone()));

        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(CrawlError::InvalidConfig(format!(
                "base_url {:?} is not a valid URL",
                self.base_url
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<CrawlSettings, CrawlError> {
        let settings: CrawlSettings = Config::builder()
            .add_source(Config::try_from(&CrawlSettings::default())?)
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validated()
    }

    #[test]
    fn defaults_match_listing_site() {
        let s = CrawlSettings::default().validated().unwrap();
        assert_eq!(s.categories, vec![0]);
        assert_eq!(s.regions, vec!["ID"]);
        assert_eq!(s.max_pages, 200);
        assert_eq!(s.min_year, 2010);
    }

    #[test]
    fn file_overrides_defaults() {
        let s = from_toml("categories = [401, 402]\nregions = [\"pa\", \"LR\"]\nmax_pages = 5").unwrap();
        assert_eq!(s.categories, vec![401, 402]);
        assert_eq!(s.regions, vec!["PA", "LR"]);
        assert_eq!(s.max_pages, 5);
        assert_eq!(s.min_year, 2010);
    }

    #[test]
    fn rejects_bad_region() {
        let err = from_toml("regions = [\"IDN\"]").unwrap_err();
        assert!(matches!(err, CrawlError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_ceiling() {
        assert!(from_toml("max_pages = 0").is_err());
    }

    #[test]
    fn overrides_take_precedence_and_dedup() {
        let s = CrawlSettings::default()
            .apply(Overrides {
                categories: vec![5, 5, 8],
                regions: vec!["id".into(), "ID".into()],
                max_pages: Some(3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(s.categories, vec![5, 8]);
        assert_eq!(s.regions, vec!["ID"]);
        assert_eq!(s.max_pages, 3);
    }
}
