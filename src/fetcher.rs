use std::fmt;
use std::future::Future;
use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Url;
use tracing::debug;

use crate::error::CrawlError;
use crate::settings::CrawlSettings;

/// One (vessel type, flag) pair: an independent paginated result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCombination {
    pub category: u32,
    pub region: String,
}

impl FilterCombination {
    /// Cartesian product of the configured sets, categories outer, regions inner.
    pub fn all(categories: &[u32], regions: &[String]) -> Vec<FilterCombination> {
        categories
            .iter()
            .flat_map(|&category| {
                regions.iter().map(move |region| FilterCombination {
                    category,
                    region: region.clone(),
                })
            })
            .collect()
    }
}

impl fmt::Display for FilterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type {} / flag {}", self.category, self.region)
    }
}

/// Builds the listing URL for one page of one filter combination.
pub fn listing_url(base: &Url, combo: &FilterCombination, page: u32, min_year: u32) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("page", &page.to_string())
        .append_pair("type", &combo.category.to_string())
        .append_pair("flag", &combo.region)
        .append_pair("minYear", &min_year.to_string());
    url
}

/// Source of raw listing documents.
pub trait PageSource {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<String, CrawlError>>;
}

/// Plain HTTP GET source. Any transport failure is returned as-is; there is no retry.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(settings: &CrawlSettings) -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));
        let agent = HeaderValue::from_str(&settings.user_agent).map_err(|e| {
            CrawlError::InvalidConfig(format!("user_agent is not a valid header: {}", e))
        })?;
        headers.insert(USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout())
            .build()?;
        Ok(HttpSource { client })
    }
}

impl PageSource for HttpSource {
    async fn fetch(&self, url: &Url) -> Result<String, CrawlError> {
        let start = Instant::now();
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.contains("html") {
                return Err(CrawlError::NotHtml {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        let body = response.text().await?;
        debug!(
            url = %url,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "fetched listing page"
        );
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_is_categories_outer_regions_inner() {
        let combos = FilterCombination::all(&[401, 402], &["ID".into(), "PA".into()]);
        let pairs: Vec<(u32, &str)> = combos
            .iter()
            .map(|c| (c.category, c.region.as_str()))
            .collect();
        assert_eq!(pairs, vec![(401, "ID"), (401, "PA"), (402, "ID"), (402, "PA")]);
    }

    #[test]
    fn url_carries_all_filters() {
        let base = Url::parse("https://www.vesselfinder.com/vessels").unwrap();
        let combo = FilterCombination {
            category: 0,
            region: "ID".into(),
        };
        let url = listing_url(&base, &combo, 3, 2010);
        assert_eq!(
            url.as_str(),
            "https://www.vesselfinder.com/vessels?page=3&type=0&flag=ID&minYear=2010"
        );
    }
}
