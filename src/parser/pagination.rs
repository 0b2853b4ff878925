use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::warn;

use crate::fetcher::FilterCombination;

static CONTROLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".pagination-controls").unwrap());
static LABEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").unwrap());
static NUMERAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*").unwrap());

/// How many pages the driver will request for one filter combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCeiling {
    /// The pagination control reported this many pages, within the safety ceiling.
    Discovered(u32),
    /// The control reported more pages than the safety ceiling allows.
    Clamped { reported: u32, limit: u32 },
    /// No usable pagination control; crawl up to the safety ceiling.
    Fallback(u32),
}

impl PageCeiling {
    pub fn limit(self) -> u32 {
        match self {
            PageCeiling::Discovered(n) => n,
            PageCeiling::Clamped { limit, .. } => limit,
            PageCeiling::Fallback(limit) => limit,
        }
    }
}

/// Reads the total page count from the first page of a combination.
pub fn resolve(document: &Html, safety_ceiling: u32, combo: &FilterCombination) -> PageCeiling {
    let Some(total) = reported_total(document) else {
        return PageCeiling::Fallback(safety_ceiling);
    };

    if total > safety_ceiling {
        warn!(
            category = combo.category,
            region = %combo.region,
            reported = total,
            ceiling = safety_ceiling,
            "page count exceeds safety ceiling; results past the ceiling are skipped"
        );
        PageCeiling::Clamped {
            reported: total,
            limit: safety_ceiling,
        }
    } else {
        PageCeiling::Discovered(total)
    }
}

/// Last numeral of the "current / total" label, if any. Zero counts as unreadable.
fn reported_total(document: &Html) -> Option<u32> {
    let controls = document.select(&CONTROLS).next()?;
    let label: String = controls.select(&LABEL).next()?.text().collect();
    let last = NUMERAL_RE.find_iter(&label).last()?;
    let total: u32 = last.as_str().replace(',', "").parse().ok()?;
    (total > 0).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo() -> FilterCombination {
        FilterCombination {
            category: 0,
            region: "ID".into(),
        }
    }

    fn doc(label: &str) -> Html {
        Html::parse_document(&format!(
            r#"<div class="pagination-controls"><a>prev</a><span>{}</span><a>next</a></div>"#,
            label
        ))
    }

    #[test]
    fn reads_total_from_label() {
        assert_eq!(resolve(&doc("1 / 3"), 200, &combo()), PageCeiling::Discovered(3));
    }

    #[test]
    fn total_equal_to_ceiling_is_not_clamped() {
        assert_eq!(resolve(&doc("1 / 200"), 200, &combo()), PageCeiling::Discovered(200));
    }

    #[test]
    fn clamps_to_safety_ceiling() {
        let ceiling = resolve(&doc("1 / 1,234"), 200, &combo());
        assert_eq!(
            ceiling,
            PageCeiling::Clamped {
                reported: 1234,
                limit: 200
            }
        );
        assert_eq!(ceiling.limit(), 200);
    }

    #[test]
    fn missing_control_falls_back() {
        let html = Html::parse_document("<table class=\"results\"></table>");
        assert_eq!(resolve(&html, 50, &combo()), PageCeiling::Fallback(50));
    }

    #[test]
    fn unparsable_label_falls_back() {
        assert_eq!(resolve(&doc("page - of -"), 200, &combo()), PageCeiling::Fallback(200));
        assert_eq!(resolve(&doc("1 / 0"), 200, &combo()), PageCeiling::Fallback(200));
    }
}
