use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::db::ListingRecord;
use crate::error::Malformed;
use crate::fetcher::FilterCombination;

const DIMENSION_SEPARATOR: char = '/';

static SHIP_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".ship-link").unwrap());
static NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".slna").unwrap());
static TYPE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".slty").unwrap());
static BUILT: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".v3").unwrap());
static GROSS_TONNAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".v4").unwrap());
static DEADWEIGHT: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".v5").unwrap());
static SIZE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".v6").unwrap());
static FLAG: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".flag-icon").unwrap());

static LEADING_INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*([+-]?\d+)").unwrap());

/// Turns one results-table row into a record. The codes come from the crawl, not the page.
pub fn extract(row: ElementRef<'_>, combo: &FilterCombination) -> Result<ListingRecord, Malformed> {
    let imo = natural_key(row)?;
    let name = text_of(row, &NAME)
        .filter(|n| !n.is_empty())
        .ok_or(Malformed::MissingName)?;

    let (length, beam) = row
        .select(&SIZE)
        .next()
        .map(|el| split_dimensions(&el.text().collect::<String>()))
        .unwrap_or((None, None));

    let flag = row
        .select(&FLAG)
        .next()
        .and_then(|el| el.value().attr("title"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(ListingRecord {
        imo,
        name,
        vessel_type: text_of(row, &TYPE).filter(|t| !t.is_empty()),
        type_code: combo.category,
        build_year: int_of(row, &BUILT),
        gross_tonnage: int_of(row, &GROSS_TONNAGE),
        deadweight: int_of(row, &DEADWEIGHT),
        length,
        beam,
        flag,
        flag_code: combo.region.clone(),
    })
}

/// IMO number: last path segment of the detail-page link.
fn natural_key(row: ElementRef<'_>) -> Result<String, Malformed> {
    let href = row
        .select(&SHIP_LINK)
        .next()
        .and_then(|link| link.value().attr("href"))
        .ok_or(Malformed::MissingKey)?;

    let path = href.split(['?', '#']).next().unwrap_or_default();
    let key = path.rsplit('/').next().unwrap_or_default().trim();
    if key.is_empty() {
        return Err(Malformed::EmptyKey);
    }
    Ok(key.to_string())
}

fn text_of(row: ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

fn int_of(row: ElementRef<'_>, selector: &Selector) -> Option<i64> {
    text_of(row, selector).and_then(|t| parse_int(&t))
}

/// Length and beam from `"<length> / <beam>"`; each half may be missing on its own.
/// Split before trimming so an empty length (`" / 9"`) keeps its beam.
pub fn split_dimensions(size: &str) -> (Option<i64>, Option<i64>) {
    let mut parts = size.split(DIMENSION_SEPARATOR).map(str::trim);
    let length = parts.next().and_then(parse_int);
    let beam = parts.next().and_then(parse_int);
    (length, beam)
}

/// Leading integer of `text`. Zero is only accepted when the text is exactly `"0"`.
pub fn parse_int(text: &str) -> Option<i64> {
    let digits = LEADING_INT_RE.captures(text)?.get(1)?.as_str();
    let value: i64 = digits.parse().ok()?;
    if value == 0 && text.trim() != "0" {
        return None;
    }
    Some(value)
}
