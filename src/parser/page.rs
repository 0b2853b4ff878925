use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static RESULTS_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.results").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());

/// A parsed listing page. Lives for one page's processing only.
pub struct ListingPage {
    document: Html,
}

impl ListingPage {
    pub fn parse(body: &str) -> Self {
        ListingPage {
            document: Html::parse_document(body),
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Data rows of the results table, header rows excluded.
    /// `None` means the table is absent: no more data for this combination.
    pub fn rows(&self) -> Option<Vec<ElementRef<'_>>> {
        let table = self.document.select(&RESULTS_TABLE).next()?;
        let rows = table
            .select(&ROW)
            .filter(|row| row.select(&HEADER_CELL).next().is_none())
            .collect();
        Some(rows)
    }
}
