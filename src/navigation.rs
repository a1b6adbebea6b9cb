use tracing::{debug, trace};
use url::form_urlencoded;

const PAGE_PARAM: &str = "page";

/// Tracks the requested 1-based remote page and mirrors it into a `page=<n>` indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNavigator {
    page: usize,
    has_more: bool,
}

/// Reads the page number from an indicator. Accepts a bare number or a
/// query string (`page=3`, `?sort=x&page=3`). Anything else resolves to page 1.
pub fn parse_page_indicator(indicator: Option<&str>) -> usize {
    let Some(raw) = indicator.map(str::trim) else {
        return 1;
    };
    let value = if raw.contains('=') {
        form_urlencoded::parse(raw.trim_start_matches('?').as_bytes())
            .find(|(key, _)| key == PAGE_PARAM)
            .map(|(_, value)| value.into_owned())
    } else {
        Some(raw.to_string())
    };

    let page = value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&p| p >= 1)
        .unwrap_or(1);
    trace!("Page indicator {raw:?} => {page}");
    page
}

impl PageNavigator {
    pub fn from_indicator(indicator: Option<&str>) -> Self {
        Self {
            page: parse_page_indicator(indicator),
            has_more: false,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Current indicator value, e.g. `?page=2`.
    pub fn location(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(PAGE_PARAM, &self.page.to_string())
            .finish();
        format!("?{query}")
    }

    /// Moves the indicator to page `page` and returns the page that has to be fetched.
    /// "next" stays disabled until that page is loaded.
    pub fn go_to_page(&mut self, page: usize) -> usize {
        self.page = page.max(1);
        self.has_more = false;
        debug!("Navigating to {}", self.location());
        self.page
    }

    pub fn can_previous(&self) -> bool {
        self.page > 1
    }

    pub fn can_next(&self) -> bool {
        self.has_more
    }

    pub fn previous_page(&mut self) -> Option<usize> {
        self.can_previous().then(|| self.go_to_page(self.page - 1))
    }

    pub fn next_page(&mut self) -> Option<usize> {
        self.can_next().then(|| self.go_to_page(self.page + 1))
    }

    /// Remembers whether the last successful fetch reported another page.
    pub fn record_success(&mut self, has_more: bool) {
        self.has_more = has_more;
    }
}
