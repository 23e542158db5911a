use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Every spelling a page view has been recorded under.
pub const PAGE_VIEW_SPELLINGS: [&str; 2] = ["pageview", "page_view"];

/// The kind of interaction an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    CtaClick,
    ExpExposure,
    Conversion,
}

impl EventType {
    /// Parse a stored or submitted type name. Both page-view spellings map to
    /// [`EventType::PageView`].
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pageview" | "page_view" => Some(Self::PageView),
            "cta_click" => Some(Self::CtaClick),
            "exp_exposure" => Some(Self::ExpExposure),
            "conversion" => Some(Self::Conversion),
            _ => None,
        }
    }

    /// Canonical name written to the store.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PageView => "pageview",
            Self::CtaClick => "cta_click",
            Self::ExpExposure => "exp_exposure",
            Self::Conversion => "conversion",
        }
    }

    /// All names this type may appear under in the store, for `IN` filters.
    pub fn spellings(self) -> &'static [&'static str] {
        match self {
            Self::PageView => &PAGE_VIEW_SPELLINGS,
            Self::CtaClick => &["cta_click"],
            Self::ExpExposure => &["exp_exposure"],
            Self::Conversion => &["conversion"],
        }
    }

    pub const fn is_page_view(self) -> bool {
        matches!(self, Self::PageView)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded interaction from a project's append-only event log.
///
/// Optional ids are `None` when absent or empty; such events still count
/// toward totals but never enter a unique-id set.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventType,
    pub timestamp: DateTime<Utc>,
    pub anon_user_id: Option<String>,
    pub session_id: Option<String>,
    pub url: Option<String>,
    pub exp_id: Option<String>,
    pub variant: Option<String>,
    pub button_id: Option<String>,
    pub goal: Option<String>,
    pub meta: Option<serde_json::Value>,
}

impl Event {
    /// A bare event of the given kind; ids and dimensions start empty.
    pub const fn new(kind: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp,
            anon_user_id: None,
            session_id: None,
            url: None,
            exp_id: None,
            variant: None,
            button_id: None,
            goal: None,
            meta: None,
        }
    }

    #[must_use]
    pub fn with_user(mut self, id: impl Into<String>) -> Self {
        self.anon_user_id = non_empty(id.into());
        self
    }

    #[must_use]
    pub fn with_session(mut self, id: impl Into<String>) -> Self {
        self.session_id = non_empty(id.into());
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = non_empty(url.into());
        self
    }

    #[must_use]
    pub fn with_experiment(mut self, exp_id: impl Into<String>, variant: impl Into<String>) -> Self {
        self.exp_id = non_empty(exp_id.into());
        self.variant = non_empty(variant.into());
        self
    }
}

/// Map empty strings to `None`.
pub fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
