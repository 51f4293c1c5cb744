//! Catalog search
//!
//! A query is a whitespace-separated list of tokens plus filters. A record
//! matches when it passes the recency filter (if requested) and its name
//! satisfies **every** token:
//!
//! - plain mode: substring containment (optionally ASCII case-insensitive)
//! - regex mode: each token is an independent regular expression matched
//!   anywhere in the name
//!
//! Results are sorted by name in byte order, which puts uppercase before
//! lowercase (`Beta`, `Zeta`, `alpha`). This is deliberately not the
//! case-insensitive order used by [`export`](crate::export).

use chrono::{DateTime, Duration, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::record::{Record, RecordKind, RecordView};
use crate::store::RecordStore;

/// Default width of the "changed recently" window
pub const DEFAULT_RECENT_WINDOW_SECS: i64 = 10;

/// Search parameters
///
/// # Example
///
/// ```rust
/// use refscope_core::SearchQuery;
///
/// let query = SearchQuery::new("cockpit ^sim/")
///     .regex(true)
///     .case_insensitive(true)
///     .commands(false);
/// assert!(query.include_values);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free text; split on whitespace into AND-ed tokens
    pub text: String,
    /// Treat each token as a regular expression
    pub use_regex: bool,
    /// Ignore case while matching, with Unicode case folding in both plain
    /// and regex mode
    pub case_insensitive: bool,
    /// Only records changed within the recent window
    pub recent_only: bool,
    /// With `recent_only`, only count big changes
    pub big_changes_only: bool,
    /// Search value records
    pub include_values: bool,
    /// Search command records
    pub include_commands: bool,
}

impl SearchQuery {
    /// Plain, case-sensitive query over both record kinds
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            use_regex: false,
            case_insensitive: false,
            recent_only: false,
            big_changes_only: false,
            include_values: true,
            include_commands: true,
        }
    }

    /// Query matching every record
    pub fn all() -> Self {
        Self::new("")
    }

    pub fn regex(mut self, use_regex: bool) -> Self {
        self.use_regex = use_regex;
        self
    }

    pub fn case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn recent_only(mut self, recent_only: bool) -> Self {
        self.recent_only = recent_only;
        self
    }

    pub fn big_changes_only(mut self, big_changes_only: bool) -> Self {
        self.big_changes_only = big_changes_only;
        self
    }

    pub fn values(mut self, include: bool) -> Self {
        self.include_values = include;
        self
    }

    pub fn commands(mut self, include: bool) -> Self {
        self.include_commands = include;
        self
    }

    /// Non-empty whitespace-separated tokens
    pub fn tokens(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::all()
    }
}

/// Owned copy of a search result
///
/// Used where results must outlive the borrow of the store (e.g. replies
/// from the [`Poller`](crate::Poller)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    pub kind: RecordKind,
    pub last_update_time: DateTime<Utc>,
    pub last_big_update_time: DateTime<Utc>,
}

impl From<RecordView<'_>> for SearchHit {
    fn from(view: RecordView<'_>) -> Self {
        Self {
            name: view.name().to_string(),
            kind: view.kind(),
            last_update_time: view.last_update_time(),
            last_big_update_time: view.last_big_update_time(),
        }
    }
}

/// Compiled name predicate
enum TextMatcher {
    /// Zero tokens: everything passes
    Any,
    /// Case-sensitive plain text
    Substring(Vec<String>),
    /// Expressions, and case-folded plain text as escaped literals
    Regex(Vec<Regex>),
}

impl TextMatcher {
    fn compile(query: &SearchQuery) -> Result<Self> {
        let tokens = query.tokens();
        if tokens.is_empty() {
            return Ok(TextMatcher::Any);
        }

        if !query.use_regex && !query.case_insensitive {
            return Ok(TextMatcher::Substring(
                tokens.into_iter().map(str::to_string).collect(),
            ));
        }

        // Plain text folds case through the regex engine too, so both modes
        // agree on what "case-insensitive" means.
        let regexes = tokens
            .into_iter()
            .map(|token| {
                let pattern = if query.use_regex {
                    token.to_string()
                } else {
                    regex::escape(token)
                };
                RegexBuilder::new(&pattern)
                    .case_insensitive(query.case_insensitive)
                    .build()
                    .map_err(|e| Error::invalid_pattern(token, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TextMatcher::Regex(regexes))
    }

    fn matches(&self, haystack: &str) -> bool {
        match self {
            TextMatcher::Any => true,
            TextMatcher::Substring(needles) => {
                needles.iter().all(|needle| haystack.contains(needle.as_str()))
            }
            TextMatcher::Regex(regexes) => regexes.iter().all(|re| re.is_match(haystack)),
        }
    }
}

/// Recency predicate; half-open window, so exactly `window` old is stale
fn changed_within(record: &impl Record, big_only: bool, now: DateTime<Utc>, window: Duration) -> bool {
    let changed_at = if big_only {
        record.last_big_update_time()
    } else {
        record.last_update_time()
    };
    now.signed_duration_since(changed_at) < window
}

/// Query evaluator
#[derive(Debug, Clone)]
pub struct SearchEngine {
    recent_window: Duration,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_RECENT_WINDOW_SECS))
    }
}

impl SearchEngine {
    /// Create an engine with a custom recent window
    pub fn new(recent_window: Duration) -> Self {
        Self { recent_window }
    }

    /// Run a query, turning an invalid expression into an empty result
    ///
    /// The diagnostic for an invalid expression is logged at warn level.
    pub fn search<'a>(
        &self,
        store: &'a RecordStore,
        query: &SearchQuery,
        now: DateTime<Utc>,
    ) -> Vec<RecordView<'a>> {
        match self.try_search(store, query, now) {
            Ok(results) => results,
            Err(e) => {
                warn!("{}", e);
                Vec::new()
            }
        }
    }

    /// Run a query
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<RecordView>)`: matches sorted by name (byte order)
    /// - `Err(Error::InvalidPattern)`: a regex token failed to compile; no
    ///   partial results are produced
    pub fn try_search<'a>(
        &self,
        store: &'a RecordStore,
        query: &SearchQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<RecordView<'a>>> {
        let matcher = TextMatcher::compile(query)?;

        let accept = |view: &RecordView<'a>| -> bool {
            // Recency first: it is cheap and rejects most records.
            if query.recent_only
                && !changed_within(view, query.big_changes_only, now, self.recent_window)
            {
                return false;
            }
            matcher.matches(view.name())
        };

        let values = store
            .values()
            .iter()
            .filter(|_| query.include_values)
            .map(RecordView::Value);
        let commands = store
            .commands()
            .iter()
            .filter(|_| query.include_commands)
            .map(RecordView::Command);

        let mut results: Vec<RecordView<'a>> = values.chain(commands).filter(|v| accept(v)).collect();
        results.sort_by(|a, b| a.name().cmp(b.name()));

        info!("Search found {} results", results.len());
        Ok(results)
    }
}
