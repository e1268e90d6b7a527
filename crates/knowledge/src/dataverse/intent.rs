//! Natural-language intent parsing for table questions.
//!
//! Pure keyword and pattern matching; no I/O and no schema knowledge. The
//! parser only extracts what the text says: a metric, a table word, an
//! optional field hint, a year and a residual search term.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Aggregate metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Sum,
    Avg,
    Count,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "count",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for a single aggregate value over a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateIntent {
    pub metric: Metric,

    /// Field named by the user, matched against numeric fields later
    pub field: Option<String>,

    pub table: String,
    pub year: Option<i32>,
}

/// A request to list records from a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainQuery {
    pub table: String,
    pub term: Option<String>,
    pub year: Option<i32>,
}

/// Parsed intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    Aggregate(AggregateIntent),
    PlainQuery(PlainQuery),
    Unrecognized,
}

/// Words that never name a table.
const STOPWORDS: &[&str] = &["the", "a", "an", "this", "that", "my"];

const CONTROL_WORDS: &[&str] = &[
    "show", "list", "records", "entries", "items", "get", "find", "display", "top", "all",
];

/// Skipped while looking for a field hint after the metric keyword.
const HINT_SKIP: &[&str] = &["of", "the", "a", "an", "this", "that", "my", "records", "entries", "items"];

/// End the field-hint scan.
const HINT_STOP: &[&str] = &["from", "in", "table", "for", "by", "during"];

static COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(count|how many)\b").expect("Invalid regex"));
static SUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(total|sum)\b").expect("Invalid regex"));
static AVG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(avg|average|mean)\b").expect("Invalid regex"));

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(20\d{2})\b").expect("Invalid regex"));

/// Table patterns in priority order; group 1 is the table word.
static TABLE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\btable\s+(?:named\s+)?([A-Za-z0-9_]+)\b",
        r"(?i)\bfrom\s+(?:(?:the|a|an|this|that|my)\s+)?([A-Za-z0-9_]+)\b",
        r"(?i)\bin\s+table\s+([A-Za-z0-9_]+)\b",
        r"(?i)\bof\s+(?:(?:the|a|an|this|that|my)\s+)?([A-Za-z0-9_]+)\b",
        r"(?i)\b(?:list|show|get|find|display)\s+(?:me\s+)?(?:all\s+|top\s+\d+\s+)?([A-Za-z0-9_]+)\b",
        r"(?i)\bhow\s+many\s+([A-Za-z0-9_]+)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid regex"))
    .collect()
});

static FILLER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(show|list|records|entries|items|get|find|display|top|all|the|a|an|this|that|my|me|in|with|containing|named|matching|about|for)\b",
    )
    .expect("Invalid regex")
});

static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Parse free text into an intent.
///
/// # Example
/// ```
/// use tally_knowledge::dataverse::{parse_intent, Intent, Metric};
///
/// match parse_intent("total revenue from opportunity in 2024") {
///     Intent::Aggregate(intent) => {
///         assert_eq!(intent.metric, Metric::Sum);
///         assert_eq!(intent.table, "opportunity");
///         assert_eq!(intent.field.as_deref(), Some("revenue"));
///         assert_eq!(intent.year, Some(2024));
///     }
///     other => panic!("unexpected intent: {:?}", other),
/// }
/// ```
pub fn parse_intent(text: &str) -> Intent {
    let Some((table, table_span)) = extract_table(text) else {
        return Intent::Unrecognized;
    };
    let year = extract_year(text);

    match detect_metric(text) {
        Some((metric, keyword_end)) => Intent::Aggregate(AggregateIntent {
            metric,
            field: match metric {
                Metric::Count => None,
                _ => field_hint(&text[keyword_end..], &table),
            },
            table,
            year,
        }),
        None => Intent::PlainQuery(PlainQuery {
            term: search_term(text, table_span),
            table,
            year,
        }),
    }
}

/// Metric and the byte offset just past its keyword.
fn detect_metric(text: &str) -> Option<(Metric, usize)> {
    [
        (&*COUNT_RE, Metric::Count),
        (&*SUM_RE, Metric::Sum),
        (&*AVG_RE, Metric::Avg),
    ]
    .into_iter()
    .find_map(|(re, metric)| re.find(text).map(|m| (metric, m.end())))
}

fn is_table_word(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    !STOPWORDS.contains(&lower.as_str())
        && !CONTROL_WORDS.contains(&lower.as_str())
        && lower != "me"
        && !lower.chars().all(|c| c.is_ascii_digit())
}

fn extract_table(text: &str) -> Option<(String, Range<usize>)> {
    TABLE_PATTERNS.iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let word = caps.get(1)?;
            let whole = caps.get(0)?;
            is_table_word(word.as_str()).then(|| (word.as_str().to_string(), whole.range()))
        })
    })
}

fn extract_year(text: &str) -> Option<i32> {
    YEAR_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn field_hint(after_keyword: &str, table: &str) -> Option<String> {
    for token in after_keyword
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
    {
        let lower = token.to_ascii_lowercase();
        if HINT_STOP.contains(&lower.as_str()) || lower.eq_ignore_ascii_case(table) {
            return None;
        }
        if HINT_SKIP.contains(&lower.as_str()) {
            continue;
        }
        if lower.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        return Some(token.to_string());
    }
    None
}

fn search_term(text: &str, table_span: Range<usize>) -> Option<String> {
    let mut remainder = String::with_capacity(text.len());
    remainder.push_str(&text[..table_span.start]);
    remainder.push(' ');
    remainder.push_str(&text[table_span.end..]);

    let without_year = YEAR_RE.replace_all(&remainder, " ");
    let without_filler = FILLER_RE.replace_all(&without_year, " ");
    let collapsed = SPACE_RE.replace_all(&without_filler, " ");
    let term = collapsed
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string();

    (term.chars().count() >= 3).then_some(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(text: &str) -> AggregateIntent {
        match parse_intent(text) {
            Intent::Aggregate(intent) => intent,
            other => panic!("expected aggregate for {:?}, got {:?}", text, other),
        }
    }

    fn plain(text: &str) -> PlainQuery {
        match parse_intent(text) {
            Intent::PlainQuery(query) => query,
            other => panic!("expected plain query for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_count_with_year() {
        let intent = aggregate("count records from account in 2099");
        assert_eq!(intent.metric, Metric::Count);
        assert_eq!(intent.table, "account");
        assert_eq!(intent.year, Some(2099));
        assert_eq!(intent.field, None);
    }

    #[test]
    fn test_metric_keywords() {
        assert_eq!(aggregate("how many rows in table contact").metric, Metric::Count);
        assert_eq!(aggregate("sum of amount from sales").metric, Metric::Sum);
        assert_eq!(aggregate("average price from product").metric, Metric::Avg);
        assert_eq!(aggregate("mean quantity from orders").metric, Metric::Avg);
    }

    #[test]
    fn test_field_hint() {
        assert_eq!(
            aggregate("sum of cr5cd_amount from cr5cd_sales").field.as_deref(),
            Some("cr5cd_amount")
        );
        assert_eq!(aggregate("total from sales in 2024").field, None);
        assert_eq!(
            aggregate("What is the average Price from product?").field.as_deref(),
            Some("Price")
        );
    }

    #[test]
    fn test_table_pattern_priority() {
        // "table" beats "from"
        assert_eq!(aggregate("total amount from x in table sales").table, "sales");
        assert_eq!(aggregate("sum revenue in table named orders").table, "orders");
        // "from" beats "of"
        assert_eq!(aggregate("sum of amount from invoices").table, "invoices");
        assert_eq!(aggregate("count of contacts").table, "contacts");
    }

    #[test]
    fn test_stopwords_are_not_tables() {
        assert_eq!(aggregate("count rows from the table account").table, "account");
        assert_eq!(parse_intent("sum of the"), Intent::Unrecognized);
    }

    #[test]
    fn test_leading_article_before_table() {
        let intent = aggregate("count of the accounts");
        assert_eq!(intent.metric, Metric::Count);
        assert_eq!(intent.table, "accounts");

        let intent = aggregate("total revenue from the opportunity in 2024");
        assert_eq!(intent.table, "opportunity");
        assert_eq!(intent.field.as_deref(), Some("revenue"));
        assert_eq!(intent.year, Some(2024));

        assert_eq!(aggregate("average of an invoice").table, "invoice");
        assert_eq!(aggregate("count of another").table, "another");
    }

    #[test]
    fn test_listing_verb() {
        let query = plain("list all accounts");
        assert_eq!(query.table, "accounts");
        assert_eq!(query.term, None);
        assert_eq!(query.year, None);

        assert_eq!(plain("show top 5 contacts").table, "contacts");
        assert_eq!(plain("show me all leads").table, "leads");
    }

    #[test]
    fn test_plain_query_term_and_year() {
        let query = plain("show records from account containing contoso");
        assert_eq!(query.table, "account");
        assert_eq!(query.term.as_deref(), Some("contoso"));

        let query = plain("list records from contact in 2023");
        assert_eq!(query.year, Some(2023));
        assert_eq!(query.term, None);
    }

    #[test]
    fn test_short_term_dropped() {
        assert_eq!(plain("find records from lead xy").term, None);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(parse_intent("hello there"), Intent::Unrecognized);
        assert_eq!(parse_intent(""), Intent::Unrecognized);
    }
}
