//! Pure construction of relevance-scored queries
//!
//! A [`ScoredQuery`] carries both the parameterized statement sent to a SQL
//! engine and the same scoring plan in executable form, so engines that scan
//! payloads themselves rank rows exactly like the statement would.

use bon::bon;
use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::Serialize;

use crate::config::PartitionConfig;
use crate::entry::{Category, PartitionDay};

use super::error::{QueryError, Result};

/// Fully qualified table the archive is registered under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// `"database"."table"`
    pub fn qualified(&self) -> String {
        format!("\"{}\".\"{}\"", self.database, self.table)
    }
}

impl From<&PartitionConfig> for TableRef {
    fn from(config: &PartitionConfig) -> Self {
        Self::new(config.database.clone(), config.table.clone())
    }
}

/// Additive relevance weights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    /// Term found as a whole token
    pub exact: u32,
    /// Per raw occurrence of the full term
    pub substring: u32,
    pub substring_cap: u32,
    /// Per raw occurrence of any single word of the term
    pub word: u32,
    pub word_cap: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            exact: 100,
            substring: 10,
            substring_cap: 50,
            word: 5,
            word_cap: 25,
        }
    }
}

/// Executable form of the scoring expression
#[derive(Debug, Clone)]
pub struct ScoringPlan {
    pub term: String,
    pub words: Vec<String>,
    pub whole_token: Regex,
    pub weights: ScoreWeights,
}

impl ScoringPlan {
    /// Plan for `term` (trimmed, lowercased). Fails on an empty term.
    pub fn new(term: &str, weights: ScoreWeights) -> Result<Self> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Err(QueryError::EmptyTerm);
        }

        let words = term.split_whitespace().map(str::to_string).collect();
        let whole_token = Regex::new(&whole_token_pattern(&term))?;

        Ok(Self {
            term,
            words,
            whole_token,
            weights,
        })
    }

    /// Score a row's search text; zero means "no match"
    pub fn score(&self, text: &str) -> u32 {
        let text = text.to_lowercase();
        let w = &self.weights;

        let exact = if self.whole_token.is_match(&text) {
            w.exact
        } else {
            0
        };

        let hits = occurrences(&text, &self.term);
        let substring = w.substring.saturating_mul(hits).min(w.substring_cap);

        let word_hits: u32 = self.words.iter().map(|word| occurrences(&text, word)).sum();
        let word = w.word.saturating_mul(word_hits).min(w.word_cap);

        exact + substring + word
    }
}

fn occurrences(text: &str, needle: &str) -> u32 {
    u32::try_from(text.matches(needle).count()).unwrap_or(u32::MAX)
}

/// Term bounded by start/end of text, whitespace, punctuation or symbols (`=`, `|`, ...)
fn whole_token_pattern(term: &str) -> String {
    format!(
        r"(?:^|[\s\p{{P}}\p{{S}}]){}(?:$|[\s\p{{P}}\p{{S}}])",
        regex::escape(term)
    )
}

/// Partition columns the scan is restricted to.
///
/// Years are always bounded. Months only when both ends share a year, days
/// only when they also share a month, since a month range across a year
/// boundary (e.g. 11..02) would exclude valid partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionFilter {
    pub category: Category,
    pub years: (i32, i32),
    pub months: Option<(u32, u32)>,
    pub days: Option<(u32, u32)>,
}

impl PartitionFilter {
    pub fn for_window(category: Category, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let same_year = start.year() == end.year();
        let same_month = same_year && start.month() == end.month();

        Self {
            category,
            years: (start.year(), end.year()),
            months: same_year.then(|| (start.month(), end.month())),
            days: same_month.then(|| (start.day(), end.day())),
        }
    }

    pub fn matches(&self, day: &PartitionDay) -> bool {
        let within = |value, (lo, hi)| value >= lo && value <= hi;

        day.category == self.category
            && day.date.year() >= self.years.0
            && day.date.year() <= self.years.1
            && self.months.is_none_or(|range| within(day.date.month(), range))
            && self.days.is_none_or(|range| within(day.date.day(), range))
    }
}

/// Positional statement parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryParam {
    Text(String),
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bigint,
    Integer,
    Varchar,
}

/// Result column the caller expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnType,
}

pub const RESULT_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec {
        name: "timestamp",
        kind: ColumnType::Bigint,
    },
    ColumnSpec {
        name: "payload",
        kind: ColumnType::Varchar,
    },
    ColumnSpec {
        name: "score",
        kind: ColumnType::Integer,
    },
];

/// A scored search, ready for any [`QueryEngine`](super::QueryEngine)
#[derive(Debug, Clone)]
pub struct ScoredQuery {
    pub table: TableRef,
    pub category: Category,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: usize,
    pub partitions: PartitionFilter,
    pub plan: ScoringPlan,
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub columns: Vec<ColumnSpec>,
}

#[bon]
impl ScoredQuery {
    #[builder]
    pub fn new(
        table: TableRef,
        category: Category,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        #[builder(into)] term: String,
        #[builder(default)] weights: ScoreWeights,
        limit: usize,
    ) -> Result<Self> {
        if start > end {
            return Err(QueryError::InvalidWindow {
                start: start.timestamp_millis(),
                end: end.timestamp_millis(),
            });
        }
        if limit == 0 {
            return Err(QueryError::ZeroLimit);
        }

        let plan = ScoringPlan::new(&term, weights)?;
        let partitions = PartitionFilter::for_window(category, start, end);
        let (sql, params) = render(&table, &plan, &partitions, start, end, limit);

        Ok(Self {
            table,
            category,
            start,
            end,
            limit,
            partitions,
            plan,
            sql,
            params,
            columns: RESULT_COLUMNS.to_vec(),
        })
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn in_window(&self, timestamp: i64) -> bool {
        timestamp >= self.start_millis() && timestamp <= self.end_millis()
    }
}

const TEXT_COLUMN: &str = "\"searchtext\"";

/// Occurrences of one `?` needle in the text column
fn occurrence_expr() -> String {
    format!(
        "((length({c}) - length(replace({c}, ?, ''))) / length(?))",
        c = TEXT_COLUMN
    )
}

fn render(
    table: &TableRef,
    plan: &ScoringPlan,
    partitions: &PartitionFilter,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
) -> (String, Vec<QueryParam>) {
    let w = &plan.weights;
    let mut params = Vec::new();

    let exact = format!(
        "CASE WHEN regexp_like({}, ?) THEN {} ELSE 0 END",
        TEXT_COLUMN, w.exact
    );
    params.push(QueryParam::Text(plan.whole_token.as_str().to_string()));

    let substring = format!(
        "least({} * {}, {})",
        w.substring,
        occurrence_expr(),
        w.substring_cap
    );
    params.push(QueryParam::Text(plan.term.clone()));
    params.push(QueryParam::Text(plan.term.clone()));

    let word_sum: Vec<String> = plan.words.iter().map(|_| occurrence_expr()).collect();
    for word in &plan.words {
        params.push(QueryParam::Text(word.clone()));
        params.push(QueryParam::Text(word.clone()));
    }
    let word = format!("least({} * ({}), {})", w.word, word_sum.join(" + "), w.word_cap);

    let mut filters = vec!["\"category\" = ?".to_string()];
    params.push(QueryParam::Text(partitions.category.as_str().to_string()));

    filters.push("\"year\" BETWEEN ? AND ?".to_string());
    params.push(QueryParam::Int(partitions.years.0.into()));
    params.push(QueryParam::Int(partitions.years.1.into()));

    if let Some((lo, hi)) = partitions.months {
        filters.push("\"month\" BETWEEN ? AND ?".to_string());
        params.push(QueryParam::Int(lo.into()));
        params.push(QueryParam::Int(hi.into()));
    }
    if let Some((lo, hi)) = partitions.days {
        filters.push("\"day\" BETWEEN ? AND ?".to_string());
        params.push(QueryParam::Int(lo.into()));
        params.push(QueryParam::Int(hi.into()));
    }

    filters.push("\"timestamp\" BETWEEN ? AND ?".to_string());
    params.push(QueryParam::Int(start.timestamp_millis()));
    params.push(QueryParam::Int(end.timestamp_millis()));

    let sql = format!(
        "SELECT \"timestamp\", \"payload\", \"score\" FROM (\n  \
         SELECT \"timestamp\", \"payload\", ({exact}) + ({substring}) + ({word}) AS \"score\"\n  \
         FROM {table}\n  \
         WHERE {filters}\n\
         )\n\
         WHERE \"score\" > 0\n\
         ORDER BY \"score\" DESC, \"timestamp\" DESC\n\
         LIMIT ?",
        table = table.qualified(),
        filters = filters.join("\n    AND "),
    );
    params.push(QueryParam::Int(i64::try_from(limit).unwrap_or(i64::MAX)));

    (sql, params)
}
