//! Search query language
//!
//! Whitespace-separated tokens; each token is either `operator:value` or a
//! bare term. Supported operators: `ext`, `size`, `dm`, `path`, `type`,
//! `regex`. Bare terms support `!` negation, `a|b` alternation, `*`/`?`
//! wildcards, and `"quoted phrases"`. Bare terms AND together; alternation
//! terms OR together.
//!
//! Size units are 1024-based (`b`, `kb`, `mb`, `gb`, `tb`, case-insensitive).
//! Dates accept `YYYY-MM-DD`, `YYYY/MM/DD`, `MM-DD-YYYY`, and the keywords
//! `today`, `yesterday`, `thisweek`, `thismonth`, `thisyear`.
//!
//! An unparseable `regex:` value degrades to a literal term rather than
//! failing the whole query.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use tracing::debug;

use megacustom_core::wildcard::wildcard_match;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// File/folder restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    Any,
    FileOnly,
    FolderOnly,
}

/// Structured form of a query string
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    /// Bare terms; all must match name or path
    pub terms: Vec<String>,
    /// `!term` exclusions on name and path
    pub not_terms: Vec<String>,
    /// `a|b` alternation; at least one must match the name
    pub or_terms: Vec<String>,
    /// `*`/`?` patterns; all must match the name
    pub wildcards: Vec<String>,
    /// Extension allow-set, lowercase without dots
    pub extensions: Vec<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    /// Case-insensitive path substring
    pub path_contains: Option<String>,
    pub type_filter: TypeFilter,
    /// Case-insensitive name regex
    pub regex: Option<Regex>,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
            && self.not_terms.is_empty()
            && self.or_terms.is_empty()
            && self.wildcards.is_empty()
            && self.extensions.is_empty()
            && self.min_size.is_none()
            && self.max_size.is_none()
            && self.min_date.is_none()
            && self.max_date.is_none()
            && self.path_contains.is_none()
            && self.type_filter == TypeFilter::Any
            && self.regex.is_none()
    }

    /// Canonical string form for the supported subset
    ///
    /// Re-parsing the result reproduces this query, except for date bounds
    /// that are not midnight-aligned (single-day `dm:` queries), which are
    /// omitted.
    pub fn to_query_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        for term in &self.terms {
            parts.push(term.clone());
        }
        for term in &self.not_terms {
            parts.push(format!("!{term}"));
        }
        if !self.or_terms.is_empty() {
            parts.push(self.or_terms.join("|"));
        }
        for pattern in &self.wildcards {
            parts.push(pattern.clone());
        }
        if !self.extensions.is_empty() {
            parts.push(format!("ext:{}", self.extensions.join(",")));
        }
        match self.type_filter {
            TypeFilter::Any => {}
            TypeFilter::FileOnly => parts.push("type:file".to_string()),
            TypeFilter::FolderOnly => parts.push("type:folder".to_string()),
        }
        if let Some(path) = &self.path_contains {
            parts.push(format!("path:{path}"));
        }
        match (self.min_size, self.max_size) {
            (Some(min), Some(max)) => parts.push(format!("size:{min}b-{max}b")),
            (Some(min), None) => parts.push(format!("size:>{min}b")),
            (None, Some(max)) => parts.push(format!("size:<{max}b")),
            (None, None) => {}
        }
        let fmt_date = |d: &DateTime<Utc>| d.format("%Y-%m-%d").to_string();
        let is_midnight = |d: &DateTime<Utc>| {
            d.time() == chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap()
        };
        match (&self.min_date, &self.max_date) {
            (Some(min), Some(max)) if is_midnight(min) && is_midnight(max) => {
                parts.push(format!("dm:{}-{}", fmt_date(min), fmt_date(max)));
            }
            (Some(min), None) if is_midnight(min) => {
                parts.push(format!("dm:>{}", fmt_date(min)));
            }
            (None, Some(max)) if is_midnight(max) => {
                parts.push(format!("dm:<{}", fmt_date(max)));
            }
            _ => {}
        }
        if let Some(regex) = &self.regex {
            parts.push(format!("regex:{}", regex.as_str()));
        }

        parts.join(" ")
    }
}

impl PartialEq for ParsedQuery {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
            && self.not_terms == other.not_terms
            && self.or_terms == other.or_terms
            && self.wildcards == other.wildcards
            && self.extensions == other.extensions
            && self.min_size == other.min_size
            && self.max_size == other.max_size
            && self.min_date == other.min_date
            && self.max_date == other.max_date
            && self.path_contains == other.path_contains
            && self.type_filter == other.type_filter
            && self.regex.as_ref().map(Regex::as_str) == other.regex.as_ref().map(Regex::as_str)
    }
}

/// Stateless parser and matcher for the query language
#[derive(Debug, Default)]
pub struct QueryParser;

impl QueryParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, query: &str) -> ParsedQuery {
        let mut result = ParsedQuery::default();
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return result;
        }

        for token in tokenize(trimmed) {
            self.parse_token(&token, &mut result);
        }

        // Nothing recognized at all: treat the whole query as one term
        if result.is_empty() {
            let whole = trimmed.to_lowercase();
            if whole.contains('*') || whole.contains('?') {
                result.wildcards.push(whole);
            } else {
                result.terms.push(whole);
            }
        }

        result
    }

    fn parse_token(&self, token: &str, result: &mut ParsedQuery) {
        if let Some((op, value)) = split_operator(token) {
            match op.as_str() {
                "ext" => {
                    for ext in value.to_lowercase().split(',') {
                        let clean = ext.trim().trim_start_matches('.');
                        if !clean.is_empty() {
                            result.extensions.push(clean.to_string());
                        }
                    }
                }
                "size" => parse_size_range(value, result),
                "dm" => parse_date_range(value, result),
                "path" => result.path_contains = Some(value.to_lowercase()),
                "type" => match value.to_lowercase().as_str() {
                    "folder" | "dir" | "directory" => {
                        result.type_filter = TypeFilter::FolderOnly
                    }
                    "file" => result.type_filter = TypeFilter::FileOnly,
                    _ => {}
                },
                "regex" => match regex::RegexBuilder::new(value)
                    .case_insensitive(true)
                    .build()
                {
                    Ok(regex) => result.regex = Some(regex),
                    Err(_) => {
                        // Degrade to a literal term
                        debug!(pattern = value, "Invalid regex in query, using as term");
                        result.terms.push(value.to_lowercase());
                    }
                },
                _ => unreachable!("split_operator only returns known operators"),
            }
            return;
        }

        // Bare term handling
        let (negated, rest) = match token.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let rest = rest.trim_matches('"');
        if rest.is_empty() {
            return;
        }

        if rest.contains('|') {
            for part in rest.split('|').filter(|p| !p.is_empty()) {
                result.or_terms.push(part.trim().to_lowercase());
            }
            return;
        }
        if rest.contains('*') || rest.contains('?') {
            result.wildcards.push(rest.to_lowercase());
            return;
        }
        if negated {
            result.not_terms.push(rest.to_lowercase());
        } else {
            result.terms.push(rest.to_lowercase());
        }
    }

    /// Whether a node with the given attributes satisfies the query
    ///
    /// Predicate order: type, NOT terms, extension, size, date, path,
    /// regex, wildcards, OR set, AND terms - short-circuiting on the first
    /// failed check.
    #[allow(clippy::too_many_arguments)]
    pub fn matches(
        &self,
        query: &ParsedQuery,
        name: &str,
        name_lower: &str,
        path_lower: &str,
        extension: &str,
        size: u64,
        mtime: DateTime<Utc>,
        is_folder: bool,
    ) -> bool {
        match query.type_filter {
            TypeFilter::FolderOnly if !is_folder => return false,
            TypeFilter::FileOnly if is_folder => return false,
            _ => {}
        }

        for not_term in &query.not_terms {
            if name_lower.contains(not_term) || path_lower.contains(not_term) {
                return false;
            }
        }

        if !query.extensions.is_empty() && !query.extensions.iter().any(|e| e == extension) {
            return false;
        }

        if let Some(min) = query.min_size {
            if size < min {
                return false;
            }
        }
        if let Some(max) = query.max_size {
            if size > max {
                return false;
            }
        }

        if let Some(min) = query.min_date {
            if mtime < min {
                return false;
            }
        }
        if let Some(max) = query.max_date {
            if mtime > max {
                return false;
            }
        }

        if let Some(path) = &query.path_contains {
            if !path_lower.contains(path.as_str()) {
                return false;
            }
        }

        if let Some(regex) = &query.regex {
            if !regex.is_match(name) {
                return false;
            }
        }

        for pattern in &query.wildcards {
            if !wildcard_match(name_lower, pattern) {
                return false;
            }
        }

        if !query.or_terms.is_empty()
            && !query.or_terms.iter().any(|t| name_lower.contains(t.as_str()))
        {
            return false;
        }

        for term in &query.terms {
            if !name_lower.contains(term.as_str()) && !path_lower.contains(term.as_str()) {
                return false;
            }
        }

        true
    }
}

/// Split `op:value` when `op` is a known operator
fn split_operator(token: &str) -> Option<(String, &str)> {
    let (op, value) = token.split_once(':')?;
    let op = op.to_lowercase();
    if !matches!(op.as_str(), "ext" | "size" | "dm" | "path" | "type" | "regex") {
        return None;
    }
    if value.is_empty() {
        return None;
    }
    Some((op, value))
}

/// Tokenize on whitespace, keeping `"quoted phrases"` (optionally prefixed
/// with `!`) as single tokens
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parse a single size literal like `100`, `1.5gb`, `10kb`
fn parse_size(input: &str) -> Option<u64> {
    let s = input.trim().to_lowercase();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(digits_end);
    let value: f64 = number.parse().ok()?;
    let multiplier = match unit.trim() {
        "" | "b" => 1,
        "kb" => KB,
        "mb" => MB,
        "gb" => GB,
        "tb" => TB,
        _ => return None,
    };
    Some((value * multiplier as f64) as u64)
}

fn parse_size_range(input: &str, query: &mut ParsedQuery) {
    let s = input.trim();

    // Range form: min-max, both sides valid sizes
    if let Some(idx) = s.find('-') {
        if idx > 0 && idx < s.len() - 1 {
            let (left, right) = (&s[..idx], &s[idx + 1..]);
            if let (Some(min), Some(max)) = (parse_size(left), parse_size(right)) {
                query.min_size = Some(min);
                query.max_size = Some(max);
                return;
            }
        }
    }

    if let Some(rest) = s.strip_prefix('>') {
        query.min_size = parse_size(rest);
    } else if let Some(rest) = s.strip_prefix('<') {
        query.max_size = parse_size(rest);
    } else if let Some(size) = parse_size(s) {
        // Exact size matches with a 5% tolerance band
        let tolerance = size / 20;
        query.min_size = Some(size - tolerance);
        query.max_size = Some(size + tolerance);
    }
}

/// Parse one date literal or keyword into the start of that day (UTC)
fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim().to_lowercase();
    let today = Utc::now().date_naive();

    let date = match s.as_str() {
        "today" => Some(today),
        "yesterday" => Some(today - Duration::days(1)),
        "thisweek" => Some(today - Duration::days(7)),
        "thismonth" => today.checked_sub_months(chrono::Months::new(1)),
        "thisyear" => today.with_year(today.year() - 1),
        _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&s, "%Y/%m/%d"))
            .or_else(|_| NaiveDate::parse_from_str(&s, "%m-%d-%Y"))
            .ok(),
    }?;

    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()
}

fn parse_date_range(input: &str, query: &mut ParsedQuery) {
    let s = input.trim();

    // Explicit range with ".."
    if let Some((left, right)) = s.split_once("..") {
        if let (Some(min), Some(max)) = (parse_date(left), parse_date(right)) {
            query.min_date = Some(min);
            query.max_date = Some(max);
            return;
        }
    }

    // Range with '-': dates themselves contain dashes, so try every split
    // point and take the first where both halves parse
    for (idx, c) in s.char_indices() {
        if c != '-' || idx == 0 || idx == s.len() - 1 {
            continue;
        }
        if let (Some(min), Some(max)) = (parse_date(&s[..idx]), parse_date(&s[idx + 1..])) {
            query.min_date = Some(min);
            query.max_date = Some(max);
            return;
        }
    }

    if let Some(rest) = s.strip_prefix('>') {
        query.min_date = parse_date(rest);
    } else if let Some(rest) = s.strip_prefix('<') {
        query.max_date = parse_date(rest);
    } else if let Some(date) = parse_date(s) {
        // A single date matches that whole day
        query.min_date = Some(date);
        query.max_date = Some(date + Duration::days(1) - Duration::seconds(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(q: &str) -> ParsedQuery {
        QueryParser::new().parse(q)
    }

    #[test]
    fn test_bare_terms_and_not() {
        let q = parse("report size:>10mb ext:pdf !draft");
        assert_eq!(q.terms, vec!["report"]);
        assert_eq!(q.not_terms, vec!["draft"]);
        assert_eq!(q.extensions, vec!["pdf"]);
        assert_eq!(q.min_size, Some(10 * MB));
        assert_eq!(q.max_size, None);
        assert_eq!(q.type_filter, TypeFilter::Any);
    }

    #[test]
    fn test_scenario_matching() {
        let parser = QueryParser::new();
        let q = parser.parse("report size:>10mb ext:pdf !draft");
        let now = Utc::now();

        // report_final.pdf at 15 MB matches
        assert!(parser.matches(
            &q,
            "report_final.pdf",
            "report_final.pdf",
            "/docs/report_final.pdf",
            "pdf",
            15 * MB,
            now,
            false
        ));
        // draft is excluded
        assert!(!parser.matches(
            &q,
            "report_draft.pdf",
            "report_draft.pdf",
            "/docs/report_draft.pdf",
            "pdf",
            15 * MB,
            now,
            false
        ));
        // wrong extension
        assert!(!parser.matches(
            &q,
            "report.docx",
            "report.docx",
            "/docs/report.docx",
            "docx",
            15 * MB,
            now,
            false
        ));
        // too small
        assert!(!parser.matches(
            &q,
            "report_final.pdf",
            "report_final.pdf",
            "/docs/report_final.pdf",
            "pdf",
            5 * MB,
            now,
            false
        ));
    }

    #[test]
    fn test_extension_list_and_dots() {
        let q = parse("ext:.pdf,DOCX");
        assert_eq!(q.extensions, vec!["pdf", "docx"]);
    }

    #[test]
    fn test_size_forms() {
        assert_eq!(parse("size:>100mb").min_size, Some(100 * MB));
        assert_eq!(parse("size:<1gb").max_size, Some(GB));

        let q = parse("size:10kb-50mb");
        assert_eq!(q.min_size, Some(10 * KB));
        assert_eq!(q.max_size, Some(50 * MB));

        // Exact size gets a 5% tolerance band
        let q = parse("size:50mb");
        let exact = 50 * MB;
        assert_eq!(q.min_size, Some(exact - exact / 20));
        assert_eq!(q.max_size, Some(exact + exact / 20));

        // Fractional values
        assert_eq!(parse("size:>1.5kb").min_size, Some(1536));
    }

    #[test]
    fn test_date_forms() {
        let q = parse("dm:2024-03-01");
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(q.min_date, Some(start));
        assert_eq!(
            q.max_date,
            Some(start + Duration::days(1) - Duration::seconds(1))
        );

        let q = parse("dm:>2024-01-15");
        assert_eq!(
            q.min_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );

        // Full-date range split despite dashes inside the dates
        let q = parse("dm:2024-01-01-2024-06-30");
        assert_eq!(
            q.min_date,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            q.max_date,
            Some(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap())
        );

        // Alternate date formats
        let q = parse("dm:2024/03/01");
        assert!(q.min_date.is_some());
        let q = parse("dm:03-01-2024");
        assert_eq!(
            q.min_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );

        // Keywords resolve to some bound
        assert!(parse("dm:today").min_date.is_some());
        assert!(parse("dm:thisweek").min_date.is_some());
    }

    #[test]
    fn test_type_filter() {
        assert_eq!(parse("type:file").type_filter, TypeFilter::FileOnly);
        assert_eq!(parse("type:folder").type_filter, TypeFilter::FolderOnly);
        assert_eq!(parse("type:dir").type_filter, TypeFilter::FolderOnly);
    }

    #[test]
    fn test_wildcards_and_or() {
        let q = parse("*.mp4");
        assert_eq!(q.wildcards, vec!["*.mp4"]);

        let q = parse("test?.doc");
        assert_eq!(q.wildcards, vec!["test?.doc"]);

        let q = parse("photo|video");
        assert_eq!(q.or_terms, vec!["photo", "video"]);
        assert!(q.terms.is_empty());
    }

    #[test]
    fn test_quoted_phrase() {
        let q = parse("\"annual report\" ext:pdf");
        assert_eq!(q.terms, vec!["annual report"]);
        assert_eq!(q.extensions, vec!["pdf"]);
    }

    #[test]
    fn test_regex_operator_and_fallback() {
        let q = parse(r"regex:^foo.*\.pdf$");
        assert!(q.regex.is_some());
        assert!(q.regex.as_ref().unwrap().is_match("FOO_bar.pdf"));

        // Invalid regex degrades to a literal term
        let q = parse("regex:([unclosed");
        assert!(q.regex.is_none());
        assert_eq!(q.terms, vec!["([unclosed"]);
    }

    #[test]
    fn test_empty_queries() {
        assert!(parse("").is_empty());
        assert!(parse("   \t  ").is_empty());
    }

    #[test]
    fn test_path_operator() {
        let parser = QueryParser::new();
        let q = parser.parse("path:Documents");
        assert_eq!(q.path_contains.as_deref(), Some("documents"));
        assert!(parser.matches(
            &q,
            "x.txt",
            "x.txt",
            "/my documents/x.txt",
            "txt",
            0,
            Utc::now(),
            false
        ));
    }

    #[test]
    fn test_matching_is_position_independent() {
        // The predicate depends only on attributes passed in, so the same
        // inputs always give the same answer
        let parser = QueryParser::new();
        let q = parser.parse("notes ext:txt");
        let now = Utc::now();
        for _ in 0..3 {
            assert!(parser.matches(
                &q, "notes.txt", "notes.txt", "/notes.txt", "txt", 10, now, false
            ));
        }
    }

    #[test]
    fn test_round_trip_canonical_form() {
        let parser = QueryParser::new();
        for q in [
            "report !draft ext:pdf,docx size:>10mb",
            "*.mp4 type:file",
            "photo|video path:media",
            "size:10kb-50mb",
            "dm:>2024-01-15 budget",
            "size:50mb",
            r"regex:^inv.*\d+$",
        ] {
            let parsed = parser.parse(q);
            let reparsed = parser.parse(&parsed.to_query_string());
            assert_eq!(parsed, reparsed, "round-trip failed for {q:?}");
        }
    }
}
