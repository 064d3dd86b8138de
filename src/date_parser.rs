//! Free-text period labels ("Jan-25", "enero 2025", "Q1 2025", "01/2025")
//! to canonical [`PeriodDefinition`]s and calendar dates.

use crate::schema::{PeriodDefinition, PeriodMatchKind, PeriodType};
use crate::utils::{
    contains_term, current_year, expand_two_digit_year, first_day_of_month, last_day_of_month,
    normalize_text, quarter_bounds, year_bounds,
};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// English and Spanish month names and abbreviations, accent-folded.
const MONTH_LEXICON: &[(&str, u32)] = &[
    ("january", 1),
    ("jan", 1),
    ("enero", 1),
    ("ene", 1),
    ("february", 2),
    ("feb", 2),
    ("febrero", 2),
    ("march", 3),
    ("mar", 3),
    ("marzo", 3),
    ("april", 4),
    ("apr", 4),
    ("abril", 4),
    ("abr", 4),
    ("may", 5),
    ("mayo", 5),
    ("june", 6),
    ("jun", 6),
    ("junio", 6),
    ("july", 7),
    ("jul", 7),
    ("julio", 7),
    ("august", 8),
    ("aug", 8),
    ("agosto", 8),
    ("ago", 8),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("septiembre", 9),
    ("setiembre", 9),
    ("set", 9),
    ("october", 10),
    ("oct", 10),
    ("octubre", 10),
    ("november", 11),
    ("nov", 11),
    ("noviembre", 11),
    ("december", 12),
    ("dec", 12),
    ("diciembre", 12),
    ("dic", 12),
];

const TOTAL_TERMS: &[&str] = &["total", "ytd"];

fn month_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<month>[a-z]+)\.?\s*[-/ ]?\s*'?(?P<year>\d{4}|\d{2})$")
            .expect("invalid month-year regex")
    })
}

fn numeric_month_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<month>\d{1,2})\s*[/.\-]\s*(?P<year>\d{4})$")
            .expect("invalid numeric month regex")
    })
}

fn iso_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<year>\d{4})\s*[/\-]\s*(?P<month>\d{1,2})$").expect("invalid iso month regex")
    })
}

fn quarter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?:q|t)(?P<q1>[1-4])\s*[-/ ]?\s*'?(?P<y1>\d{4}|\d{2})|(?P<y2>\d{4})\s*[-/ ]?\s*(?:q|t)(?P<q2>[1-4]))$",
        )
        .expect("invalid quarter regex")
    })
}

fn month_only_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<month>[a-z]+)\.?$").expect("invalid month regex"))
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:fy|ano|ejercicio)?\s*'?(?P<year>\d{4})$").expect("invalid year regex")
    })
}

/// Month number for an English or Spanish month name or abbreviation.
pub fn month_from_name(name: &str) -> Option<u32> {
    let normalized = normalize_text(name);
    let key = normalized.trim_end_matches('.');
    MONTH_LEXICON
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, month)| *month)
}

fn plausible_year(year: i32) -> bool {
    (1900..=2100).contains(&year)
}

/// Result of matching one label against the ordered period patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatch {
    pub kind: PeriodMatchKind,
    /// Present whenever the label pins down a full period.
    pub definition: Option<PeriodDefinition>,
}

/// Matches a label against the period patterns in descending specificity.
pub fn match_label(label: &str) -> Option<LabelMatch> {
    let text = normalize_text(label);
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = month_year_re().captures(&text) {
        if let Some(month) = month_from_name(&caps["month"]) {
            let year = expand_two_digit_year(caps["year"].parse().ok()?);
            return Some(LabelMatch {
                kind: PeriodMatchKind::MonthYear,
                definition: Some(PeriodDefinition::month(year, month)),
            });
        }
    }

    if let Some(caps) = numeric_month_year_re()
        .captures(&text)
        .or_else(|| iso_month_re().captures(&text))
    {
        let month: u32 = caps["month"].parse().ok()?;
        let year: i32 = caps["year"].parse().ok()?;
        if (1..=12).contains(&month) && plausible_year(year) {
            return Some(LabelMatch {
                kind: PeriodMatchKind::MonthSlashYear,
                definition: Some(PeriodDefinition::month(year, month)),
            });
        }
    }

    if let Some(caps) = quarter_re().captures(&text) {
        let quarter: u32 = caps
            .name("q1")
            .or_else(|| caps.name("q2"))?
            .as_str()
            .parse()
            .ok()?;
        let year: i32 = caps
            .name("y1")
            .or_else(|| caps.name("y2"))?
            .as_str()
            .parse()
            .ok()?;
        return Some(LabelMatch {
            kind: PeriodMatchKind::QuarterYear,
            definition: Some(PeriodDefinition::quarter(expand_two_digit_year(year), quarter)),
        });
    }

    if let Some(caps) = month_only_re().captures(&text) {
        if month_from_name(&caps["month"]).is_some() {
            return Some(LabelMatch {
                kind: PeriodMatchKind::MonthOnly,
                definition: None,
            });
        }
    }

    if let Some(caps) = year_re().captures(&text) {
        let year: i32 = caps["year"].parse().ok()?;
        if plausible_year(year) {
            return Some(LabelMatch {
                kind: PeriodMatchKind::YearOnly,
                definition: Some(PeriodDefinition::year(year)),
            });
        }
    }

    if is_total_label(&text) {
        return Some(LabelMatch {
            kind: PeriodMatchKind::Total,
            definition: None,
        });
    }

    None
}

/// True for aggregate columns such as "Total", "TOTAL 2024" or "YTD".
pub fn is_total_label(label: &str) -> bool {
    let text = normalize_text(label);
    TOTAL_TERMS.iter().any(|term| contains_term(&text, term))
}

/// Parses a label into a [`PeriodDefinition`]. Labels that pin down no
/// month, quarter or year become `Custom` periods carrying the raw text.
pub fn parse_period_label(label: &str) -> PeriodDefinition {
    match match_label(label).and_then(|m| m.definition) {
        Some(definition) => definition,
        None => PeriodDefinition::custom(label.trim()),
    }
}

impl PeriodDefinition {
    pub fn month(year: i32, month: u32) -> Self {
        let mut definition = Self {
            period_type: PeriodType::Month,
            year,
            month: Some(month),
            quarter: None,
            custom_value: None,
            label: String::new(),
        };
        definition.label = definition.canonical_label();
        definition
    }

    pub fn quarter(year: i32, quarter: u32) -> Self {
        let mut definition = Self {
            period_type: PeriodType::Quarter,
            year,
            month: None,
            quarter: Some(quarter),
            custom_value: None,
            label: String::new(),
        };
        definition.label = definition.canonical_label();
        definition
    }

    pub fn year(year: i32) -> Self {
        Self {
            period_type: PeriodType::Year,
            year,
            month: None,
            quarter: None,
            custom_value: None,
            label: year.to_string(),
        }
    }

    pub fn custom(value: &str) -> Self {
        Self {
            period_type: PeriodType::Custom,
            year: 0,
            month: None,
            quarter: None,
            custom_value: Some(value.to_string()),
            label: value.to_string(),
        }
    }

    /// Display label derived from type, year and month/quarter.
    pub fn canonical_label(&self) -> String {
        match self.period_type {
            PeriodType::Month => match self.month.filter(|m| (1..=12).contains(m)) {
                Some(m) => format!("{} {}", MONTH_ABBREVIATIONS[(m - 1) as usize], self.year),
                None => self.year.to_string(),
            },
            PeriodType::Quarter => match self.quarter {
                Some(q) => format!("Q{} {}", q, self.year),
                None => self.year.to_string(),
            },
            PeriodType::Year => self.year.to_string(),
            PeriodType::Custom => self.custom_value.clone().unwrap_or_default(),
        }
    }

    /// First and last calendar day covered, or `None` for custom periods.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self.period_type {
            PeriodType::Month => {
                let month = self.month?;
                Some((
                    first_day_of_month(self.year, month)?,
                    last_day_of_month(self.year, month)?,
                ))
            }
            PeriodType::Quarter => quarter_bounds(self.year, self.quarter?),
            PeriodType::Year => year_bounds(self.year),
            PeriodType::Custom => None,
        }
    }
}

/// A date resolved from a period label. `is_fallback` marks the calendar-year
/// default used when the label could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub is_fallback: bool,
}

impl ParsedDate {
    pub fn iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Start (or, with `is_end`, end) date of the period named by `label`.
/// Never fails: unparseable labels resolve to Jan 1 / Dec 31 of the current year.
pub fn parse_period_date(label: &str, is_end: bool) -> ParsedDate {
    parse_period_date_with_fallback(label, is_end, current_year())
}

pub fn parse_period_date_with_fallback(label: &str, is_end: bool, fallback_year: i32) -> ParsedDate {
    let definition = parse_period_label(label);
    let (start, end, is_fallback) = resolve_period_dates(&definition, fallback_year);
    ParsedDate {
        date: if is_end { end } else { start },
        is_fallback,
    }
}

/// Date bounds for a definition, falling back to `fallback_year` bounds.
pub fn resolve_period_dates(
    definition: &PeriodDefinition,
    fallback_year: i32,
) -> (NaiveDate, NaiveDate, bool) {
    if let Some((start, end)) = definition.date_range() {
        return (start, end, false);
    }

    let (start, end) = year_bounds(fallback_year)
        .or_else(|| year_bounds(current_year()))
        .unwrap_or((NaiveDate::MIN, NaiveDate::MAX));
    (start, end, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_names_english_and_spanish() {
        assert_eq!(month_from_name("Jan"), Some(1));
        assert_eq!(month_from_name("ENERO"), Some(1));
        assert_eq!(month_from_name("Abr."), Some(4));
        assert_eq!(month_from_name("Setiembre"), Some(9));
        assert_eq!(month_from_name("Dic"), Some(12));
        assert_eq!(month_from_name("Revenue"), None);
    }

    #[test]
    fn test_month_year_labels() {
        for (label, year, month) in [
            ("Jan-25", 2025, 1),
            ("enero 2025", 2025, 1),
            ("Ago-24", 2024, 8),
            ("Jan/24", 2024, 1),
            ("September 2023", 2023, 9),
            ("01/2025", 2025, 1),
            ("2025-03", 2025, 3),
        ] {
            let definition = parse_period_label(label);
            assert_eq!(definition.period_type, PeriodType::Month, "label {}", label);
            assert_eq!(definition.year, year, "label {}", label);
            assert_eq!(definition.month, Some(month), "label {}", label);
        }
    }

    #[test]
    fn test_two_digit_years_are_promoted() {
        for (idx, abbrev) in MONTH_ABBREVIATIONS.iter().enumerate() {
            for yy in [0, 7, 25, 99] {
                let label = format!("{}-{:02}", abbrev, yy);
                let parsed = parse_period_date_with_fallback(&label, false, 1999);
                assert_eq!(parsed.date, date(2000 + yy, idx as u32 + 1, 1), "{}", label);
                assert!(!parsed.is_fallback);
            }
        }
    }

    #[test]
    fn test_quarter_and_year_labels() {
        let q = parse_period_label("Q1 2025");
        assert_eq!(q.period_type, PeriodType::Quarter);
        assert_eq!(q.quarter, Some(1));
        assert_eq!(q.label, "Q1 2025");

        let q = parse_period_label("2024-Q3");
        assert_eq!(q.quarter, Some(3));
        assert_eq!(q.year, 2024);

        let y = parse_period_label("FY2024");
        assert_eq!(y.period_type, PeriodType::Year);
        assert_eq!(y.label, "2024");
    }

    #[test]
    fn test_canonical_labels() {
        assert_eq!(parse_period_label("enero 2025").label, "Jan 2025");
        assert_eq!(parse_period_label("Dic-24").label, "Dec 2024");
        assert_eq!(PeriodDefinition::quarter(2025, 4).canonical_label(), "Q4 2025");
    }

    #[test]
    fn test_unrecognized_labels_become_custom() {
        let definition = parse_period_label("Budget v2");
        assert_eq!(definition.period_type, PeriodType::Custom);
        assert_eq!(definition.custom_value.as_deref(), Some("Budget v2"));
        assert!(definition.date_range().is_none());

        // A month without a year does not pin down a period.
        assert_eq!(parse_period_label("Marzo").period_type, PeriodType::Custom);
    }

    #[test]
    fn test_period_dates_start_and_end() {
        assert_eq!(parse_period_date("Feb-24", false).iso(), "2024-02-01");
        assert_eq!(parse_period_date("Feb-24", true).iso(), "2024-02-29");
        assert_eq!(parse_period_date("02/2023", true).iso(), "2023-02-28");
        assert_eq!(parse_period_date("2024", true).iso(), "2024-12-31");
        assert_eq!(parse_period_date("Q2 2025", true).iso(), "2025-06-30");
    }

    #[test]
    fn test_unparseable_date_falls_back_to_calendar_year() {
        let start = parse_period_date_with_fallback("Budget", false, 2026);
        let end = parse_period_date_with_fallback("Budget", true, 2026);
        assert_eq!(start.date, date(2026, 1, 1));
        assert_eq!(end.date, date(2026, 12, 31));
        assert!(start.is_fallback && end.is_fallback);

        let today = parse_period_date("???", false);
        assert!(today.is_fallback);
        assert_eq!(today.date, date(current_year(), 1, 1));
    }

    #[test]
    fn test_match_label_kinds() {
        let kind = |label: &str| match_label(label).map(|m| m.kind);
        assert_eq!(kind("Jan-25"), Some(PeriodMatchKind::MonthYear));
        assert_eq!(kind("01/2025"), Some(PeriodMatchKind::MonthSlashYear));
        assert_eq!(kind("Q1 2025"), Some(PeriodMatchKind::QuarterYear));
        assert_eq!(kind("Enero"), Some(PeriodMatchKind::MonthOnly));
        assert_eq!(kind("2025"), Some(PeriodMatchKind::YearOnly));
        assert_eq!(kind("TOTAL"), Some(PeriodMatchKind::Total));
        assert_eq!(kind("Q1-2024 Total"), Some(PeriodMatchKind::Total));
        assert_eq!(kind("Account"), None);
        assert_eq!(kind("1500"), None);
        assert_eq!(kind(""), None);
    }
}
