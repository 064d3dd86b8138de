use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

/// Upper bound for confidence scores handed to storage, which keeps two
/// decimal digits and rejects a full 1.00.
pub const MAX_CONFIDENCE_SCORE: f64 = 0.99;

pub fn first_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    if !(1..=12).contains(&month) {
        return None;
    }

    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.checked_sub_days(Days::new(1))
}

/// First and last calendar day of a quarter (1-4).
pub fn quarter_bounds(year: i32, quarter: u32) -> Option<(NaiveDate, NaiveDate)> {
    if !(1..=4).contains(&quarter) {
        return None;
    }
    let first_month = (quarter - 1) * 3 + 1;
    Some((
        first_day_of_month(year, first_month)?,
        last_day_of_month(year, first_month + 2)?,
    ))
}

pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// Promotes two-digit years ("25") into the 2000s.
pub fn expand_two_digit_year(year: i32) -> i32 {
    if year < 100 {
        year + 2000
    } else {
        year
    }
}

/// Lowercases, strips Spanish diacritics and collapses whitespace so that
/// "SALDO  MÍNIMO" and "saldo minimo" compare equal.
pub fn normalize_text(input: &str) -> String {
    let folded: String = input
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when `term` occurs in `haystack` as a whole word, or as the stem of
/// a plural ("venta" in "ventas", "impuesto" in "impuestos"). Both arguments
/// are expected to be normalized already.
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }

    haystack.match_indices(term).any(|(idx, _)| {
        let starts_word = haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let rest = &haystack[idx + term.len()..];
        let tail_len = rest
            .find(|c: char| !c.is_alphanumeric())
            .unwrap_or(rest.len());
        starts_word && matches!(&rest[..tail_len], "" | "s" | "es")
    })
}

const CURRENCY_CODES: &[&str] = &[
    "usd", "us", "mxn", "mx", "eur", "gbp", "cad", "cop", "clp", "ars", "pen", "brl", "uyu",
];

/// Removes one leading or trailing ISO-style currency code ("USD 1,000",
/// "1.000 MXN"). Any other word is left in place.
fn strip_currency_code(text: &str) -> &str {
    let text = text.trim();
    for code in CURRENCY_CODES {
        let n = code.len();
        if text.len() > n
            && text.is_char_boundary(n)
            && text[..n].eq_ignore_ascii_case(code)
            && !text[n..].starts_with(|c: char| c.is_alphabetic())
        {
            return text[n..].trim();
        }
        if text.len() > n
            && text.is_char_boundary(text.len() - n)
            && text[text.len() - n..].eq_ignore_ascii_case(code)
            && !text[..text.len() - n].ends_with(|c: char| c.is_alphabetic())
        {
            return text[..text.len() - n].trim();
        }
    }
    text
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<neg>-)?\(?(?P<body>\d[\d.,\s']*)\)?(?P<trail>-)?$")
            .expect("invalid amount regex")
    })
}

/// Parses an amount as it typically appears in spreadsheet text cells:
/// currency symbols, thousands separators, `(1,234)` or trailing minus for
/// negatives. Percentages are ratios rather than amounts and yield `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.ends_with('%') {
        return None;
    }

    let without_symbols: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥'))
        .collect();
    let stripped = strip_currency_code(&without_symbols).to_string();

    let caps = amount_re().captures(&stripped)?;
    let parenthesized = stripped.starts_with('(') && stripped.ends_with(')');
    let negative = caps.name("neg").is_some() || caps.name("trail").is_some() || parenthesized;

    let body: String = caps["body"]
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();
    let value = parse_separated_number(&body)?;

    Some(if negative { -value } else { value })
}

/// Decides which of `.` and `,` is the decimal separator. The last separator
/// wins when both appear; a lone separator followed by exactly three digits
/// is treated as a thousands separator.
fn parse_separated_number(body: &str) -> Option<f64> {
    let last_dot = body.rfind('.');
    let last_comma = body.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(d), Some(c)) if d > c => body.replace(',', ""),
        (Some(_), Some(_)) => body.replace('.', "").replace(',', "."),
        (None, Some(c)) => {
            if body.matches(',').count() == 1 && body.len() - c - 1 != 3 {
                body.replace(',', ".")
            } else {
                body.replace(',', "")
            }
        }
        (Some(d), None) => {
            let grouped = body.len() - d - 1 == 3 && d <= 3 && !body.starts_with('0');
            if body.matches('.').count() > 1 || grouped {
                body.replace('.', "")
            } else {
                body.to_string()
            }
        }
        (None, None) => body.to_string(),
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Maps a 0-100 heuristic confidence onto the stored 0.0-0.99 scale.
pub fn confidence_to_score(confidence: u8) -> f64 {
    clamp_confidence_score(f64::from(confidence) / 100.0)
}

pub fn clamp_confidence_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, MAX_CONFIDENCE_SCORE)
}

pub fn clamp_confidence(confidence: f64) -> u8 {
    if confidence.is_nan() {
        return 0;
    }
    confidence.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(last_day_of_month(2023, 13), None);
    }

    #[test]
    fn test_quarter_bounds() {
        let (start, end) = quarter_bounds(2025, 2).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
        assert!(quarter_bounds(2025, 5).is_none());
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  SALDO   MÍNIMO "), "saldo minimo");
        assert_eq!(normalize_text("Cobros a Crédito"), "cobros a credito");
        assert_eq!(normalize_text("Diseño"), "diseno");
    }

    #[test]
    fn test_contains_term_respects_word_boundaries() {
        assert!(contains_term("costo de ventas", "ventas"));
        assert!(contains_term("total revenue", "revenue"));
        assert!(!contains_term("taxi fares", "tax fares"));
        assert!(!contains_term("syntax", "tax"));
        assert!(contains_term("impuestos", "impuesto"));
        assert!(contains_term("totales", "total"));
        assert!(!contains_term("rental income", "rent"));
        assert!(!contains_term("salesforce license", "sales"));
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("1,234.50"), Some(1234.5));
        assert_eq!(parse_amount("$ 1,000"), Some(1000.0));
        assert_eq!(parse_amount("(2,500)"), Some(-2500.0));
        assert_eq!(parse_amount("-300"), Some(-300.0));
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("12,5"), Some(12.5));
        assert_eq!(parse_amount("35.2%"), None);
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_parse_amount_currency_codes_only() {
        assert_eq!(parse_amount("USD 1,500"), Some(1500.0));
        assert_eq!(parse_amount("1.250,00 MXN"), Some(1250.0));
        assert_eq!(parse_amount("US$ 20"), Some(20.0));
        assert_eq!(parse_amount("Note 3"), None);
        assert_eq!(parse_amount("Ref 12"), None);
        assert_eq!(parse_amount("12 units"), None);
        assert_eq!(parse_amount("USDT 5"), None);
    }

    #[test]
    fn test_confidence_clamping() {
        assert_eq!(confidence_to_score(100), 0.99);
        assert_eq!(confidence_to_score(95), 0.95);
        assert_eq!(clamp_confidence_score(-0.2), 0.0);
        assert_eq!(clamp_confidence_score(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(140.0), 100);
        assert_eq!(clamp_confidence(59.6), 60);
    }

    #[test]
    fn test_expand_two_digit_year() {
        assert_eq!(expand_two_digit_year(25), 2025);
        assert_eq!(expand_two_digit_year(2024), 2024);
    }
}
