//! String cleanup for values coming out of document OCR.
//!
//! Every function here is total: unparseable input yields an empty string,
//! which callers read as "not extracted".

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

/// Collapse newlines, tabs and repeated spaces into single spaces and trim.
pub fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove the first matching label from the start of `value`, ignoring case.
///
/// `labels` should list longer labels before their prefixes ("NRO. MOTOR"
/// before "MOTOR"). Separators left behind (`:`, `-`, `.`) are dropped too.
pub fn strip_label(value: &str, labels: &[&str]) -> String {
    let cleaned = clean_text(value);
    for label in labels {
        if let Some(rest) = strip_prefix_ignore_case(&cleaned, label) {
            // "MARCANTONIO" must not lose its "MARCA".
            if rest
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric())
            {
                continue;
            }
            let rest = rest.trim_start_matches(|c: char| c == ':' || c == '-' || c == '.' || c.is_whitespace());
            return rest.trim_end().to_string();
        }
    }
    cleaned
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = value.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = rest.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    match rest.next() {
        Some((index, _)) => Some(&value[index..]),
        None => Some(""),
    }
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(U\$S|US\$|USD|UYU|\$|€)?\s*(\d[\d.,]*)").expect("number pattern is valid")
    })
}

/// Find the amount in a currency-formatted string and parse it.
///
/// A figure preceded by a currency marker wins; otherwise the last figure
/// in the string is taken.
pub fn parse_amount(value: &str) -> Option<f64> {
    let mut currency_tagged = None;
    let mut trailing = None;
    for captures in number_pattern().captures_iter(value) {
        let digits = captures.get(2).map(|m| m.as_str())?;
        if captures.get(1).is_some() && currency_tagged.is_none() {
            currency_tagged = Some(digits);
        }
        trailing = Some(digits);
    }

    let raw = currency_tagged.or(trailing)?;
    let canonical = canonical_decimal(raw.trim_end_matches(['.', ',']));
    let parsed = canonical.parse::<f64>().ok().filter(|v| v.is_finite());
    trace!(input = value, canonical = %canonical, ?parsed, "parsed amount");
    parsed
}

// Rewrites a locale-formatted figure ("1.234,56", "1,234.56", "12.500")
// into "1234.56" form.
fn canonical_decimal(raw: &str) -> String {
    let last_dot = raw.rfind('.');
    let last_comma = raw.rfind(',');

    match (last_dot, last_comma) {
        (Some(dot), Some(comma)) => {
            let (decimal, thousands) = if dot > comma { ('.', ',') } else { (',', '.') };
            raw.chars()
                .filter(|c| *c != thousands)
                .map(|c| if c == decimal { '.' } else { c })
                .collect()
        }
        (None, Some(comma)) => {
            let trailing_digits = raw.len() - comma - 1;
            if raw.matches(',').count() == 1 && trailing_digits == 2 {
                raw.replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (Some(dot), None) => {
            let trailing_digits = raw.len() - dot - 1;
            if raw.matches('.').count() > 1 || trailing_digits == 3 {
                raw.replace('.', "")
            } else {
                raw.to_string()
            }
        }
        (None, None) => raw.to_string(),
    }
}

/// Render an amount with two fraction digits and a `.` decimal point.
pub fn format_amount(value: f64) -> String {
    format!("{:.2}", value.abs())
}

/// Amount extraction rendered in canonical form, or `""`.
pub fn normalize_amount(value: &str) -> String {
    parse_amount(value).map(format_amount).unwrap_or_default()
}

/// First run of digits, e.g. the "3" in "CUOTAS: 3".
pub fn normalize_integer(value: &str) -> String {
    value
        .split(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .map(|run| run.trim_start_matches('0'))
        .map(|run| if run.is_empty() { "0" } else { run })
        .map(str::to_string)
        .unwrap_or_default()
}

enum DateOrder {
    DayMonthYear,
    YearMonthDay,
}

fn date_patterns() -> &'static [(Regex, DateOrder)] {
    static PATTERNS: OnceLock<Vec<(Regex, DateOrder)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(\d{1,2})/(\d{1,2})/(\d{4})", DateOrder::DayMonthYear),
            (r"(\d{1,2})-(\d{1,2})-(\d{4})", DateOrder::DayMonthYear),
            (r"(\d{4})-(\d{1,2})-(\d{1,2})", DateOrder::YearMonthDay),
            (r"(\d{1,2})\.(\d{1,2})\.(\d{4})", DateOrder::DayMonthYear),
        ]
        .into_iter()
        .map(|(pattern, order)| (Regex::new(pattern).expect("date pattern is valid"), order))
        .collect()
    })
}

fn iso_date() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("iso pattern is valid"))
}

/// Parse a date written as `DD/MM/YYYY`, `DD-MM-YYYY`, `YYYY-MM-DD` or
/// `DD.MM.YYYY` (possibly surrounded by label text) into `YYYY-MM-DD`.
pub fn normalize_date(value: &str) -> String {
    let trimmed = value.trim();
    if iso_date().is_match(trimmed) {
        return trimmed.to_string();
    }

    for (pattern, order) in date_patterns() {
        for captures in pattern.captures_iter(trimmed) {
            let part = |index: usize| captures[index].parse::<u32>().ok();
            let parsed = match order {
                DateOrder::DayMonthYear => (part(3), part(2), part(1)),
                DateOrder::YearMonthDay => (part(1), part(2), part(3)),
            };
            if let (Some(year), Some(month), Some(day)) = parsed {
                if let Some(date) = i32::try_from(year)
                    .ok()
                    .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
                {
                    return date.format("%Y-%m-%d").to_string();
                }
            }
        }
    }

    trace!(input = value, "no date recognised");
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_line_breaks() {
        assert_eq!(clean_text("  COMBUSTIBLE\r\nNAFTA \t "), "COMBUSTIBLE NAFTA");
        assert_eq!(clean_text("\n\n"), "");
    }

    #[test]
    fn strip_label_handles_case_accents_and_separators() {
        assert_eq!(strip_label("MARCA\nVOLKSWAGEN", &["MARCA"]), "VOLKSWAGEN");
        assert_eq!(strip_label("Padrón: 903112", &["PADRÓN", "PADRON"]), "903112");
        assert_eq!(strip_label("PADRON - 903112", &["PADRÓN", "PADRON"]), "903112");
        assert_eq!(
            strip_label("NRO. MOTOR: CFZ123", &["NRO. MOTOR", "MOTOR"]),
            "CFZ123"
        );
    }

    #[test]
    fn strip_label_keeps_words_that_only_start_with_the_label() {
        assert_eq!(strip_label("MARCANTONIO", &["MARCA"]), "MARCANTONIO");
        assert_eq!(strip_label("FIAT", &["MARCA"]), "FIAT");
    }

    #[test]
    fn amount_with_thousands_dot_and_decimal_comma() {
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(normalize_amount("1.234,56"), "1234.56");
    }

    #[test]
    fn amount_with_thousands_comma_and_decimal_dot() {
        assert_eq!(normalize_amount("1,234.56"), "1234.56");
    }

    #[test]
    fn lone_comma_is_decimal_only_with_two_trailing_digits() {
        assert_eq!(normalize_amount("100,00"), "100.00");
        assert_eq!(normalize_amount("12,500"), "12500.00");
        assert_eq!(normalize_amount("1,234,567"), "1234567.00");
    }

    #[test]
    fn lone_dot_with_three_digits_is_grouping() {
        assert_eq!(normalize_amount("12.500"), "12500.00");
        assert_eq!(normalize_amount("1.234.567"), "1234567.00");
        assert_eq!(normalize_amount("99.5"), "99.50");
    }

    #[test]
    fn currency_tagged_figure_beats_other_numbers() {
        assert_eq!(normalize_amount("CUOTA 1 DE 10 $ 1.500,00"), "1500.00");
        assert_eq!(normalize_amount("PREMIO TOTAL U$S 820,50"), "820.50");
        assert_eq!(normalize_amount("PREMIO 2025 - 4.800"), "4800.00");
    }

    #[test]
    fn unparseable_amounts_are_empty() {
        assert_eq!(normalize_amount(""), "");
        assert_eq!(normalize_amount("SIN DATOS"), "");
        assert_eq!(normalize_amount("$"), "");
    }

    #[test]
    fn amount_output_shape_holds_for_assorted_input() {
        let shape = Regex::new(r"^\d+\.\d{2}$").expect("valid");
        let inputs = [
            "1.234,56", "$ 12", "0,5", "..,,", "1e9", "-45,00", "USD 3.000.000,99", "€7",
            "12,3,4", "NAFTA", "3.", "9,", "  ", "00012,00",
        ];
        for input in inputs {
            let output = normalize_amount(input);
            assert!(
                output.is_empty() || shape.is_match(&output),
                "{input:?} produced {output:?}"
            );
        }
    }

    #[test]
    fn integer_takes_first_digit_run() {
        assert_eq!(normalize_integer("CUOTAS: 03 de 10"), "3");
        assert_eq!(normalize_integer("AÑO 2019"), "2019");
        assert_eq!(normalize_integer("sin cuotas"), "");
    }

    #[test]
    fn date_formats_become_iso() {
        assert_eq!(normalize_date("17/09/2025"), "2025-09-17");
        assert_eq!(normalize_date("1-2-2024"), "2024-02-01");
        assert_eq!(normalize_date("VIGENCIA DESDE 31.12.2024"), "2024-12-31");
        assert_eq!(normalize_date("Desde: 2025-3-4 hasta"), "2025-03-04");
    }

    #[test]
    fn iso_dates_pass_through_unchanged() {
        assert_eq!(normalize_date("2025-09-17"), "2025-09-17");
        assert_eq!(normalize_date(" 2024-02-29 "), "2024-02-29");
    }

    #[test]
    fn impossible_dates_are_empty() {
        assert_eq!(normalize_date("31/02/2025"), "");
        assert_eq!(normalize_date("sin fecha"), "");
        assert_eq!(normalize_date(""), "");
    }

    #[test]
    fn date_output_shape_holds_for_assorted_input() {
        let shape = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid");
        let inputs = [
            "17/09/2025", "99/99/9999", "2025/09/17", "17-09-25", "hoy", "01.01.2000 al 01.01.2001",
            "2025-13-01x",
        ];
        for input in inputs {
            let output = normalize_date(input);
            assert!(
                output.is_empty() || shape.is_match(&output),
                "{input:?} produced {output:?}"
            );
        }
    }
}
