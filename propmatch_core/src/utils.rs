use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex"));
static STREET_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,5})\s*([a-z])?\b").expect("static regex"));
static TYPOLOGY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*t\s*(\d{1,2})").expect("static regex"));

/// Fold Portuguese/Latin diacritics to ASCII.
fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Lowercase, strip accents and punctuation, collapse whitespace.
///
/// `"Rua das Flores, 123"` and `"rua das flores 123"` normalize equal.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text.to_lowercase().chars().map(fold_char).collect();
    NON_ALNUM.replace_all(&folded, " ").trim().to_string()
}

/// Case- and accent-insensitive equality; empty strings never match.
pub fn text_eq(a: &str, b: &str) -> bool {
    let a = normalize_text(a);
    !a.is_empty() && a == normalize_text(b)
}

/// Street name plus door number, dropping common street-type abbreviations.
///
/// Returns `None` when the address has no door number, since a bare street
/// name says little about which building a listing is in.
pub fn street_key(address: &str) -> Option<String> {
    let normalized = normalize_text(address);
    let caps = STREET_NUMBER.captures(&normalized)?;
    let number = caps.get(0)?.as_str().replace(' ', "");
    let street: Vec<&str> = normalized[..caps.get(0)?.start()]
        .split_whitespace()
        .filter(|word| !matches!(*word, "n" | "numero"))
        .map(|word| match word {
            "r" => "rua",
            "av" | "avda" => "avenida",
            "tv" | "trav" => "travessa",
            "lg" => "largo",
            "pc" | "pca" => "praca",
            other => other,
        })
        .collect();
    if street.is_empty() {
        return None;
    }
    Some(format!("{} {}", street.join(" "), number))
}

/// Portuguese postal codes compare on their digits only (`1200-123`).
pub fn normalize_postal_code(code: &str) -> Option<String> {
    let digits: String = code.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        Some(digits)
    } else {
        None
    }
}

/// Parse a number out of a portal string such as `"250 000 €"` or `"1.250,50"`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        // "1.250,50": dot thousands, comma decimal
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        // "1,250.50"
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        // "250,5" decimal comma vs "250,000" thousands
        (None, Some(comma)) => {
            if cleaned.len() - comma - 1 == 3 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (Some(dot), None) => {
            if cleaned.matches('.').count() > 1 || cleaned.len() - dot - 1 == 3 {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Bedroom count encoded in a typology label (`T3` → 3).
pub fn typology_bedrooms(typology: &str) -> Option<u32> {
    TYPOLOGY
        .captures(typology)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn normalize_typology(typology: &str) -> Option<String> {
    typology_bedrooms(typology).map(|n| format!("T{}", n))
}

/// Parse RFC 3339 timestamps or bare `YYYY-MM-DD` dates.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

/// Calendar days (UTC) from `then` to `now`; dates in the future count as 0.
pub fn age_days(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now.date_naive() - then.date_naive()).num_days().max(0)
}

pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("Rua das Flores, 123"), "rua das flores 123");
        assert_eq!(normalize_text("  São  João "), "sao joao");
        assert!(text_eq("Setúbal", "SETUBAL"));
        assert!(!text_eq("", ""));
    }

    #[test]
    fn test_street_key() {
        assert_eq!(
            street_key("R. das Flores 123"),
            Some("rua das flores 123".to_string())
        );
        assert_eq!(
            street_key("Rua das Flores, nº 123, 2º Esq"),
            Some("rua das flores 123".to_string())
        );
        assert_eq!(street_key("Rua das Flores"), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("250 000 €"), Some(250_000.0));
        assert_eq!(parse_number("1.250,50"), Some(1250.5));
        assert_eq!(parse_number("1,250.50"), Some(1250.5));
        assert_eq!(parse_number("250.000"), Some(250_000.0));
        assert_eq!(parse_number("85,5 m²"), Some(85.5));
        assert_eq!(parse_number("n/a"), None);
    }

    #[test]
    fn test_typology() {
        assert_eq!(typology_bedrooms("T3"), Some(3));
        assert_eq!(typology_bedrooms("t2+1"), Some(2));
        assert_eq!(normalize_typology(" t1 "), Some("T1".to_string()));
        assert_eq!(typology_bedrooms("studio"), None);
    }

    #[test]
    fn test_parse_datetime() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_datetime("2024-03-01"), Some(expected));
        assert_eq!(parse_datetime("01/03/2024"), Some(expected));
        assert_eq!(parse_datetime("2024-03-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn test_age_days_never_negative() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let future = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(age_days(future, now), 0);
        let past = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(age_days(past, now), 9);
    }

    #[test]
    fn test_age_days_counts_calendar_days() {
        let then = Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap();
        let morning = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 3, 2, 23, 0, 0).unwrap();
        assert_eq!(age_days(then, morning), 1);
        assert_eq!(age_days(then, evening), 1);
    }
}
