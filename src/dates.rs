use chrono::{DateTime, Locale, NaiveDate, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer};

/// Display strings for trip dates in mail and pages.
#[derive(Debug, Clone, Copy)]
pub struct DateFormatter {
    locale: Locale,
}

impl DateFormatter {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    /// Long form, e.g. "19 de outubro de 2026" or "October 19, 2026".
    pub fn long(&self, at: DateTime<Utc>) -> String {
        let pattern = match self.locale {
            Locale::pt_BR | Locale::pt_PT | Locale::es_ES => "%-d de %B de %Y",
            Locale::en_US => "%B %-d, %Y",
            _ => "%-d %B %Y",
        };
        at.format_localized(pattern, self.locale).to_string()
    }

    /// Numeric form, DD/MM/YYYY.
    pub fn numeric(&self, at: DateTime<Utc>) -> String {
        at.format("%d/%m/%Y").to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Millis(i64),
    Text(String),
}

/// Accepts RFC 3339, naive date-times and plain dates (read as UTC), or epoch milliseconds.
pub fn deserialize_coerced<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDate::deserialize(deserializer)? {
        RawDate::Millis(ms) => DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {ms}"))),
        RawDate::Text(text) => parse_date_time(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid date-time: {text}"))),
    }
}

pub fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
