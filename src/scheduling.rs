use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, de::Error as _};

/// A half-open appointment slot on a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    /// Same test the availability query runs in SQL.
    pub fn overlaps(&self, requested: &TimeRange) -> bool {
        let (s, e) = (self.start, self.end);
        let (rs, re) = (requested.start, requested.end);
        (s <= rs && e > rs) || (s < re && e >= re) || (s >= rs && e <= re)
    }
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Serde helper for optional `HH:MM[:SS]` request fields.
pub fn deserialize_opt_time<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_time(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid time `{raw}`, expected HH:MM"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(a: &str, b: &str) -> TimeRange {
        TimeRange::new(parse_time(a).unwrap(), parse_time(b).unwrap()).unwrap()
    }

    #[test]
    fn identical_slot_conflicts() {
        assert!(slot("09:00", "09:30").overlaps(&slot("09:00", "09:30")));
    }

    #[test]
    fn partial_and_enclosing_overlaps() {
        let booked = slot("09:00", "10:00");
        assert!(booked.overlaps(&slot("09:30", "10:30")));
        assert!(booked.overlaps(&slot("08:30", "09:15")));
        assert!(booked.overlaps(&slot("09:15", "09:45")));
        assert!(booked.overlaps(&slot("08:00", "11:00")));
    }

    #[test]
    fn adjacent_slots_are_free() {
        let booked = slot("09:00", "09:30");
        assert!(!booked.overlaps(&slot("09:30", "10:00")));
        assert!(!booked.overlaps(&slot("08:30", "09:00")));
    }

    #[test]
    fn rejects_empty_or_inverted_ranges() {
        let nine = parse_time("09:00").unwrap();
        assert!(TimeRange::new(nine, nine).is_none());
        assert!(TimeRange::new(parse_time("10:00").unwrap(), nine).is_none());
    }

    #[test]
    fn time_fields_deserialize_from_short_form() {
        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default, deserialize_with = "deserialize_opt_time")]
            hora: Option<NaiveTime>,
        }
        let body: Body = serde_json::from_str(r#"{"hora":"08:15"}"#).unwrap();
        assert_eq!(body.hora, parse_time("08:15:00"));
        let body: Body = serde_json::from_str("{}").unwrap();
        assert!(body.hora.is_none());
        assert!(serde_json::from_str::<Body>(r#"{"hora":"late"}"#).is_err());
    }

    #[test]
    fn parses_with_and_without_seconds() {
        assert_eq!(parse_time("09:30"), parse_time("09:30:00"));
        assert!(parse_time("9h30").is_none());
    }
}
