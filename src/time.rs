//! Canonical civil-time handling.
//!
//! Every timestamp is stored zone-naive and read back as wall-clock time in a
//! single canonical zone (UTC+8 unless configured otherwise). Incoming values
//! may be naive (already civil), UTC, or carry any offset; they are converted
//! once on the way in and the zone is re-attached on the way out.

use crate::error::{MemoError, MemoResult};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use tracing::warn;

/// Default canonical offset in seconds east of UTC.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Years a stored value may fall in. RFC 3339 output has four-digit years.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

/// Naive layouts accepted for input, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Converts timestamps to and from the canonical civil zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeNormalizer {
    zone: FixedOffset,
}

impl Default for TimeNormalizer {
    fn default() -> Self {
        Self {
            zone: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl TimeNormalizer {
    pub fn new(zone: FixedOffset) -> Self {
        Self { zone }
    }

    /// Build from an offset string such as `+08:00`, `-0530`, `+8` or `Z`.
    pub fn from_offset_str(offset: &str) -> MemoResult<Self> {
        parse_offset(offset)
            .map(Self::new)
            .ok_or_else(|| {
                MemoError::invalid_value("utc_offset", format!("'{}' is not a UTC offset", offset))
            })
    }

    /// The canonical zone.
    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// Current wall-clock time in the canonical zone.
    pub fn now(&self) -> NaiveDateTime {
        let now = Utc::now();
        self.to_civil(&now).unwrap_or_else(|| now.naive_utc())
    }

    /// Convert a zone-aware instant to canonical wall-clock time.
    ///
    /// `None` when the shifted value leaves chrono's representable range.
    pub fn to_civil<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> Option<NaiveDateTime> {
        instant
            .naive_utc()
            .checked_add_signed(Duration::seconds(i64::from(self.zone.local_minus_utc())))
    }

    /// Re-attach the canonical zone to a stored value.
    pub fn attach_zone(&self, stored: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        stored
            .checked_sub_signed(Duration::seconds(i64::from(self.zone.local_minus_utc())))
            .map(|utc| DateTime::from_naive_utc_and_offset(utc, self.zone))
    }

    /// Parse one incoming timestamp into its storable form.
    ///
    /// `field` names the input field for error reporting.
    pub fn parse(&self, field: &str, raw: &str) -> MemoResult<NaiveDateTime> {
        let trimmed = raw.trim();

        self.parse_civil(trimmed)
            .filter(|civil| YEAR_RANGE.contains(&civil.year()))
            .ok_or_else(|| MemoError::malformed_timestamp(field, raw))
    }

    fn parse_civil(&self, raw: &str) -> Option<NaiveDateTime> {
        if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
            return self.to_civil(&zoned);
        }
        if let Ok(zoned) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return self.to_civil(&zoned);
        }
        for layout in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
                return Some(naive);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(|date| date.and_time(chrono::NaiveTime::MIN))
    }

    /// Absent input passes through as `None`.
    pub fn normalize_for_storage(
        &self,
        field: &str,
        raw: Option<&str>,
    ) -> MemoResult<Option<NaiveDateTime>> {
        raw.map(|value| self.parse(field, value)).transpose()
    }

    /// Render a stored value as an RFC 3339 string carrying the canonical offset.
    ///
    /// A value that cannot carry the zone is rendered without an offset.
    pub fn present_for_output(&self, stored: Option<NaiveDateTime>) -> Option<String> {
        stored.map(|naive| match self.attach_zone(naive) {
            Some(zoned) => zoned.to_rfc3339(),
            None => {
                warn!(%naive, zone = %self.zone, "Stored timestamp cannot carry the zone");
                naive.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
            }
        })
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// A timestamp as it may reach duration math: stored (naive) or zone-aware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    Naive(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl From<NaiveDateTime> for Stamp {
    fn from(value: NaiveDateTime) -> Self {
        Stamp::Naive(value)
    }
}

impl From<DateTime<FixedOffset>> for Stamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Stamp::Zoned(value)
    }
}

/// Time elapsed from `start` to `end`.
///
/// Two naive values are compared as-is. A naive value paired with a zoned one
/// is taken to be wall-clock time in the zoned value's offset.
pub fn elapsed(start: Stamp, end: Stamp) -> Duration {
    match (start, end) {
        (Stamp::Naive(a), Stamp::Naive(b)) => b - a,
        (Stamp::Zoned(a), Stamp::Zoned(b)) => b.signed_duration_since(a),
        (Stamp::Naive(a), Stamp::Zoned(b)) => b.naive_local() - a,
        (Stamp::Zoned(a), Stamp::Naive(b)) => b - a.naive_local(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn civil(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn naive_input_is_kept_as_civil_time() {
        let tn = TimeNormalizer::default();
        let stored = tn.parse("created_at", "2024-03-01T09:30:00").unwrap();
        assert_eq!(stored, civil("2024-03-01 09:30:00"));
    }

    #[test]
    fn utc_input_is_shifted_into_zone() {
        let tn = TimeNormalizer::default();
        let stored = tn.parse("created_at", "2024-03-01T01:30:00Z").unwrap();
        assert_eq!(stored, civil("2024-03-01 09:30:00"));
    }

    #[test]
    fn foreign_offset_is_converted() {
        let tn = TimeNormalizer::default();
        let stored = tn.parse("completed_at", "2024-03-01T20:00:00-05:00").unwrap();
        assert_eq!(stored, civil("2024-03-02 09:00:00"));
    }

    #[test]
    fn offset_without_colon_and_space_separated_forms() {
        let tn = TimeNormalizer::default();
        assert_eq!(
            tn.parse("x", "2024-03-01T01:30:00+0000").unwrap(),
            civil("2024-03-01 09:30:00")
        );
        assert_eq!(
            tn.parse("x", "2024-03-01 09:30").unwrap(),
            civil("2024-03-01 09:30:00")
        );
        assert_eq!(
            tn.parse("x", "2024-03-01").unwrap(),
            civil("2024-03-01 00:00:00")
        );
    }

    #[test]
    fn malformed_input_names_field() {
        let tn = TimeNormalizer::default();
        let err = tn.parse("completed_at", "next tuesday").unwrap_err();
        match err {
            MemoError::MalformedTimestamp { field, value } => {
                assert_eq!(field, "completed_at");
                assert_eq!(value, "next tuesday");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn out_of_range_years_are_malformed() {
        let tn = TimeNormalizer::default();
        for raw in [
            "-262143-01-01T00:00:00",
            "+262142-12-31T23:59:59+00:00",
            "10000-01-01T00:00:00",
            "9999-12-31T23:00:00-05:00",
        ] {
            match tn.parse("completed_at", raw) {
                Err(MemoError::MalformedTimestamp { field, value }) => {
                    assert_eq!(field, "completed_at");
                    assert_eq!(value, raw);
                }
                other => panic!("{raw}: unexpected result {other:?}"),
            }
        }
        assert_eq!(
            tn.parse("x", "9999-12-31T23:59:59").unwrap(),
            civil("9999-12-31 23:59:59")
        );
    }

    #[test]
    fn extreme_stored_values_render_without_panicking() {
        let tn = TimeNormalizer::default();
        let out = tn.present_for_output(Some(NaiveDateTime::MIN)).unwrap();
        assert!(!out.is_empty());
        let out = tn.present_for_output(Some(NaiveDateTime::MAX)).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn absent_passes_through() {
        let tn = TimeNormalizer::default();
        assert_eq!(tn.normalize_for_storage("x", None).unwrap(), None);
        assert_eq!(tn.present_for_output(None), None);
    }

    #[test]
    fn output_carries_canonical_offset() {
        let tn = TimeNormalizer::default();
        let out = tn.present_for_output(Some(civil("2024-03-01 09:30:00"))).unwrap();
        assert_eq!(out, "2024-03-01T09:30:00+08:00");
    }

    #[test]
    fn round_trip_preserves_instant() {
        let tn = TimeNormalizer::default();
        let submitted = "2024-06-15T23:45:10-07:00";
        let stored = tn.parse("x", submitted).unwrap();
        let emitted = tn.present_for_output(Some(stored)).unwrap();

        let before = DateTime::parse_from_rfc3339(submitted).unwrap();
        let after = DateTime::parse_from_rfc3339(&emitted).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn configurable_zone() {
        let tn = TimeNormalizer::from_offset_str("-05:00").unwrap();
        let stored = tn.parse("x", "2024-03-01T12:00:00Z").unwrap();
        assert_eq!(stored, civil("2024-03-01 07:00:00"));
        assert_eq!(
            tn.present_for_output(Some(stored)).unwrap(),
            "2024-03-01T07:00:00-05:00"
        );
    }

    #[test]
    fn offset_strings() {
        assert_eq!(parse_offset("+08:00").unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(parse_offset("+0530").unwrap().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(parse_offset("-3").unwrap().local_minus_utc(), -3 * 3600);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("08:00").is_none());
        assert!(parse_offset("+25:00").is_none());
        assert!(TimeNormalizer::from_offset_str("soon").is_err());
    }

    #[test]
    fn elapsed_between_naive_values_is_plain_difference() {
        let d = elapsed(
            civil("2024-03-01 09:00:00").into(),
            civil("2024-03-01 10:30:00").into(),
        );
        assert_eq!(d, Duration::minutes(90));
    }

    #[test]
    fn elapsed_mixed_assumes_shared_zone() {
        let end = DateTime::parse_from_rfc3339("2024-03-01T10:00:00+08:00").unwrap();
        let d = elapsed(civil("2024-03-01 09:00:00").into(), end.into());
        assert_eq!(d, Duration::hours(1));

        let start = DateTime::parse_from_rfc3339("2024-03-01T09:00:00-05:00").unwrap();
        let d = elapsed(start.into(), civil("2024-03-01 09:45:00").into());
        assert_eq!(d, Duration::minutes(45));
    }

    #[test]
    fn elapsed_zoned_values_use_instants() {
        let a = DateTime::parse_from_rfc3339("2024-03-01T09:00:00+08:00").unwrap();
        let b = DateTime::parse_from_rfc3339("2024-03-01T02:00:00Z").unwrap();
        assert_eq!(elapsed(a.into(), b.into()), Duration::hours(1));
    }
}
