use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::ValidationError;

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const COMPACT_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    /// Builds a timestamp from unix seconds as reported by upstream APIs.
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::TimestampNotUtc {
                value: seconds.to_string(),
            })
    }

    /// Converts a local exchange wall-clock time into UTC.
    pub fn from_local(date: Date, hour: u8, minute: u8, second: u8, offset_hours: i8) -> Option<Self> {
        let offset = UtcOffset::from_hms(offset_hours, 0, 0).ok()?;
        let local = date.with_hms(hour, minute, second).ok()?.assume_offset(offset);
        Some(Self(local.to_offset(UtcOffset::UTC)))
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Calendar date of a trading session, serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradeDate(Date);

impl TradeDate {
    pub const fn from_date(date: Date) -> Self {
        Self(date)
    }

    pub fn today_utc() -> Self {
        Self(OffsetDateTime::now_utc().date())
    }

    /// Parses `YYYY-MM-DD`, also accepting a trailing time component
    /// (`2024-01-02 00:00:00`) some upstream APIs attach.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let date_part = trimmed.get(..10).unwrap_or(trimmed);
        Date::parse(date_part, ISO_DATE)
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    /// Exchange-local session date of a unix timestamp.
    pub fn from_unix_local(seconds: i64, offset_seconds: i32) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidDate {
            value: seconds.to_string(),
        };
        let offset = UtcOffset::from_whole_seconds(offset_seconds).map_err(|_| invalid())?;
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(|utc| Self(utc.to_offset(offset).date()))
            .map_err(|_| invalid())
    }

    /// Parses the compact `YYYYMMDD` form.
    pub fn parse_compact(input: &str) -> Result<Self, ValidationError> {
        Date::parse(input.trim(), COMPACT_DATE)
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    pub fn format_iso(self) -> String {
        format!(
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }

    pub fn format_compact(self) -> String {
        format!(
            "{:04}{:02}{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }

    pub fn minus_days(self, days: u32) -> Self {
        Self(self.0.saturating_sub(Duration::days(i64::from(days))))
    }

    pub fn plus_days(self, days: u32) -> Self {
        Self(self.0.saturating_add(Duration::days(i64::from(days))))
    }

    /// Whole calendar days from `earlier` to `self` (negative if `earlier` is later).
    pub fn days_since(self, earlier: Self) -> i64 {
        (self.0 - earlier.0).whole_days()
    }

    /// Unix seconds at 00:00 UTC of this date.
    pub fn unix_start(self) -> i64 {
        self.0.midnight().assume_utc().unix_timestamp()
    }

    pub const fn into_inner(self) -> Date {
        self.0
    }
}

impl Display for TradeDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_iso())
    }
}

impl Serialize for TradeDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_iso())
    }
}

impl<'de> Deserialize<'de> for TradeDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }

    #[test]
    fn local_exchange_time_converts_to_utc() {
        let date = TradeDate::parse("2024-03-01").expect("date").into_inner();
        let ts = UtcDateTime::from_local(date, 15, 0, 0, 8).expect("valid local time");
        assert_eq!(ts.format_rfc3339(), "2024-03-01T07:00:00Z");
    }

    #[test]
    fn trade_date_accepts_both_layouts() {
        let iso = TradeDate::parse("2024-01-02").expect("iso");
        let with_time = TradeDate::parse("2024-01-02 00:00:00").expect("iso with time");
        let compact = TradeDate::parse_compact("20240102").expect("compact");
        assert_eq!(iso, with_time);
        assert_eq!(iso, compact);
        assert_eq!(iso.format_compact(), "20240102");
        assert_eq!(iso.minus_days(2).format_iso(), "2023-12-31");
    }

    #[test]
    fn trade_date_rejects_garbage() {
        assert!(matches!(
            TradeDate::parse("02/01/2024"),
            Err(ValidationError::InvalidDate { .. })
        ));
    }

    #[test]
    fn unix_timestamp_maps_to_exchange_local_date() {
        // 2024-01-02 14:30 UTC is 09:30 in New York (UTC-5).
        let date = TradeDate::from_unix_local(1_704_205_800, -18_000).expect("valid");
        assert_eq!(date.format_iso(), "2024-01-02");
        // 2024-01-01 20:00 UTC is already Jan 2 in Shanghai.
        let date = TradeDate::from_unix_local(1_704_139_200, 28_800).expect("valid");
        assert_eq!(date.format_iso(), "2024-01-02");
    }
}
