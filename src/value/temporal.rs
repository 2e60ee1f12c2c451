//! Date and time parameters.
//!
//! Binary layouts follow the server's `MYSQL_TIME` packing: a leading length
//! byte, then only as many fields as the length announces.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta,
    Timelike, Utc,
};

use crate::error::{Error, Result};
use crate::protocol::codec::{write_u8, write_u16, write_u32};

/// A TIME parameter.
///
/// The value is an instant measured from the Unix epoch, rendered as a wall
/// clock in `zone`. Instants before the epoch are sent as negative times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParameter {
    instant: DateTime<Utc>,
    zone: FixedOffset,
    fractional_seconds: bool,
}

impl TimeParameter {
    /// Create a TIME parameter from an instant, rendered in `zone`.
    pub fn new(instant: DateTime<Utc>, zone: FixedOffset, fractional_seconds: bool) -> Self {
        Self {
            instant,
            zone,
            fractional_seconds,
        }
    }

    /// Create a TIME parameter from a signed offset to the epoch.
    pub fn from_duration(duration: TimeDelta, zone: FixedOffset) -> Result<Self> {
        let instant = DateTime::<Utc>::UNIX_EPOCH
            .checked_add_signed(duration)
            .ok_or_else(|| Error::InvalidUsage(format!("TIME out of range: {duration}")))?;
        Ok(Self::new(instant, zone, true))
    }

    /// Whether microseconds are sent.
    pub fn fractional_seconds(&self) -> bool {
        self.fractional_seconds
    }

    /// Return a copy with the fractional-seconds flag replaced.
    pub fn with_fractional_seconds(self, fractional_seconds: bool) -> Self {
        Self {
            fractional_seconds,
            ..self
        }
    }

    /// True for instants before the epoch.
    pub fn is_negative(&self) -> bool {
        self.instant < DateTime::<Utc>::UNIX_EPOCH
    }

    /// Wall clock time in the configured zone.
    fn wall_clock(&self) -> NaiveTime {
        self.instant.with_timezone(&self.zone).time()
    }

    /// Sub-second part of the wall clock, in microseconds.
    fn micros(&self) -> u32 {
        (self.wall_clock().nanosecond() % 1_000_000_000) / 1_000
    }

    pub(super) fn write_text(&self, out: &mut Vec<u8>) {
        let wall = self.wall_clock();
        out.push(b'\'');
        if self.is_negative() {
            out.push(b'-');
        }
        out.extend_from_slice(
            format!("{:02}:{:02}:{:02}", wall.hour(), wall.minute(), wall.second()).as_bytes(),
        );
        write_fraction(out, self.micros(), self.fractional_seconds);
        out.push(b'\'');
    }

    /// Binary TIME: length, sign, day count, hour, minute, second, [micros].
    ///
    /// The day of month is normalized away before extraction, so the sign
    /// byte and the day count are always zero.
    pub(super) fn write_binary(&self, out: &mut Vec<u8>) {
        let wall = self.wall_clock();
        write_u8(out, if self.fractional_seconds { 12 } else { 8 });
        write_u8(out, 0);
        write_u32(out, 0);
        write_u8(out, wall.hour() as u8);
        write_u8(out, wall.minute() as u8);
        write_u8(out, wall.second() as u8);
        if self.fractional_seconds {
            write_u32(out, self.micros());
        }
    }

    pub(super) const APPROXIMATE_TEXT_LENGTH: usize = 15;
}

impl From<NaiveTime> for TimeParameter {
    fn from(time: NaiveTime) -> Self {
        let instant = DateTime::<Utc>::UNIX_EPOCH
            .date_naive()
            .and_time(time)
            .and_utc();
        Self::new(instant, Utc.fix(), true)
    }
}

/// A DATETIME / TIMESTAMP parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeParameter {
    value: NaiveDateTime,
    fractional_seconds: bool,
}

impl DateTimeParameter {
    /// Create a DATETIME parameter.
    pub fn new(value: NaiveDateTime, fractional_seconds: bool) -> Self {
        Self {
            value,
            fractional_seconds,
        }
    }

    /// Return a copy with the fractional-seconds flag replaced.
    pub fn with_fractional_seconds(self, fractional_seconds: bool) -> Self {
        Self {
            fractional_seconds,
            ..self
        }
    }

    fn micros(&self) -> u32 {
        (self.value.nanosecond() % 1_000_000_000) / 1_000
    }

    pub(super) fn write_text(&self, out: &mut Vec<u8>) {
        let v = &self.value;
        out.push(b'\'');
        out.extend_from_slice(
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                v.year(),
                v.month(),
                v.day(),
                v.hour(),
                v.minute(),
                v.second()
            )
            .as_bytes(),
        );
        write_fraction(out, self.micros(), self.fractional_seconds);
        out.push(b'\'');
    }

    pub(super) fn write_binary(&self, out: &mut Vec<u8>) {
        let v = &self.value;
        let micros = self.micros();
        let with_micros = self.fractional_seconds && micros != 0;
        write_u8(out, if with_micros { 11 } else { 7 });
        write_u16(out, v.year() as u16);
        write_u8(out, v.month() as u8);
        write_u8(out, v.day() as u8);
        write_u8(out, v.hour() as u8);
        write_u8(out, v.minute() as u8);
        write_u8(out, v.second() as u8);
        if with_micros {
            write_u32(out, micros);
        }
    }

    pub(super) const APPROXIMATE_TEXT_LENGTH: usize = 28;
}

impl From<NaiveDateTime> for DateTimeParameter {
    fn from(value: NaiveDateTime) -> Self {
        Self::new(value, true)
    }
}

impl From<DateTime<Utc>> for DateTimeParameter {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(value.naive_utc(), true)
    }
}

pub(super) fn write_date_text(date: &NaiveDate, out: &mut Vec<u8>) {
    out.extend_from_slice(
        format!("'{:04}-{:02}-{:02}'", date.year(), date.month(), date.day()).as_bytes(),
    );
}

pub(super) fn write_date_binary(date: &NaiveDate, out: &mut Vec<u8>) {
    write_u8(out, 4);
    write_u16(out, date.year() as u16);
    write_u8(out, date.month() as u8);
    write_u8(out, date.day() as u8);
}

pub(super) const DATE_APPROXIMATE_TEXT_LENGTH: usize = 12;

fn write_fraction(out: &mut Vec<u8>, micros: u32, fractional_seconds: bool) {
    if fractional_seconds && micros != 0 {
        out.extend_from_slice(format!(".{micros:06}").as_bytes());
    }
}
