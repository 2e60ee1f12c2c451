//! Time crate parameters (Date, Time, PrimitiveDateTime).
//!
//! `time::Time` always fits a TIME parameter. Dates are converted with
//! `TryFrom` because the time crate's large-dates range exceeds chrono's.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};

use super::{DateTimeParameter, TimeParameter, Value};

fn naive_time(v: time::Time) -> NaiveTime {
    let (h, m, s, micro) = v.as_hms_micro();
    NaiveTime::from_hms_micro_opt(u32::from(h), u32::from(m), u32::from(s), micro)
        .unwrap_or(NaiveTime::MIN)
}

fn naive_date(v: time::Date) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(v.year(), u32::from(u8::from(v.month())), u32::from(v.day()))
        .ok_or_else(|| Error::InvalidUsage(format!("date out of range: {v}")))
}

impl From<time::Time> for Value {
    fn from(v: time::Time) -> Self {
        Value::Time(TimeParameter::from(naive_time(v)))
    }
}

impl TryFrom<time::Date> for Value {
    type Error = Error;

    fn try_from(v: time::Date) -> Result<Self> {
        Ok(Value::Date(naive_date(v)?))
    }
}

impl TryFrom<time::PrimitiveDateTime> for Value {
    type Error = Error;

    fn try_from(v: time::PrimitiveDateTime) -> Result<Self> {
        let value = NaiveDateTime::new(naive_date(v.date())?, naive_time(v.time()));
        Ok(Value::DateTime(DateTimeParameter::from(value)))
    }
}
