//! Calendar-aligned resampling of stored snapshots

use crate::db::models::HistoricalSnapshot;
use crate::error::{AppError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Historical series granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[default]
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneHour => "1h",
            Interval::FourHours => "4h",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1w",
            Interval::OneMonth => "1M",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1h" => Ok(Interval::OneHour),
            "4h" => Ok(Interval::FourHours),
            "1d" => Ok(Interval::OneDay),
            "1w" => Ok(Interval::OneWeek),
            "1M" => Ok(Interval::OneMonth),
            other => Err(AppError::Validation(format!("Unknown interval '{}'", other))),
        }
    }
}

/// One point of a resampled series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

/// Buckets timestamps in a fixed reference timezone
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    tz: Tz,
}

impl Default for Resampler {
    fn default() -> Self {
        Self { tz: Tz::UTC }
    }
}

impl Resampler {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Start of the bucket `ts` falls into. Weeks start on Monday.
    pub fn bucket_start(&self, ts: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
        let local = ts.with_timezone(&self.tz);
        let date = local.date_naive();

        let boundary = match interval {
            Interval::OneHour => date.and_hms_opt(local.hour(), 0, 0),
            Interval::FourHours => date.and_hms_opt(local.hour() / 4 * 4, 0, 0),
            Interval::OneDay => date.and_hms_opt(0, 0, 0),
            Interval::OneWeek => {
                let back = Duration::days(i64::from(local.weekday().num_days_from_monday()));
                (date - back).and_hms_opt(0, 0, 0)
            }
            Interval::OneMonth => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        };

        match boundary {
            Some(naive) => self.to_utc(naive, &local),
            None => ts,
        }
    }

    fn to_utc(&self, naive: NaiveDateTime, reference: &DateTime<Tz>) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&naive).earliest() {
            Some(local) => local.with_timezone(&Utc),
            // Boundary skipped by a DST jump: use the offset in force at `reference`
            None => {
                let offset = reference.offset().fix().local_minus_utc();
                Utc.from_utc_datetime(&(naive - Duration::seconds(i64::from(offset))))
            }
        }
    }

    /// Reduce successful snapshots to one point per bucket inside `[start, end]`.
    ///
    /// Each bucket is represented by its latest snapshot; buckets are returned
    /// in ascending order.
    pub fn resample(
        &self,
        records: &[HistoricalSnapshot],
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<HistoricalPoint> {
        if start > end {
            return Vec::new();
        }

        let mut buckets: BTreeMap<DateTime<Utc>, &HistoricalSnapshot> = BTreeMap::new();

        for record in records.iter().filter(|r| r.success) {
            let key = self.bucket_start(record.timestamp, interval);
            buckets
                .entry(key)
                .and_modify(|current| {
                    if record.timestamp >= current.timestamp {
                        *current = record;
                    }
                })
                .or_insert(record);
        }

        buckets
            .range(start..=end)
            .map(|(bucket, record)| HistoricalPoint {
                timestamp: *bucket,
                price: record.price,
                volume: record.volume_24h,
            })
            .collect()
    }
}
