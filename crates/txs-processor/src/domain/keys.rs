use chrono::{DateTime, Utc};

const SECONDS_PER_HOUR: i64 = 3600;

/// Start of the clock hour containing `t`; the aggregation bucket for all
/// hourly statistics.
pub fn hour_bucket(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    let floored = secs - secs.rem_euclid(SECONDS_PER_HOUR);
    DateTime::from_timestamp(floored, 0).unwrap_or(t)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IbcKey {
    pub source: String,
    pub destination: String,
    pub channel_id: String,
    pub hour: DateTime<Utc>,
}

impl IbcKey {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        channel_id: impl Into<String>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            channel_id: channel_id.into(),
            hour: hour_bucket(time),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, h, m, s).single().expect("valid time")
            + chrono::TimeDelta::milliseconds(i64::from(ms))
    }

    #[test]
    fn same_hour_shares_bucket() {
        assert_eq!(hour_bucket(at(10, 59, 59, 999)), hour_bucket(at(10, 0, 0, 0)));
        assert_eq!(hour_bucket(at(10, 59, 59, 999)), at(10, 0, 0, 0));
    }

    #[test]
    fn hour_boundary_splits_buckets() {
        assert_ne!(hour_bucket(at(10, 59, 59, 999)), hour_bucket(at(11, 0, 0, 0)));
    }

    #[test]
    fn pre_epoch_times_floor_downwards() {
        let t = Utc.with_ymd_and_hms(1969, 12, 31, 23, 30, 0).single().expect("valid time");
        let expected = Utc.with_ymd_and_hms(1969, 12, 31, 23, 0, 0).single().expect("valid time");
        assert_eq!(hour_bucket(t), expected);
    }
}
