use crate::domain::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucket width used when resampling raw price rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    FiveMin,
    TenMin,
    FifteenMin,
    TwentyMin,
    ThirtyMin,
    OneHour,
    FourHour,
    OneDay,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::FiveMin => 5,
            Timeframe::TenMin => 10,
            Timeframe::FifteenMin => 15,
            Timeframe::TwentyMin => 20,
            Timeframe::ThirtyMin => 30,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    /// Returns the duration in seconds
    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    pub fn to_millis(&self) -> i64 {
        self.to_seconds() * 1000
    }

    pub fn to_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.to_seconds())
    }

    /// Short interval string ("5m", "1h", "1d")
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::FiveMin => "5m",
            Timeframe::TenMin => "10m",
            Timeframe::FifteenMin => "15m",
            Timeframe::TwentyMin => "20m",
            Timeframe::ThirtyMin => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Returns all available timeframes in ascending order
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::OneMin,
            Timeframe::FiveMin,
            Timeframe::TenMin,
            Timeframe::FifteenMin,
            Timeframe::TwentyMin,
            Timeframe::ThirtyMin,
            Timeframe::OneHour,
            Timeframe::FourHour,
            Timeframe::OneDay,
        ]
    }

    /// Minutes of 1-minute history needed to fill `buckets` complete buckets of this timeframe
    ///
    /// One extra bucket is added because the oldest bucket of a fetched window is usually partial.
    pub fn lookback_minutes(&self, buckets: usize) -> usize {
        (buckets + 1) * self.to_minutes()
    }
}

impl FromStr for Timeframe {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "1min" | "onemin" => Ok(Timeframe::OneMin),
            "5m" | "5min" | "fivemin" => Ok(Timeframe::FiveMin),
            "10m" | "10min" | "tenmin" => Ok(Timeframe::TenMin),
            "15m" | "15min" | "fifteenmin" => Ok(Timeframe::FifteenMin),
            "20m" | "20min" | "twentymin" => Ok(Timeframe::TwentyMin),
            "30m" | "30min" | "thirtymin" => Ok(Timeframe::ThirtyMin),
            "1h" | "1hour" | "60min" | "onehour" => Ok(Timeframe::OneHour),
            "4h" | "4hour" | "fourhour" => Ok(Timeframe::FourHour),
            "1d" | "1day" | "oneday" => Ok(Timeframe::OneDay),
            _ => Err(PipelineError::Configuration(format!(
                "Invalid timeframe: '{}'. Valid options: 1m, 5m, 10m, 15m, 20m, 30m, 1h, 4h, 1d",
                s
            ))),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minutes() {
        assert_eq!(Timeframe::OneMin.to_minutes(), 1);
        assert_eq!(Timeframe::TenMin.to_minutes(), 10);
        assert_eq!(Timeframe::OneHour.to_minutes(), 60);
        assert_eq!(Timeframe::OneDay.to_minutes(), 1440);
        assert_eq!(Timeframe::OneHour.to_millis(), 3_600_000);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::OneHour);
        assert_eq!(Timeframe::from_str("5min").unwrap(), Timeframe::FiveMin);
        assert_eq!(Timeframe::from_str("1D").unwrap(), Timeframe::OneDay);
        assert_eq!(Timeframe::from_str(" 20m ").unwrap(), Timeframe::TwentyMin);

        let err = Timeframe::from_str("7m").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_display_roundtrips_through_from_str() {
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::from_str(&tf.to_string()).unwrap(), tf);
        }
    }

    #[test]
    fn test_lookback_minutes() {
        // 11 hourly buckets plus one partial bucket
        assert_eq!(Timeframe::OneHour.lookback_minutes(11), 720);
    }
}
