use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bar granularity token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown period '{0}', expected one of: 1m, 5m, 1h, 1d")]
pub struct ParsePeriodError(pub String);

impl Period {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::OneHour => "1h",
            Self::OneDay => "1d",
        }
    }

    /// Default period set advertised by sources that do not declare one.
    pub fn default_set() -> std::collections::BTreeSet<Period> {
        [Self::OneMinute, Self::FiveMinutes, Self::OneDay]
            .into_iter()
            .collect()
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "1h" => Ok(Self::OneHour),
            "1d" => Ok(Self::OneDay),
            other => Err(ParsePeriodError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        for token in ["1m", "5m", "1h", "1d"] {
            let period: Period = token.parse().unwrap();
            assert_eq!(period.to_string(), token);
        }
    }

    #[test]
    fn parse_unknown_token() {
        let err = "2h".parse::<Period>().unwrap_err();
        assert_eq!(err, ParsePeriodError("2h".to_string()));
    }

    #[test]
    fn serde_uses_short_codes() {
        assert_eq!(serde_json::to_string(&Period::OneDay).unwrap(), "\"1d\"");
        let period: Period = serde_json::from_str("\"5m\"").unwrap();
        assert_eq!(period, Period::FiveMinutes);
    }
}
