//! Link delay strings ("5ms", "250us", "0.1s").

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::TopologyError;

/// A link delay: the raw string as authored plus its value in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    raw: String,
    millis: f64,
}

impl Delay {
    pub fn from_millis(millis: f64) -> Self {
        Self {
            raw: format!("{}ms", millis),
            millis,
        }
    }

    pub fn as_millis(&self) -> f64 {
        self.millis
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Delay {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TopologyError::InvalidDelay {
            raw: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        // "ms" and "us" must be checked before the bare "s" suffix.
        let (number, scale) = if let Some(n) = trimmed.strip_suffix("ms") {
            (n, 1.0)
        } else if let Some(n) = trimmed.strip_suffix("us") {
            (n, 0.001)
        } else if let Some(n) = trimmed.strip_suffix('s') {
            (n, 1000.0)
        } else {
            (trimmed, 1.0)
        };

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| invalid("not a number"))?;
        if !value.is_finite() {
            return Err(invalid("not finite"));
        }
        if value < 0.0 {
            return Err(invalid("negative"));
        }

        Ok(Self {
            raw: s.to_string(),
            millis: value * scale,
        })
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Delay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Delay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Accept both "5ms" and a bare number of milliseconds.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Millis(f64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Millis(ms) if ms.is_finite() && ms >= 0.0 => Ok(Delay::from_millis(ms)),
            Repr::Millis(ms) => Err(serde::de::Error::custom(format!(
                "invalid delay {}: negative or not finite",
                ms
            ))),
        }
    }
}
