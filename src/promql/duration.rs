use serde::Serialize;
use std::fmt;

const UNITS: [(&str, i64); 7] = [
    ("y", 365 * 24 * 60 * 60 * 1000),
    ("w", 7 * 24 * 60 * 60 * 1000),
    ("d", 24 * 60 * 60 * 1000),
    ("h", 60 * 60 * 1000),
    ("m", 60 * 1000),
    ("s", 1000),
    ("ms", 1),
];

/// Signed PromQL duration with millisecond resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PromDuration(i64);

impl PromDuration {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs * 1000)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn to_chrono(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.0)
    }
}

impl std::ops::Neg for PromDuration {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for PromDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("0s");
        }
        if self.0 < 0 {
            f.write_str("-")?;
        }

        let mut rest = self.0.unsigned_abs() as i64;
        for (unit, millis) in UNITS {
            if rest >= millis {
                write!(f, "{}{}", rest / millis, unit)?;
                rest %= millis;
            }
        }
        Ok(())
    }
}

/// Parse a PromQL duration such as `5m`, `1h30m` or `250ms`
pub fn parse_duration(input: &str) -> Result<PromDuration, String> {
    if input.is_empty() {
        return Err("empty duration string".to_string());
    }

    let bytes = input.as_bytes();
    let mut total: i64 = 0;
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if start == i {
            return Err(format!("not a valid duration string: {:?}", input));
        }
        let amount: i64 = input[start..i]
            .parse()
            .map_err(|_| format!("duration out of range: {:?}", input))?;

        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let unit = &input[unit_start..i];
        let millis = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, millis)| *millis)
            .ok_or_else(|| format!("unknown unit {:?} in duration {:?}", unit, input))?;

        total = amount
            .checked_mul(millis)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| format!("duration out of range: {:?}", input))?;
    }

    Ok(PromDuration(total))
}

/// Whether `c` can start a duration unit
pub(crate) fn is_duration_unit_start(c: char) -> bool {
    matches!(c, 's' | 'm' | 'h' | 'd' | 'w' | 'y')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_durations() {
        assert_eq!(parse_duration("5m").unwrap().as_millis(), 300_000);
        assert_eq!(parse_duration("250ms").unwrap().as_millis(), 250);
        assert_eq!(parse_duration("1h30m").unwrap().as_millis(), 5_400_000);
        assert_eq!(parse_duration("2d").unwrap().as_millis(), 172_800_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("m5").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("1.5m").is_err());
    }

    #[test]
    fn test_display_compacts_units() {
        assert_eq!(PromDuration::from_secs(900).to_string(), "15m");
        assert_eq!(PromDuration::from_secs(5400).to_string(), "1h30m");
        assert_eq!(PromDuration::from_millis(1500).to_string(), "1s500ms");
        assert_eq!((-PromDuration::from_secs(60)).to_string(), "-1m");
        assert_eq!(PromDuration::from_millis(0).to_string(), "0s");
    }
}
