// Subtitle containers
//
// - srt: the input text-cue format (loader and writer)
// - ass: the output container carrying ruby markup

pub mod ass;
pub mod srt;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use ass::{AssLayout, AssWriter};
pub use srt::{LoadedCues, MalformedBlockPolicy, ParseWarning};

/// Millisecond-precision offset from the start of the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Parse `HH:MM:SS,mmm`. A `.` separator and single-digit hours are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (clock, millis) = value.split_once([',', '.'])?;
        if millis.len() != 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut parts = clock.split(':');
        let hours = parts.next()?;
        let minutes = parts.next()?;
        let seconds = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let field = |s: &str, min_len: usize, max_len: usize| -> Option<u64> {
            if s.len() < min_len || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()
        };

        let hours = field(hours, 1, 2)?;
        let minutes = field(minutes, 2, 2)?;
        let seconds = field(seconds, 2, 2)?;
        let millis: u64 = millis.parse().ok()?;
        if minutes > 59 || seconds > 59 {
            return None;
        }

        Some(Self(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis))
    }

    /// Format in SRT time format (HH:MM:SS,mmm)
    pub fn to_srt(&self) -> String {
        let hours = self.0 / 3_600_000;
        let minutes = (self.0 % 3_600_000) / 60_000;
        let secs = (self.0 % 60_000) / 1_000;
        let millis = self.0 % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
    }

    /// Format in ASS time format (H:MM:SS.cc), truncating to centiseconds
    pub fn to_ass(&self) -> String {
        let hours = self.0 / 3_600_000;
        let minutes = (self.0 % 3_600_000) / 60_000;
        let secs = (self.0 % 60_000) / 1_000;
        let centis = (self.0 % 1_000) / 10;

        format!("{}:{:02}:{:02}.{:02}", hours, minutes, secs, centis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_srt())
    }
}

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub index: u32,
    pub start: Timestamp,
    pub end: Timestamp,
    pub text: String,
}

impl Cue {
    /// Same timing, replaced text.
    pub fn with_text(&self, text: String) -> Self {
        Self {
            index: self.index,
            start: self.start,
            end: self.end,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(Timestamp::parse("00:00:00,000"), Some(Timestamp::from_millis(0)));
        assert_eq!(Timestamp::parse("00:01:05,123"), Some(Timestamp::from_millis(65_123)));
        assert_eq!(Timestamp::parse("1:01:01.500"), Some(Timestamp::from_millis(3_661_500)));
        assert_eq!(Timestamp::parse(" 01:00:00,001 "), Some(Timestamp::from_millis(3_600_001)));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(Timestamp::parse("00:00:00"), None);
        assert_eq!(Timestamp::parse("00:00:00,12"), None);
        assert_eq!(Timestamp::parse("00:60:00,000"), None);
        assert_eq!(Timestamp::parse("aa:00:00,000"), None);
        assert_eq!(Timestamp::parse("000:00:00,000"), None);
        assert_eq!(Timestamp::parse("00:00:00:00,000"), None);
    }

    #[test]
    fn test_format_srt_time() {
        assert_eq!(Timestamp::from_millis(0).to_srt(), "00:00:00,000");
        assert_eq!(Timestamp::from_millis(65_123).to_srt(), "00:01:05,123");
        assert_eq!(Timestamp::from_millis(3_661_500).to_srt(), "01:01:01,500");
    }

    #[test]
    fn test_format_ass_time() {
        assert_eq!(Timestamp::from_millis(65_129).to_ass(), "0:01:05.12");
        assert_eq!(Timestamp::from_millis(3_661_500).to_ass(), "1:01:01.50");
    }
}
