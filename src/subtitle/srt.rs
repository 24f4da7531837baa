use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{Cue, Timestamp};
use crate::error::{Result, RubigeneError};

/// What to do with a block whose index or text is unusable.
///
/// Timing defects (missing `-->`, unparseable or inverted timestamps) are
/// always rejected regardless of this policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedBlockPolicy {
    /// Drop the block and record a warning
    #[default]
    Skip,
    /// Fail the whole load
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedCues {
    pub cues: Vec<Cue>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse SRT content, failing on the first malformed block.
pub fn load(input: &str) -> Result<Vec<Cue>> {
    load_with_policy(input, MalformedBlockPolicy::Abort).map(|loaded| loaded.cues)
}

/// Parse SRT content, applying `policy` to blocks with a bad index or no text.
pub fn load_with_policy(input: &str, policy: MalformedBlockPolicy) -> Result<LoadedCues> {
    let content = input.strip_prefix('\u{feff}').unwrap_or(input);
    let content = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut loaded = LoadedCues::default();
    let mut last_index: Option<u32> = None;

    for block in split_blocks(&content) {
        match parse_block(&block, last_index)? {
            BlockResult::Cue(cue) => {
                last_index = Some(cue.index);
                loaded.cues.push(cue);
            }
            BlockResult::Malformed(warning) => match policy {
                MalformedBlockPolicy::Abort => {
                    return Err(RubigeneError::parse(warning.line, warning.message));
                }
                MalformedBlockPolicy::Skip => {
                    warn!("Skipping subtitle block at line {}: {}", warning.line, warning.message);
                    loaded.warnings.push(warning);
                }
            },
        }
    }

    debug!(
        "Parsed {} cues ({} blocks skipped)",
        loaded.cues.len(),
        loaded.warnings.len()
    );
    Ok(loaded)
}

/// Read and parse an SRT file. Invalid UTF-8 is decoded lossily.
pub async fn load_file<P: AsRef<Path>>(path: P, policy: MalformedBlockPolicy) -> Result<LoadedCues> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RubigeneError::FileNotFound(path.display().to_string()));
    }

    let bytes = fs::read(path).await?;
    let content = String::from_utf8_lossy(&bytes);
    let loaded = load_with_policy(&content, policy)?;

    info!("Loaded {} cues from {}", loaded.cues.len(), path.display());
    Ok(loaded)
}

/// Render cues back to SRT.
pub fn to_srt(cues: &[Cue]) -> String {
    let mut srt_content = String::new();

    for cue in cues {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            cue.start.to_srt(),
            cue.end.to_srt(),
            cue.text
        ));
    }

    srt_content
}

struct Block<'a> {
    /// 1-based line number of the first line
    first_line: usize,
    lines: Vec<&'a str>,
}

enum BlockResult {
    Cue(Cue),
    Malformed(ParseWarning),
}

fn split_blocks(content: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }

        current
            .get_or_insert_with(|| Block {
                first_line: idx + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    blocks
}

fn parse_block(block: &Block<'_>, last_index: Option<u32>) -> Result<BlockResult> {
    let line_no = block.first_line;
    let malformed = |line: usize, message: String| -> Result<BlockResult> {
        Ok(BlockResult::Malformed(ParseWarning { line, message }))
    };

    let index_line = block.lines[0].trim();
    if index_line.contains("-->") {
        return malformed(line_no, "missing index line before timestamp".to_string());
    }

    let index: u32 = match index_line.parse() {
        Ok(index) => index,
        Err(_) => return malformed(line_no, format!("invalid index line '{}'", index_line)),
    };

    let Some(timing_line) = block.lines.get(1) else {
        return malformed(line_no, format!("block {} ends before its timestamp line", index));
    };
    let (start, end) = parse_timing(timing_line.trim(), line_no + 1)?;

    if let Some(previous) = last_index {
        if index <= previous {
            return malformed(
                line_no,
                format!("index {} does not follow previous index {}", index, previous),
            );
        }
    }

    let text = block.lines[2..]
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return malformed(line_no, format!("block {} has no text", index));
    }

    Ok(BlockResult::Cue(Cue {
        index,
        start,
        end,
        text,
    }))
}

fn parse_timing(line: &str, line_no: usize) -> Result<(Timestamp, Timestamp)> {
    let (start, end) = line
        .split_once("-->")
        .ok_or_else(|| RubigeneError::parse(line_no, format!("missing '-->' separator in '{}'", line)))?;

    let start = Timestamp::parse(start)
        .ok_or_else(|| RubigeneError::parse(line_no, format!("invalid start timestamp '{}'", start.trim())))?;
    // Some files carry position hints after the end time
    let end_field = end.split_whitespace().next().unwrap_or_default();
    let end = Timestamp::parse(end_field)
        .ok_or_else(|| RubigeneError::parse(line_no, format!("invalid end timestamp '{}'", end.trim())))?;

    if end < start {
        return Err(RubigeneError::parse(
            line_no,
            format!("end {} is earlier than start {}", end, start),
        ));
    }

    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:02,500\nThe ephemeral beauty of dawn.\n\n2\n00:00:03,000 --> 00:00:04,000\nFirst line\nSecond line\n";

    #[test]
    fn test_load_basic() {
        let cues = load(SAMPLE).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].index, 1);
        assert_eq!(cues[0].start.as_millis(), 1_000);
        assert_eq!(cues[0].end.as_millis(), 2_500);
        assert_eq!(cues[0].text, "The ephemeral beauty of dawn.");
        assert_eq!(cues[1].text, "First line\nSecond line");
    }

    #[test]
    fn test_load_tolerates_blank_lines_and_trailing_whitespace() {
        let input = "\u{feff}\r\n\r\n1  \r\n00:00:01,000 --> 00:00:02,000   \r\nHello there   \r\n\r\n\r\n   \r\n2\r\n00:00:02.000 --> 00:00:03.000\r\nAgain\r\n\r\n";
        let cues = load(input).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "Hello there");
        assert_eq!(cues[1].start.as_millis(), 2_000);
    }

    #[test]
    fn test_load_preserves_file_order_and_duplicates() {
        let input = "1\n00:00:05,000 --> 00:00:06,000\nSame\n\n2\n00:00:01,000 --> 00:00:02,000\nSame\n";
        let cues = load(input).unwrap();
        assert_eq!(cues.iter().map(|c| c.index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(cues[0].text, cues[1].text);
    }

    #[test]
    fn test_end_before_start_is_parse_error() {
        let input = "1\n00:00:05,000 --> 00:00:04,000\nBackwards\n";
        let err = load_with_policy(input, MalformedBlockPolicy::Skip).unwrap_err();
        match err {
            RubigeneError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("earlier than start"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_arrow_is_parse_error() {
        let input = "1\n00:00:01,000 00:00:02,000\nNo arrow\n";
        assert!(matches!(
            load_with_policy(input, MalformedBlockPolicy::Skip),
            Err(RubigeneError::Parse { .. })
        ));
    }

    #[test]
    fn test_bad_timestamp_is_parse_error() {
        let input = "1\n00:00:01 --> 00:00:02,000\nShort\n";
        assert!(matches!(load(input), Err(RubigeneError::Parse { .. })));
    }

    #[test]
    fn test_non_monotonic_index_aborts_in_strict_mode() {
        let input = "2\n00:00:01,000 --> 00:00:02,000\nA\n\n1\n00:00:03,000 --> 00:00:04,000\nB\n";
        assert!(matches!(load(input), Err(RubigeneError::Parse { line: 5, .. })));
    }

    #[test]
    fn test_skip_policy_accumulates_warnings() {
        let input = "1\n00:00:01,000 --> 00:00:02,000\nA\n\nx\n00:00:02,000 --> 00:00:03,000\nB\n\n2\n00:00:03,000 --> 00:00:04,000\n\n3\n00:00:04,000 --> 00:00:05,000\nC\n\n4\n";
        let loaded = load_with_policy(input, MalformedBlockPolicy::Skip).unwrap();
        assert_eq!(
            loaded.cues.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["A", "C"]
        );
        // bad index, text-less block, unterminated trailing block
        assert_eq!(loaded.warnings.len(), 3);
        assert_eq!(loaded.warnings[0].line, 5);
    }

    #[test]
    fn test_position_hints_after_end_time() {
        let input = "1\n00:00:01,000 --> 00:00:02,000 X1:100 X2:200\nPositioned\n";
        let cues = load(input).unwrap();
        assert_eq!(cues[0].end.as_millis(), 2_000);
    }

    #[test]
    fn test_to_srt_round_trip() {
        let cues = load(SAMPLE).unwrap();
        let rendered = to_srt(&cues);
        assert_eq!(load(&rendered).unwrap(), cues);
    }

    #[tokio::test]
    async fn test_load_file_missing() {
        let err = load_file("/definitely/not/here.srt", MalformedBlockPolicy::Skip)
            .await
            .unwrap_err();
        assert!(matches!(err, RubigeneError::FileNotFound(_)));
    }
}
