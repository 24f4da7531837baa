use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::Cue;
use crate::config::OutputConfig;
use crate::error::Result;
use crate::file_utils::FileManager;
use crate::ruby;

const WORD_JOINER: char = '\u{2060}';

/// How glosses are laid out in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssLayout {
    /// One event per cue carrying the `r{word|gloss}` markup
    #[default]
    Inline,
    /// Plain text on the main line plus a separate line listing the glosses
    Stacked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    pub primary_color: String,
    /// Numpad-style alignment: 2 = bottom center, 8 = top center
    pub alignment: u8,
    pub margin_v: u32,
}

impl AssStyle {
    fn to_line(&self) -> String {
        format!(
            "Style: {},{},{},{},&H000000FF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,2,1,{},10,10,{},1",
            self.name, self.font_name, self.font_size, self.primary_color, self.alignment, self.margin_v
        )
    }
}

/// Renders annotated cues as an Advanced SubStation Alpha script.
pub struct AssWriter {
    layout: AssLayout,
    video_width: u32,
    video_height: u32,
    main_style: AssStyle,
    ruby_style: AssStyle,
}

impl AssWriter {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            layout: config.layout,
            video_width: config.video_width,
            video_height: config.video_height,
            main_style: AssStyle {
                name: "Main".to_string(),
                font_name: config.font_name.clone(),
                font_size: config.font_size,
                primary_color: "&H00FFFFFF".to_string(),
                alignment: 2,
                margin_v: 10,
            },
            ruby_style: AssStyle {
                name: "Ruby".to_string(),
                font_name: config.font_name.clone(),
                font_size: config.ruby_font_size,
                primary_color: "&H0000FFFF".to_string(),
                alignment: 8,
                margin_v: 10,
            },
        }
    }

    pub fn layout(&self) -> AssLayout {
        self.layout
    }

    fn header(&self) -> String {
        format!(
            "[Script Info]\n\
             Title: Rubigene Generated Subtitles\n\
             ScriptType: v4.00+\n\
             WrapStyle: 0\n\
             ScaledBorderAndShadow: yes\n\
             YCbCr Matrix: None\n\
             PlayResX: {}\n\
             PlayResY: {}\n\
             \n\
             [V4+ Styles]\n\
             Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
             {}\n\
             {}\n\
             \n\
             [Events]\n\
             Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
            self.video_width,
            self.video_height,
            self.main_style.to_line(),
            self.ruby_style.to_line()
        )
    }

    /// `text` must already be in ASS form (line breaks as `\N`).
    fn dialogue(layer: u8, cue: &Cue, style: &str, text: &str) -> String {
        format!(
            "Dialogue: {},{},{},{},,0000,0000,0000,,{}\n",
            layer,
            cue.start.to_ass(),
            cue.end.to_ass(),
            style,
            text
        )
    }

    /// Render cues whose text carries ruby markup.
    pub fn render(&self, cues: &[Cue]) -> Result<String> {
        let mut content = self.header();

        for cue in cues {
            match self.layout {
                AssLayout::Inline => {
                    let text = break_lines(&cue.text);
                    content.push_str(&Self::dialogue(0, cue, &self.main_style.name, &text));
                }
                AssLayout::Stacked => {
                    let main = ruby::strip_markup(&cue.text)?;
                    content.push_str(&Self::dialogue(0, cue, &self.main_style.name, &escape_ass(&main)));

                    let glosses: Vec<String> = ruby::parse_tags(&cue.text)?
                        .into_iter()
                        .map(|tag| tag.ruby)
                        .collect();
                    if !glosses.is_empty() {
                        let line = escape_ass(&glosses.join(" "));
                        content.push_str(&Self::dialogue(1, cue, &self.ruby_style.name, &line));
                    }
                }
            }
        }

        Ok(content)
    }

    /// Render and atomically write `cues` to `path` as UTF-8 with a BOM.
    pub async fn write<P: AsRef<Path>>(&self, cues: &[Cue], path: P) -> Result<()> {
        let path = path.as_ref();
        let rendered = self.render(cues)?;

        let mut bytes = Vec::with_capacity(rendered.len() + 3);
        bytes.extend_from_slice("\u{feff}".as_bytes());
        bytes.extend_from_slice(rendered.as_bytes());
        FileManager::write_atomic(path, bytes).await?;

        info!("Wrote {} cues to {}", cues.len(), path.display());
        Ok(())
    }
}

/// Inline layout: the text is ruby markup, whose own escapes own the
/// backslash. Only line breaks are rewritten; `ruby::strip_markup` reads `\N`
/// back as a newline.
fn break_lines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\\N")
}

/// Stacked layout: plain text made inert for an ASS text field.
///
/// Braces become `\{`/`\}` so they cannot open override blocks, and a
/// literal backslash is followed by a word joiner so it cannot combine with
/// the next character into `\N`, `\h` or a tag.
fn escape_ass(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => {
                escaped.push('\\');
                escaped.push(WORD_JOINER);
            }
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '\r' => {}
            '\n' => escaped.push_str("\\N"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::Timestamp;
    use tempfile::tempdir;

    fn cue(text: &str) -> Cue {
        Cue {
            index: 1,
            start: Timestamp::from_millis(1_000),
            end: Timestamp::from_millis(2_505),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_inline_layout() {
        let writer = AssWriter::new(&OutputConfig::default());
        let rendered = writer
            .render(&[cue("The r{ephemeral|はかない} beauty\nof dawn.")])
            .unwrap();

        assert!(rendered.starts_with("[Script Info]\n"));
        assert!(rendered.contains("PlayResX: 1920\n"));
        assert!(rendered.contains("Style: Main,Arial,52,"));
        assert!(rendered.contains("Style: Ruby,Arial,26,"));
        assert!(rendered.ends_with(
            "Dialogue: 0,0:00:01.00,0:00:02.50,Main,,0000,0000,0000,,The r{ephemeral|はかない} beauty\\Nof dawn.\n"
        ));
    }

    #[test]
    fn test_stacked_layout() {
        let config = OutputConfig {
            layout: AssLayout::Stacked,
            ..OutputConfig::default()
        };
        let writer = AssWriter::new(&config);
        let rendered = writer
            .render(&[cue("r{ephemeral|はかない} r{dawn|夜明け}"), cue("plain")])
            .unwrap();

        assert!(rendered.contains(",Main,,0000,0000,0000,,ephemeral dawn\n"));
        assert!(rendered.contains("Dialogue: 1,0:00:01.00,0:00:02.50,Ruby,,0000,0000,0000,,はかない 夜明け\n"));
        assert_eq!(rendered.matches("Dialogue: 1,").count(), 1);
    }

    /// Every brace is escaped and no backslash can start a tag or `\h`.
    fn assert_inert(field: &str) {
        let chars: Vec<char> = field.chars().collect();
        for (i, c) in chars.iter().enumerate() {
            match c {
                '{' | '}' => assert!(i > 0 && chars[i - 1] == '\\', "raw brace in {:?}", field),
                '\\' => assert!(
                    matches!(chars.get(i + 1).copied(), Some('{' | '}' | 'N' | WORD_JOINER)),
                    "live backslash in {:?}",
                    field
                ),
                _ => {}
            }
        }
    }

    #[test]
    fn test_stacked_layout_escapes_override_blocks() {
        use crate::ruby::{self, AnnotationSpan};
        use crate::tokenize::Span;

        let tagged = ruby::annotate(
            "Hello {there} dawn\\h",
            &[AnnotationSpan {
                cue_index: 1,
                span: Span::new(14, 18),
                gloss: "{\\an8}夜明け".to_string(),
            }],
        );
        let config = OutputConfig {
            layout: AssLayout::Stacked,
            ..OutputConfig::default()
        };
        let rendered = AssWriter::new(&config).render(&[cue(&tagged.text)]).unwrap();

        let fields: Vec<&str> = rendered
            .lines()
            .filter(|line| line.starts_with("Dialogue:"))
            .map(|line| line.splitn(10, ',').nth(9).unwrap())
            .collect();
        assert_eq!(fields.len(), 2);
        assert!(fields[0].starts_with("Hello \\{there\\} dawn"));
        assert!(fields[1].ends_with("an8\\}夜明け"));
        for field in fields {
            assert_inert(field);
        }
    }

    #[test]
    fn test_stacked_layout_breaks_lines() {
        let config = OutputConfig {
            layout: AssLayout::Stacked,
            ..OutputConfig::default()
        };
        let rendered = AssWriter::new(&config).render(&[cue("first\r\nr{second|二}")]).unwrap();
        assert!(rendered.contains(",Main,,0000,0000,0000,,first\\Nsecond\n"));
    }

    #[tokio::test]
    async fn test_write_has_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.ass");
        AssWriter::new(&OutputConfig::default())
            .write(&[cue("hello")], &path)
            .await
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], &[0xEF, 0xBB, 0xBF]);
    }
}
