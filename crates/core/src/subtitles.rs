//! Subtitle file parsing and cue lookup.
//!
//! The subtitle file is a header-less CSV. Rows starting with `font_path`,
//! `font_size` or `font_color` are style directives; every other row is
//! `<start seconds>, <text>`.

use std::path::Path;

use tokio::fs;

use crate::{
    config::{StyleOverrides, TextColor},
    error::{NarratorError, Result},
};

/// One timed subtitle line.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: f64,
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            text: text.into(),
        }
    }
}

/// Parsed contents of a subtitle file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleScript {
    /// Cues in file order. They are never re-sorted.
    pub cues: Vec<Cue>,
    pub style: StyleOverrides,
}

/// Load and parse a subtitle file from disk.
pub async fn load_script(path: &Path) -> Result<SubtitleScript> {
    let content = fs::read_to_string(path).await?;
    parse_script(&content)
}

pub fn parse_script(content: &str) -> Result<SubtitleScript> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut script = SubtitleScript::default();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row = index + 1;
        let field = |i: usize| {
            record.get(i).ok_or_else(|| NarratorError::SubtitleRow {
                row,
                reason: format!("expected at least {} fields", i + 1),
            })
        };

        match field(0)?.trim() {
            "font_path" => {
                script.style.font_path = Some(field(1)?.trim().into());
            }
            "font_size" => {
                script.style.font_size = Some(parse_number(field(1)?, row, "font size")?);
            }
            "font_color" => {
                let r = parse_number(field(1)?, row, "red channel")?;
                let g = parse_number(field(2)?, row, "green channel")?;
                let b = parse_number(field(3)?, row, "blue channel")?;
                script.style.font_color = Some(TextColor::rgb(r, g, b));
            }
            start => {
                let start = parse_number(start, row, "start time")?;
                script.cues.push(Cue::new(start, field(1)?));
            }
        }
    }

    Ok(script)
}

fn parse_number<T: std::str::FromStr>(raw: &str, row: usize, what: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| NarratorError::SubtitleRow {
        row,
        reason: format!("invalid {what}: {raw:?}"),
    })
}

/// Text of the last cue (in list order) that has started at time `t`.
///
/// For a list sorted by start time this is the cue with the greatest
/// `start <= t`, ties going to the later entry.
pub fn resolve_cue(cues: &[Cue], t: f64) -> Option<&str> {
    cues.iter()
        .rev()
        .find(|cue| cue.start <= t)
        .map(|cue| cue.text.as_str())
}

pub fn is_sorted(cues: &[Cue]) -> bool {
    cues.is_sorted_by(|a, b| a.start <= b.start)
}

/// Incremental [`resolve_cue`] for monotonically increasing timestamps over
/// a sorted cue list.
#[derive(Debug)]
pub struct CueCursor<'a> {
    cues: &'a [Cue],
    /// Number of cues whose start has been passed.
    passed: usize,
}

impl<'a> CueCursor<'a> {
    pub fn new(cues: &'a [Cue]) -> Self {
        debug_assert!(is_sorted(cues));
        Self { cues, passed: 0 }
    }

    pub fn advance(&mut self, t: f64) -> Option<&'a str> {
        let cues = self.cues;
        while self.passed < cues.len() && cues[self.passed].start <= t {
            self.passed += 1;
        }
        self.passed.checked_sub(1).map(|i| cues[i].text.as_str())
    }
}

/// Lookup strategy for the compositing pass: a cursor when the list is
/// sorted, a full scan per frame otherwise.
#[derive(Debug)]
pub enum CueLookup<'a> {
    Cursor(CueCursor<'a>),
    Scan(&'a [Cue]),
}

impl<'a> CueLookup<'a> {
    pub fn new(cues: &'a [Cue]) -> Self {
        if is_sorted(cues) {
            Self::Cursor(CueCursor::new(cues))
        } else {
            Self::Scan(cues)
        }
    }

    pub fn at(&mut self, t: f64) -> Option<&'a str> {
        match self {
            Self::Cursor(cursor) => cursor.advance(t),
            Self::Scan(cues) => resolve_cue(cues, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Cue> {
        vec![Cue::new(0.0, "A"), Cue::new(2.5, "B"), Cue::new(5.0, "C")]
    }

    #[test]
    fn resolves_latest_started_cue() {
        let cues = sample();
        assert_eq!(resolve_cue(&cues, 1.0), Some("A"));
        assert_eq!(resolve_cue(&cues, 2.5), Some("B"));
        assert_eq!(resolve_cue(&cues, 4.9), Some("B"));
        assert_eq!(resolve_cue(&cues, 10.0), Some("C"));
        assert_eq!(resolve_cue(&cues, -1.0), None);
    }

    #[test]
    fn ties_go_to_later_entry() {
        let cues = vec![Cue::new(1.0, "first"), Cue::new(1.0, "second")];
        assert_eq!(resolve_cue(&cues, 1.0), Some("second"));
        assert_eq!(CueCursor::new(&cues).advance(1.0), Some("second"));
    }

    #[test]
    fn cursor_matches_scan_frame_by_frame() {
        let cues = vec![
            Cue::new(0.5, "a"),
            Cue::new(0.5, "b"),
            Cue::new(1.2, "c"),
            Cue::new(3.0, "d"),
        ];
        let mut cursor = CueCursor::new(&cues);
        for frame in 0..150 {
            let t = frame as f64 / 30.0;
            assert_eq!(cursor.advance(t), resolve_cue(&cues, t), "t = {t}");
        }
    }

    #[test]
    fn unsorted_lists_fall_back_to_scanning() {
        let cues = vec![Cue::new(3.0, "late"), Cue::new(1.0, "early")];
        let mut lookup = CueLookup::new(&cues);
        assert!(matches!(lookup, CueLookup::Scan(_)));
        assert_eq!(lookup.at(4.0), Some("early"));
        assert_eq!(lookup.at(2.0), Some("early"));
    }

    #[test]
    fn parses_color_directive_and_cue() {
        let script = parse_script("font_color,10,20,30\n1.5,hello\n").unwrap();
        let color = script.style.font_color.unwrap();
        assert_eq!((color.r, color.g, color.b, color.a), (10, 20, 30, 0));
        assert_eq!(script.cues, vec![Cue::new(1.5, "hello")]);
    }

    #[test]
    fn parses_font_directives_and_multiline_text() {
        let csv = "font_path,/tmp/font.ttf\nfont_size, 40\n0,\"line one\nline two\"\n2.0,next\n";
        let script = parse_script(csv).unwrap();
        assert_eq!(script.style.font_path, Some("/tmp/font.ttf".into()));
        assert_eq!(script.style.font_size, Some(40));
        assert_eq!(script.cues.len(), 2);
        assert_eq!(script.cues[0].text, "line one\nline two");
        assert_eq!(script.cues[1].start, 2.0);
    }

    #[test]
    fn rejects_bad_start_time() {
        let err = parse_script("0,ok\nsoon,broken\n").unwrap_err();
        assert!(matches!(err, NarratorError::SubtitleRow { row: 2, .. }));
    }

    #[test]
    fn rejects_cue_without_text() {
        let err = parse_script("1.0\n").unwrap_err();
        assert!(matches!(err, NarratorError::SubtitleRow { row: 1, .. }));
    }
}
