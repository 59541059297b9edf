//! Advanced SubStation Alpha dialogue extraction.
//!
//! Only the `[Events]` section matters: its `Format:` line tells where the
//! start, end and text fields are, and every `Dialogue:` line becomes a cue.
//! Override blocks are dropped and line-break codes become newlines.

use voiceover_domain::Cue;

use super::{SubtitleError, parse_clock};

const DEFAULT_FORMAT: [&str; 10] = [
    "layer", "start", "end", "style", "name", "marginl", "marginr", "marginv", "effect", "text",
];

struct EventFormat {
    fields: usize,
    start: usize,
    end: usize,
}

impl EventFormat {
    fn from_names<'a>(
        names: impl IntoIterator<Item = &'a str>,
        line: usize,
    ) -> Result<Self, SubtitleError> {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.trim().to_ascii_lowercase())
            .collect();
        let find = |key: &str| {
            names
                .iter()
                .position(|n| n == key)
                .ok_or_else(|| SubtitleError::parse(line, format!("Format line lacks {key}")))
        };
        let (start, end, text) = (find("start")?, find("end")?, find("text")?);
        if text != names.len() - 1 {
            return Err(SubtitleError::parse(line, "Text must be the last field"));
        }
        Ok(Self {
            fields: names.len(),
            start,
            end,
        })
    }
}

pub(super) fn parse(text: &str) -> Result<Vec<Cue>, SubtitleError> {
    let mut cues = Vec::new();
    let mut in_events = false;
    let mut format: Option<EventFormat> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.starts_with('[') {
            in_events = line.eq_ignore_ascii_case("[events]");
            continue;
        }
        if !in_events {
            continue;
        }

        if let Some(rest) = strip_key(line, "Format:") {
            format = Some(EventFormat::from_names(rest.split(','), line_no)?);
        } else if let Some(rest) = strip_key(line, "Dialogue:") {
            if format.is_none() {
                format = Some(EventFormat::from_names(DEFAULT_FORMAT, line_no)?);
            }
            let Some(format) = format.as_ref() else {
                continue;
            };
            let fields: Vec<&str> = rest.splitn(format.fields, ',').collect();
            if fields.len() != format.fields {
                return Err(SubtitleError::parse(
                    line_no,
                    format!("expected {} fields, found {}", format.fields, fields.len()),
                ));
            }
            let start = parse_clock(fields[format.start], line_no)?;
            let end = parse_clock(fields[format.end], line_no)?;
            let text = dialogue_text(fields[format.fields - 1]);
            cues.push(Cue::new(text, start, end.saturating_sub(start)));
        }
    }
    Ok(cues)
}

fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let head = line.get(..key.len())?;
    head.eq_ignore_ascii_case(key).then(|| &line[key.len()..])
}

/// Plain text of a dialogue field: `{...}` removed, `\N`/`\n` as newline,
/// `\h` as space.
fn dialogue_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                for skipped in chars.by_ref() {
                    if skipped == '}' {
                        break;
                    }
                }
            }
            '\\' => match chars.peek() {
                Some('N') | Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('h') => {
                    chars.next();
                    out.push(' ');
                }
                _ => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SAMPLE: &str = "[Script Info]\n\
Title: test\n\
Dialogue: this is not an event\n\
\n\
[V4+ Styles]\n\
Format: Name, Fontname\n\
\n\
[Events]\n\
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
Comment: 0,0:00:00.00,0:00:01.00,Default,,0,0,0,,ignored\n\
Dialogue: 0,0:00:01.00,0:00:01.50,Default,,0,0,0,,Hi\n\
Dialogue: 0,0:00:02.25,0:00:04.00,Default,,0,0,0,,{\\i1}Hello,{\\i0} world\\Nsecond\\hline\n";

    #[test]
    fn test_dialogue_lines_become_cues() {
        let cues = parse(SAMPLE).unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text(), "Hi");
        assert_eq!(cues[0].presentation_time(), Duration::from_secs(1));
        assert_eq!(cues[0].duration(), Duration::from_millis(500));
        assert_eq!(cues[1].text(), "Hello, world\nsecond line");
        assert_eq!(cues[1].presentation_time(), Duration::from_millis(2250));
        assert_eq!(cues[1].duration(), Duration::from_millis(1750));
    }

    #[test]
    fn test_custom_field_order() {
        let text = "[Events]\nFormat: Start, End, Text\nDialogue: 0:00:03.00,0:00:04.00,a, b, c\n";
        let cues = parse(text).unwrap();
        assert_eq!(cues[0].text(), "a, b, c");
        assert_eq!(cues[0].presentation_time(), Duration::from_secs(3));
    }

    #[test]
    fn test_default_format_without_format_line() {
        let text = "[Events]\nDialogue: 0,0:00:00.50,0:00:01.00,Default,,0,0,0,,x\n";
        assert_eq!(parse(text).unwrap()[0].presentation_time(), Duration::from_millis(500));
    }

    #[test]
    fn test_malformed_lines_rejected() {
        let text = "[Events]\nFormat: Start, Text, End\n";
        assert!(matches!(parse(text), Err(SubtitleError::Parse { line: 2, .. })));
        let text = "[Events]\nDialogue: 0,0:00:01.00\n";
        assert!(matches!(parse(text), Err(SubtitleError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_override_codes() {
        assert_eq!(dialogue_text("{\\pos(1,2)}a\\nb"), "a\nb");
        assert_eq!(dialogue_text("back\\slash"), "back\\slash");
        assert_eq!(dialogue_text("{unclosed"), "");
    }
}
