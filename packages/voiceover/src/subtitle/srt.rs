//! SubRip parsing.

use voiceover_domain::Cue;

use super::{SubtitleError, parse_clock};

pub(super) fn parse(text: &str) -> Result<Vec<Cue>, SubtitleError> {
    let mut cues = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !block.is_empty() {
                cues.push(parse_block(&block)?);
                block.clear();
            }
        } else {
            block.push((idx + 1, line));
        }
    }
    if !block.is_empty() {
        cues.push(parse_block(&block)?);
    }
    Ok(cues)
}

fn parse_block(block: &[(usize, &str)]) -> Result<Cue, SubtitleError> {
    let Some(pos) = block.iter().position(|(_, l)| l.contains("-->")) else {
        return Err(SubtitleError::parse(block[0].0, "cue block without a timing line"));
    };
    let (line_no, timing) = block[pos];
    let Some((start, end)) = timing.split_once("-->") else {
        return Err(SubtitleError::parse(line_no, "missing -->"));
    };
    let start = parse_clock(start, line_no)?;
    // Trailing position hints ("X1:... Y1:...") follow the end time.
    let end = end.split_whitespace().next().unwrap_or_default();
    let end = parse_clock(end, line_no)?;

    let lines: Vec<String> = block[pos + 1..]
        .iter()
        .map(|(_, l)| strip_markup(l).trim().to_owned())
        .filter(|l| !l.is_empty())
        .collect();
    Ok(Cue::from_lines(lines, start, end.saturating_sub(start)))
}

/// Drop `<...>` tags and `{...}` override blocks.
fn strip_markup(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut closing = None;
    for c in line.chars() {
        match (closing, c) {
            (None, '<') => closing = Some('>'),
            (None, '{') => closing = Some('}'),
            (None, _) => out.push(c),
            (Some(end), _) if c == end => closing = None,
            (Some(_), _) => {}
        }
    }
    out
}
