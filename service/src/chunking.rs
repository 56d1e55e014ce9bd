//! Markdown-aware chunking: a `TextSplitter::new(min..max).chunks()`
//! pass preceded by a heading-aware pass. `text-splitter` has no notion
//! of heading ancestry, so the "Parent > Child" breadcrumb is built here
//! by hand, scanning heading lines up to each segment's start offset.

use std::sync::OnceLock;

use regex::Regex;
use text_splitter::{ChunkConfig, TextSplitter};

/// Content at or below this length is stored inline on the entity and
/// never chunked.
pub const CHUNK_THRESHOLD: usize = 1500;
const PARAGRAPH_SPLIT_THRESHOLD: usize = 1000;
const OVERLAP_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCandidate {
    pub content: String,
    pub position: i64,
    pub heading_path: Option<String>,
}

fn heading_regex() -> &'static Regex {
    static HEADING_RE: OnceLock<Regex> = OnceLock::new();
    HEADING_RE.get_or_init(|| {
        Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*$").expect("heading pattern is a valid regex")
    })
}

struct Heading {
    start: usize,
    level: usize,
    title: String,
}

fn find_headings(content: &str) -> Vec<Heading> {
    heading_regex()
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let level = caps.get(1)?.as_str().len();
            let title = caps.get(2)?.as_str().trim().to_string();
            Some(Heading {
                start: whole.start(),
                level,
                title,
            })
        })
        .collect()
}

struct Segment {
    heading_path: Option<String>,
    body: String,
}

/// Splits on Markdown heading boundaries (levels 1-6), tracking a stack
/// of open headings so each segment carries its full ancestry.
fn split_by_headings(content: &str) -> Vec<Segment> {
    let headings = find_headings(content);
    if headings.is_empty() {
        return vec![Segment {
            heading_path: None,
            body: content.to_string(),
        }];
    }

    let mut segments = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();

    if let Some(first) = headings.first() {
        let preamble = content.get(..first.start).unwrap_or_default().trim();
        if !preamble.is_empty() {
            segments.push(Segment {
                heading_path: None,
                body: preamble.to_string(),
            });
        }
    }

    for (index, heading) in headings.iter().enumerate() {
        while stack.last().is_some_and(|(level, _)| *level >= heading.level) {
            stack.pop();
        }
        stack.push((heading.level, heading.title.clone()));

        let body_end = headings.get(index + 1).map_or(content.len(), |next| next.start);
        let body = content.get(heading.start..body_end).unwrap_or_default().trim();
        if body.is_empty() {
            continue;
        }

        let heading_path = stack
            .iter()
            .map(|(_, title)| title.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        segments.push(Segment {
            heading_path: Some(heading_path),
            body: body.to_string(),
        });
    }

    segments
}

/// Further splits a heading segment on paragraph boundaries once it
/// exceeds [`PARAGRAPH_SPLIT_THRESHOLD`] characters.
fn paragraph_split(body: &str) -> Vec<String> {
    if body.chars().count() <= PARAGRAPH_SPLIT_THRESHOLD {
        return vec![body.to_string()];
    }

    let splitter = TextSplitter::new(ChunkConfig::new(PARAGRAPH_SPLIT_THRESHOLD));
    let pieces: Vec<String> = splitter.chunks(body).map(str::to_owned).collect();
    if pieces.is_empty() {
        vec![body.to_string()]
    } else {
        pieces
    }
}

fn tail_chars(text: &str, n: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= n {
        return text.to_string();
    }
    text.chars().skip(char_count - n).collect()
}

/// Runs the full chunking procedure. Returns an empty list
/// when `content` is at or below [`CHUNK_THRESHOLD`] — callers treat that
/// as "store inline, no chunks."
pub fn chunk_content(content: &str) -> Vec<ChunkCandidate> {
    if content.chars().count() <= CHUNK_THRESHOLD {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    let mut position: i64 = 0;
    let mut previous_tail: Option<String> = None;

    for segment in split_by_headings(content) {
        for piece in paragraph_split(&segment.body) {
            let text = match previous_tail.take() {
                Some(tail) if position > 0 => format!("{tail}{piece}"),
                _ => piece.clone(),
            };
            previous_tail = Some(tail_chars(&piece, OVERLAP_CHARS));
            candidates.push(ChunkCandidate {
                content: text,
                position,
                heading_path: segment.heading_path.clone(),
            });
            position += 1;
        }
    }

    candidates
}
