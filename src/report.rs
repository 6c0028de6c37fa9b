//! Parsing of delimited model output into document blocks.
//!
//! The model is asked to wrap the report title in `@@H1@@`, each section
//! headline in `@@H2@@` and each paragraph in `@@P@@`. A marker followed by
//! text opens a block of that kind, and the same marker right after it closes
//! the block. Markers with no text after them are skipped, and a missing
//! closing marker is tolerated. Text that does not follow any opening marker
//! is kept as a plain paragraph so malformed output is not lost.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

pub const H1: &str = "@@H1@@";
pub const H2: &str = "@@H2@@";
pub const P: &str = "@@P@@";

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"@@(H1|H2|P)@@").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Title(String),
    Heading(String),
    Paragraph(String),
}

impl Block {
    pub fn text(&self) -> &str {
        match self {
            Block::Title(t) | Block::Heading(t) | Block::Paragraph(t) => t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    H1,
    H2,
    P,
}

enum Token<'a> {
    Marker(Marker),
    Text(&'a str),
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in MARKER.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let before = text[last..whole.start()].trim();
        if !before.is_empty() {
            tokens.push(Token::Text(before));
        }
        let marker = match &caps[1] {
            "H1" => Marker::H1,
            "H2" => Marker::H2,
            _ => Marker::P,
        };
        tokens.push(Token::Marker(marker));
        last = whole.end();
    }
    let rest = text[last..].trim();
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    tokens
}

/// Split delimited report text into ordered blocks.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut pending: Option<Marker> = None;
    // Marker of the block just emitted; seeing it again closes that block.
    let mut closing: Option<Marker> = None;

    for token in tokenize(text) {
        match token {
            Token::Marker(m) if closing == Some(m) => {
                closing = None;
                pending = None;
            }
            Token::Marker(m) => {
                closing = None;
                pending = Some(m);
            }
            Token::Text(t) => {
                closing = pending;
                let block = match pending.take() {
                    Some(Marker::H1) => Block::Title(t.to_string()),
                    Some(Marker::H2) => Block::Heading(t.to_string()),
                    Some(Marker::P) => Block::Paragraph(t.to_string()),
                    None => {
                        warn!(part = %crate::utils::truncate_for_log(t, 50), "Treating unmarked text as paragraph");
                        Block::Paragraph(t.to_string())
                    }
                };
                blocks.push(block);
            }
        }
    }
    blocks
}
