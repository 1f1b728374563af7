use std::ops::Range;

use crate::detect::label_token;
use crate::error::Error;
use crate::model::{
    Block, Document, EditKind, Format, Markup, Region, RunStyle, Source, StyleRun,
};

/// RTF's default font size in half-points.
const DEFAULT_FS_HALF_POINTS: f32 = 24.0;

/// Destination groups whose content is not document text.
const SKIP_DESTINATIONS: [&str; 17] = [
    "fonttbl", "colortbl", "stylesheet", "info", "pict", "header", "footer", "headerl",
    "headerr", "headerf", "footerl", "footerr", "footerf", "ftnsep", "ftnsepc", "aftnsep",
    "fldinst",
];

pub struct RtfSource {
    pub(crate) bytes: Vec<u8>,
}

pub(crate) fn load(input: &[u8]) -> Result<Document, Error> {
    if !input.starts_with(b"{\\rtf") {
        return Err(Error::MalformedDocument("missing {\\rtf header".into()));
    }
    let mut parser = Parser::new(input);
    parser.run();
    let blocks = parser.blocks;
    log::debug!("rtf: {} blocks", blocks.len());
    Ok(Document {
        format: Format::Rtf,
        blocks,
        source: Source::Rtf(RtfSource {
            bytes: input.to_vec(),
        }),
        edits: Vec::new(),
    })
}

#[derive(Clone)]
struct Group {
    super_on: bool,
    fs: f32,
    uc: usize,
    skip: bool,
}

impl Default for Group {
    fn default() -> Self {
        Group {
            super_on: false,
            fs: DEFAULT_FS_HALF_POINTS,
            uc: 1,
            skip: false,
        }
    }
}

struct RunAccum {
    text: String,
    super_on: bool,
    fs: f32,
    span: Range<usize>,
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<Group>,
    blocks: Vec<Block>,
    runs: Vec<StyleRun>,
    cur: Option<RunAccum>,
    footnote_counter: u32,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Parser {
            bytes,
            pos: 0,
            stack: vec![Group::default()],
            blocks: Vec::new(),
            runs: Vec::new(),
            cur: None,
            footnote_counter: 0,
        }
    }

    fn top(&self) -> &Group {
        // The stack is never empty: the root group stays until EOF.
        self.stack.last().unwrap()
    }

    fn top_mut(&mut self) -> &mut Group {
        self.stack.last_mut().unwrap()
    }

    fn run(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'{' => self.open_group(),
                b'}' => {
                    if self.stack.len() == 1 {
                        self.end_paragraph(self.pos);
                        break;
                    }
                    self.pos += 1;
                    self.stack.pop();
                }
                b'\\' => self.control(),
                b'\r' | b'\n' => self.pos += 1,
                b => {
                    self.pos += 1;
                    self.text_char(cp1252(b), self.pos - 1..self.pos);
                }
            }
        }
        self.end_paragraph(self.pos.min(self.bytes.len()));
    }

    fn open_group(&mut self) {
        let brace = self.pos;
        if let Some(name) = peek_destination(self.bytes, brace + 1) {
            if name == "footnote" && !self.top().skip {
                self.flush_run();
                self.capture_footnote(brace);
                return;
            }
            if name == "*" || SKIP_DESTINATIONS.contains(&name.as_str()) {
                self.pos = brace + 1;
                let mut group = self.top().clone();
                group.skip = true;
                self.stack.push(group);
                return;
            }
        }
        self.pos = brace + 1;
        let group = self.top().clone();
        self.stack.push(group);
    }

    fn control(&mut self) {
        let start = self.pos;
        self.pos += 1;
        let Some(&b) = self.bytes.get(self.pos) else {
            return;
        };
        match b {
            b'\\' | b'{' | b'}' => {
                self.pos += 1;
                self.text_char(b as char, start..self.pos);
            }
            b'\'' => {
                self.pos += 1;
                if let Some(c) = self.hex_escape() {
                    self.text_char(c, start..self.pos);
                }
            }
            b'~' => {
                self.pos += 1;
                self.text_char(' ', start..self.pos);
            }
            b'-' | b'_' | b'*' => self.pos += 1,
            _ if b.is_ascii_alphabetic() => self.control_word(start),
            _ => self.pos += 1,
        }
    }

    fn control_word(&mut self, start: usize) {
        let (name, value) = read_control_word(self.bytes, &mut self.pos);
        match name.as_str() {
            "par" => self.end_paragraph(self.pos),
            // \pard resets paragraph properties only, so it is left
            // alone; character state survives it.
            "plain" => {
                let top = self.top_mut();
                top.super_on = false;
                top.fs = DEFAULT_FS_HALF_POINTS;
            }
            "super" => self.top_mut().super_on = true,
            "nosupersub" | "sub" => self.top_mut().super_on = false,
            "fs" => {
                if let Some(v) = value {
                    self.top_mut().fs = v as f32;
                }
            }
            "uc" => self.top_mut().uc = value.unwrap_or(1).max(0) as usize,
            "u" => {
                let v = value.unwrap_or(0);
                let code = if v < 0 { v + 65536 } else { v } as u32;
                let c = char::from_u32(code).unwrap_or('\u{FFFD}');
                self.skip_unicode_fallback();
                self.text_char(c, start..self.pos);
            }
            "chftn" => {
                if !self.top().skip {
                    self.footnote_counter += 1;
                    self.flush_run();
                    // The auto-counter is the reference mark itself; its
                    // span is the control word so the inline notation can
                    // replace it directly.
                    self.runs.push(StyleRun {
                        text: self.footnote_counter.to_string(),
                        style: RunStyle::superscript(),
                        span: start..self.pos,
                        markup: Markup::RtfSuper,
                    });
                }
            }
            "tab" | "line" => self.text_char(' ', start..self.pos),
            _ => {}
        }
    }

    fn hex_escape(&mut self) -> Option<char> {
        let hi = hex_digit(*self.bytes.get(self.pos)?)?;
        let lo = hex_digit(*self.bytes.get(self.pos + 1)?)?;
        self.pos += 2;
        Some(cp1252(hi * 16 + lo))
    }

    fn skip_unicode_fallback(&mut self) {
        for _ in 0..self.top().uc {
            match self.bytes.get(self.pos) {
                Some(b'\\') if self.bytes.get(self.pos + 1) == Some(&b'\'') => self.pos += 4,
                Some(b'{') | Some(b'}') | None => break,
                Some(_) => self.pos += 1,
            }
        }
    }

    fn text_char(&mut self, c: char, span: Range<usize>) {
        let top = self.top();
        if top.skip {
            return;
        }
        let (super_on, fs) = (top.super_on, top.fs);
        match &mut self.cur {
            Some(cur) if cur.super_on == super_on && cur.fs == fs => {
                cur.text.push(c);
                cur.span.end = span.end;
            }
            _ => {
                self.flush_run();
                self.cur = Some(RunAccum {
                    text: c.to_string(),
                    super_on,
                    fs,
                    span,
                });
            }
        }
    }

    fn flush_run(&mut self) {
        let Some(cur) = self.cur.take() else {
            return;
        };
        self.runs.push(StyleRun {
            text: cur.text,
            style: RunStyle {
                is_superscript: cur.super_on,
                font_size_ratio: cur.fs / DEFAULT_FS_HALF_POINTS,
                baseline_offset: if cur.super_on { 0.33 } else { 0.0 },
            },
            span: cur.span,
            markup: if cur.super_on {
                Markup::RtfSuper
            } else {
                Markup::RtfText
            },
        });
    }

    fn end_paragraph(&mut self, end: usize) {
        self.flush_run();
        if self.runs.is_empty() {
            return;
        }
        let runs = std::mem::take(&mut self.runs);
        // The span starts at the first run so a deletion never swallows
        // leading formatting control words, and runs through the \par.
        let start = runs[0].span.start;
        self.blocks.push(Block {
            runs,
            region: Region::Body,
            buffer: 0,
            span: start..end,
            markup: Markup::RtfText,
            native_label: None,
        });
    }

    /// Consume a `{\footnote ...}` group whole: its plain text becomes a
    /// native definition block and its byte span covers the entire group
    /// so a deletion removes it cleanly. The label is anchored to the
    /// superscript reference mark the group follows.
    fn capture_footnote(&mut self, brace: usize) {
        let label = self
            .runs
            .last()
            .filter(|r| r.style.is_superscript)
            .and_then(|r| label_token(&r.text));
        let (text, end) = group_plain_text(self.bytes, brace);
        self.blocks.push(Block {
            runs: vec![StyleRun {
                text,
                style: RunStyle::baseline(),
                span: brace..end,
                markup: Markup::RtfGroup,
            }],
            region: Region::NativeObject,
            buffer: 0,
            span: brace..end,
            markup: Markup::RtfGroup,
            native_label: label,
        });
        self.pos = end;
    }
}

/// Peek the control word opening a group, without consuming anything.
/// Returns `*` for starred destinations.
fn peek_destination(bytes: &[u8], at: usize) -> Option<String> {
    if bytes.get(at) != Some(&b'\\') {
        return None;
    }
    if bytes.get(at + 1) == Some(&b'*') {
        return Some("*".to_string());
    }
    let mut end = at + 1;
    while bytes.get(end).is_some_and(|b| b.is_ascii_alphabetic()) {
        end += 1;
    }
    if end == at + 1 {
        return None;
    }
    Some(String::from_utf8_lossy(&bytes[at + 1..end]).into_owned())
}

fn read_control_word(bytes: &[u8], pos: &mut usize) -> (String, Option<i32>) {
    let start = *pos;
    while bytes.get(*pos).is_some_and(|b| b.is_ascii_alphabetic()) {
        *pos += 1;
    }
    let name = String::from_utf8_lossy(&bytes[start..*pos]).into_owned();

    let mut value = None;
    let num_start = *pos;
    if bytes.get(*pos) == Some(&b'-') {
        *pos += 1;
    }
    while bytes.get(*pos).is_some_and(|b| b.is_ascii_digit()) {
        *pos += 1;
    }
    if *pos > num_start {
        value = std::str::from_utf8(&bytes[num_start..*pos])
            .ok()
            .and_then(|s| s.parse::<i32>().ok());
    }
    // A single space after a control word is its delimiter.
    if bytes.get(*pos) == Some(&b' ') {
        *pos += 1;
    }
    (name, value)
}

/// Extract the plain text of a group starting at `brace`, returning the
/// text and the byte offset just past the closing brace. Nested skip
/// destinations contribute nothing; reference-mark echoes are dropped.
fn group_plain_text(bytes: &[u8], brace: usize) -> (String, usize) {
    let mut text = String::new();
    let mut pos = brace + 1;
    let mut depth = 1usize;
    let mut skip_above: Option<usize> = None;

    while pos < bytes.len() && depth > 0 {
        match bytes[pos] {
            b'{' => {
                if skip_above.is_none() {
                    if let Some(name) = peek_destination(bytes, pos + 1) {
                        if name == "*" || SKIP_DESTINATIONS.contains(&name.as_str()) {
                            skip_above = Some(depth);
                        }
                    }
                }
                depth += 1;
                pos += 1;
            }
            b'}' => {
                depth -= 1;
                pos += 1;
                if skip_above.is_some_and(|d| depth <= d) {
                    skip_above = None;
                }
            }
            b'\\' => {
                pos += 1;
                let Some(&b) = bytes.get(pos) else { break };
                match b {
                    b'\\' | b'{' | b'}' => {
                        pos += 1;
                        if skip_above.is_none() {
                            text.push(b as char);
                        }
                    }
                    b'\'' => {
                        pos += 1;
                        let hi = bytes.get(pos).copied().and_then(hex_digit);
                        let lo = bytes.get(pos + 1).copied().and_then(hex_digit);
                        pos = (pos + 2).min(bytes.len());
                        if let (Some(hi), Some(lo), None) = (hi, lo, skip_above) {
                            text.push(cp1252(hi * 16 + lo));
                        }
                    }
                    b'~' => {
                        pos += 1;
                        if skip_above.is_none() {
                            text.push(' ');
                        }
                    }
                    b'-' | b'_' | b'*' => pos += 1,
                    _ if b.is_ascii_alphabetic() => {
                        let (name, value) = read_control_word(bytes, &mut pos);
                        if skip_above.is_some() {
                            continue;
                        }
                        match name.as_str() {
                            "par" | "line" | "tab" => text.push(' '),
                            "u" => {
                                let v = value.unwrap_or(0);
                                let code = if v < 0 { v + 65536 } else { v } as u32;
                                text.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                                if matches!(bytes.get(pos), Some(b) if !matches!(b, b'\\' | b'{' | b'}')) {
                                    pos += 1;
                                }
                            }
                            _ => {}
                        }
                    }
                    _ => pos += 1,
                }
            }
            b'\r' | b'\n' => pos += 1,
            b => {
                pos += 1;
                if skip_above.is_none() {
                    text.push(cp1252(b));
                }
            }
        }
    }
    (text, pos)
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Windows-1252, the default RTF code page. The 0x80..0x9F row differs
/// from Latin-1 and carries the dagger marks footnotes lean on.
fn cp1252(b: u8) -> char {
    match b {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        _ => b as char,
    }
}

pub(crate) fn serialize(doc: &Document) -> Result<Vec<u8>, Error> {
    let Source::Rtf(src) = &doc.source else {
        return Err(Error::Serialization("document source is not RTF".into()));
    };
    if doc.edits.is_empty() {
        return Ok(src.bytes.clone());
    }

    let mut out = src.bytes.clone();
    let mut edits: Vec<&crate::model::Edit> = doc.edits.iter().collect();
    edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    for edit in edits {
        let replacement = match &edit.kind {
            EditKind::Delete => Vec::new(),
            EditKind::Replace(text) => match edit.markup {
                // Markers live under \super; the wrapper drops the
                // notation back to the baseline without touching the
                // surrounding group state.
                Markup::RtfSuper => format!("{{\\nosupersub {}}}", rtf_escape(text)).into_bytes(),
                _ => rtf_escape(text).into_bytes(),
            },
        };
        out.splice(edit.span.clone(), replacement);
    }
    Ok(out)
}

fn rtf_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x80 => out.push(c),
            c => {
                let code = c as u32;
                if code <= 0x7FFF {
                    out.push_str(&format!("\\u{}?", code));
                } else if code <= 0xFFFF {
                    out.push_str(&format!("\\u{}?", code as i32 - 65536));
                } else {
                    // Outside the BMP: RTF \u takes 16-bit values only.
                    out.push('?');
                }
            }
        }
    }
    out
}
