use std::ops::Range;

use crate::error::Error;
use crate::pdf::object::{Lexer, Object};

/// Approximate advance per glyph as a fraction of the font size, used
/// when no width tables are consulted.
pub(crate) const GLYPH_ADVANCE: f32 = 0.5;

/// One text-showing operator from a content stream, with the text state
/// in effect when it executed. `span` covers the operand and operator
/// bytes in the decoded stream, so the operation can be spliced out or
/// replaced in place.
#[derive(Debug, Clone)]
pub(crate) struct ShowOp {
    pub(crate) span: Range<usize>,
    pub(crate) text: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) font_size: f32,
    pub(crate) rise: f32,
    pub(crate) font: String,
    pub(crate) leading: f32,
}

#[derive(Default)]
struct TextState {
    x: f32,
    y: f32,
    line_x: f32,
    line_y: f32,
    scale: f32,
    size: f32,
    rise: f32,
    leading: f32,
    font: String,
}

/// Run the text-positioning subset of the content stream operator set
/// and collect every show operation with its resolved position. Only an
/// unrotated text matrix is modeled; graphics-state operators outside
/// BT..ET are ignored.
pub(crate) fn parse_content(content: &[u8]) -> Result<Vec<ShowOp>, Error> {
    let mut ops = Vec::new();
    let mut lexer = Lexer::new(content, 0);
    let mut operands: Vec<Object> = Vec::new();
    let mut operands_start: Option<usize> = None;
    let mut st = TextState {
        scale: 1.0,
        ..TextState::default()
    };

    loop {
        lexer.skip_whitespace();
        if lexer.pos >= content.len() {
            break;
        }
        let b = content[lexer.pos];
        if operand_start(b) {
            operands_start.get_or_insert(lexer.pos);
            operands.push(lexer.parse_object()?);
            continue;
        }

        let op_start = lexer.pos;
        while lexer.pos < content.len() && regular_char(content[lexer.pos]) {
            lexer.pos += 1;
        }
        if lexer.pos == op_start {
            // Stray delimiter; content is not well formed.
            return Err(Error::MalformedDocument(format!(
                "unexpected byte {b:#04x} in content stream at {op_start}"
            )));
        }
        let op = &content[op_start..lexer.pos];
        let span_start = operands_start.take().unwrap_or(op_start);
        let span = span_start..lexer.pos;

        match op {
            b"BT" => {
                st.x = 0.0;
                st.y = 0.0;
                st.line_x = 0.0;
                st.line_y = 0.0;
                st.scale = 1.0;
            }
            b"Tf" => {
                if let [Object::Name(name), size] = operands.as_slice() {
                    st.font = name.clone();
                    st.size = size.as_f64().unwrap_or(0.0) as f32;
                }
            }
            b"Ts" => {
                if let [rise] = operands.as_slice() {
                    st.rise = rise.as_f64().unwrap_or(0.0) as f32;
                }
            }
            b"TL" => {
                if let [l] = operands.as_slice() {
                    st.leading = l.as_f64().unwrap_or(0.0) as f32;
                }
            }
            b"Td" => {
                if let [tx, ty] = operands.as_slice() {
                    st.line_x += tx.as_f64().unwrap_or(0.0) as f32;
                    st.line_y += ty.as_f64().unwrap_or(0.0) as f32;
                    st.x = st.line_x;
                    st.y = st.line_y;
                }
            }
            b"TD" => {
                if let [tx, ty] = operands.as_slice() {
                    let ty = ty.as_f64().unwrap_or(0.0) as f32;
                    st.leading = -ty;
                    st.line_x += tx.as_f64().unwrap_or(0.0) as f32;
                    st.line_y += ty;
                    st.x = st.line_x;
                    st.y = st.line_y;
                }
            }
            b"Tm" => {
                if let [_, _, _, d, e, f] = operands.as_slice() {
                    let d = d.as_f64().unwrap_or(1.0) as f32;
                    st.scale = if d != 0.0 { d } else { 1.0 };
                    st.line_x = e.as_f64().unwrap_or(0.0) as f32;
                    st.line_y = f.as_f64().unwrap_or(0.0) as f32;
                    st.x = st.line_x;
                    st.y = st.line_y;
                }
            }
            b"T*" => next_line(&mut st),
            b"Tj" => {
                if let [Object::Str(s)] = operands.as_slice() {
                    show(&mut ops, &mut st, s, span);
                }
            }
            b"'" => {
                if let [Object::Str(s)] = operands.as_slice() {
                    next_line(&mut st);
                    show(&mut ops, &mut st, s, span);
                }
            }
            b"\"" => {
                if let [_, _, Object::Str(s)] = operands.as_slice() {
                    next_line(&mut st);
                    show(&mut ops, &mut st, s, span);
                }
            }
            b"TJ" => {
                if let [Object::Array(items)] = operands.as_slice() {
                    let mut text = String::new();
                    let (x, y) = (st.x, st.y + st.rise * st.scale);
                    for item in items {
                        match item {
                            Object::Str(s) => {
                                text.push_str(&latin1(s));
                                st.x += s.len() as f32
                                    * GLYPH_ADVANCE
                                    * st.size
                                    * st.scale;
                            }
                            other => {
                                if let Some(adj) = other.as_f64() {
                                    st.x -= (adj as f32 / 1000.0) * st.size * st.scale;
                                }
                            }
                        }
                    }
                    if !text.is_empty() {
                        ops.push(ShowOp {
                            span,
                            text,
                            x,
                            y,
                            font_size: st.size * st.scale,
                            rise: st.rise * st.scale,
                            font: st.font.clone(),
                            leading: st.leading * st.scale,
                        });
                    }
                }
            }
            b"BI" => skip_inline_image(content, &mut lexer.pos),
            _ => {}
        }
        operands.clear();
    }
    Ok(ops)
}

fn next_line(st: &mut TextState) {
    st.line_y -= st.leading;
    st.x = st.line_x;
    st.y = st.line_y;
}

fn show(ops: &mut Vec<ShowOp>, st: &mut TextState, raw: &[u8], span: Range<usize>) {
    let text = latin1(raw);
    if text.is_empty() {
        return;
    }
    ops.push(ShowOp {
        span,
        text,
        x: st.x,
        y: st.y + st.rise * st.scale,
        font_size: st.size * st.scale,
        rise: st.rise * st.scale,
        font: st.font.clone(),
        leading: st.leading * st.scale,
    });
    st.x += raw.len() as f32 * GLYPH_ADVANCE * st.size * st.scale;
}

/// Content strings in the simple fonts this handles map bytes straight
/// to Latin-1 code points.
fn latin1(raw: &[u8]) -> String {
    raw.iter().map(|&b| b as char).collect()
}

fn operand_start(b: u8) -> bool {
    matches!(b, b'(' | b'<' | b'[' | b'/' | b'+' | b'-' | b'.' | b'0'..=b'9')
}

fn regular_char(b: u8) -> bool {
    !matches!(
        b,
        b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' '
            | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Inline images carry raw binary data; scan past the terminating EI.
fn skip_inline_image(content: &[u8], pos: &mut usize) {
    let mut i = *pos;
    while i + 2 <= content.len() {
        if &content[i..i + 2] == b"EI"
            && content
                .get(i.wrapping_sub(1))
                .is_none_or(|b| b.is_ascii_whitespace())
            && content.get(i + 2).is_none_or(|b| b.is_ascii_whitespace())
        {
            *pos = i + 2;
            return;
        }
        i += 1;
    }
    *pos = content.len();
}
