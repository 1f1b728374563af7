mod content;
mod object;

use std::collections::HashMap;

use crate::error::Error;
use crate::locate::split_label_lead;
use crate::model::{
    Block, Document, EditKind, Format, Markup, Region, RunStyle, Source, StyleRun,
};
use content::{GLYPH_ADVANCE, ShowOp};
use object::{Object, ObjectStore};
use pdf_writer::{Chunk, Filter, Ref};

/// Lines whose baselines differ by less than this are treated as one
/// visual line.
const LINE_TOLERANCE: f32 = 3.5;

/// Footnote text never starts above this fraction of the page height.
const BOUNDARY_CEILING: f32 = 0.6;

/// Page margin assumed when wrapping inline notation text.
const WRAP_MARGIN: f32 = 54.0;

pub struct PdfSource {
    pub(crate) bytes: Vec<u8>,
    pub(crate) pages: Vec<PageSource>,
    pub(crate) startxref: usize,
    pub(crate) size: u32,
    pub(crate) root: u32,
    pub(crate) info: Option<u32>,
}

pub(crate) struct PageSource {
    pub(crate) content_refs: Vec<(u32, u16)>,
    pub(crate) content: Vec<u8>,
    pub(crate) ops: Vec<ShowOp>,
    pub(crate) width: f32,
}

pub(crate) fn load(input: &[u8]) -> Result<Document, Error> {
    if !input.starts_with(b"%PDF-") {
        return Err(Error::MalformedDocument("missing %PDF header".into()));
    }
    let store = object::parse_xref(input)?;
    let root = store
        .trailer
        .get("Root")
        .and_then(Object::as_ref_num)
        .ok_or_else(|| Error::MalformedDocument("trailer has no /Root".into()))?;
    let info = store.trailer.get("Info").and_then(Object::as_ref_num);

    let catalog = store.get(input, root)?;
    let pages_ref = catalog
        .as_dict()
        .and_then(|d| d.get("Pages"))
        .and_then(Object::as_ref_num)
        .ok_or_else(|| Error::MalformedDocument("catalog has no /Pages".into()))?;

    let mut page_nodes = Vec::new();
    collect_pages(input, &store, pages_ref, None, &mut page_nodes, 0)?;

    let mut pages = Vec::new();
    let mut blocks = Vec::new();
    for (page_index, (dict, media_box)) in page_nodes.into_iter().enumerate() {
        let (width, height) = media_box.unwrap_or((612.0, 792.0));
        let content_refs: Vec<(u32, u16)> = content_refs(input, &store, &dict)?
            .into_iter()
            .map(|num| (num, store.generation(num)))
            .collect();
        let mut content = Vec::new();
        for (i, &(num, _)) in content_refs.iter().enumerate() {
            if i > 0 {
                content.push(b'\n');
            }
            content.extend_from_slice(&store.stream(input, num)?);
        }
        let ops = content::parse_content(&content)?;
        page_blocks(&ops, page_index, height, &mut blocks);
        pages.push(PageSource {
            content_refs,
            content,
            ops,
            width,
        });
    }

    log::debug!("pdf: {} pages, {} text lines", pages.len(), blocks.len());
    Ok(Document {
        format: Format::Pdf,
        blocks,
        source: Source::Pdf(PdfSource {
            bytes: input.to_vec(),
            pages,
            startxref: store.startxref,
            size: store.size,
            root,
            info,
        }),
        edits: Vec::new(),
    })
}

type PageNode = (HashMap<String, Object>, Option<(f32, f32)>);

fn collect_pages(
    bytes: &[u8],
    store: &ObjectStore,
    node_ref: u32,
    inherited_box: Option<(f32, f32)>,
    out: &mut Vec<PageNode>,
    depth: usize,
) -> Result<(), Error> {
    if depth > 64 {
        return Err(Error::MalformedDocument("page tree too deep".into()));
    }
    let node = store.get(bytes, node_ref)?;
    let dict = node
        .as_dict()
        .ok_or_else(|| Error::MalformedDocument("page tree node is not a dictionary".into()))?;

    let media_box = match dict.get("MediaBox") {
        Some(obj) => parse_media_box(&store.resolve(bytes, obj)?).or(inherited_box),
        None => inherited_box,
    };

    match dict.get("Type").and_then(Object::as_name) {
        Some("Pages") => {
            let kids = store.resolve(bytes, dict.get("Kids").unwrap_or(&Object::Null))?;
            let kids = kids
                .as_array()
                .ok_or_else(|| Error::MalformedDocument("/Kids is not an array".into()))?
                .to_vec();
            for kid in kids {
                let num = kid.as_ref_num().ok_or_else(|| {
                    Error::MalformedDocument("/Kids entry is not a reference".into())
                })?;
                collect_pages(bytes, store, num, media_box, out, depth + 1)?;
            }
        }
        Some("Page") => out.push((dict.clone(), media_box)),
        _ => {
            return Err(Error::MalformedDocument(
                "page tree node has no /Type".into(),
            ));
        }
    }
    Ok(())
}

fn parse_media_box(obj: &Object) -> Option<(f32, f32)> {
    let a = obj.as_array()?;
    if a.len() != 4 {
        return None;
    }
    let vals: Vec<f32> = a.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect();
    if vals.len() != 4 {
        return None;
    }
    Some((vals[2] - vals[0], vals[3] - vals[1]))
}

fn content_refs(
    bytes: &[u8],
    store: &ObjectStore,
    page: &HashMap<String, Object>,
) -> Result<Vec<u32>, Error> {
    let Some(contents) = page.get("Contents") else {
        return Ok(Vec::new());
    };
    match contents {
        Object::Ref(num) => {
            // A single ref may point at a stream or at an array of refs.
            match store.get(bytes, *num)? {
                Object::Array(items) => items
                    .iter()
                    .map(|i| {
                        i.as_ref_num().ok_or_else(|| {
                            Error::MalformedDocument("/Contents entry is not a reference".into())
                        })
                    })
                    .collect(),
                Object::Stream { .. } => Ok(vec![*num]),
                _ => Err(Error::MalformedDocument("/Contents is not a stream".into())),
            }
        }
        Object::Array(items) => items
            .iter()
            .map(|i| {
                i.as_ref_num().ok_or_else(|| {
                    Error::MalformedDocument("/Contents entry is not a reference".into())
                })
            })
            .collect(),
        _ => Err(Error::MalformedDocument("/Contents is not a reference".into())),
    }
}

struct Line {
    ops: Vec<usize>,
    baseline: f32,
    size: f32,
}

fn baseline_of(op: &ShowOp) -> f32 {
    op.y - op.rise
}

/// Group a page's show operations into visual lines, run the footnote
/// boundary heuristic, and emit one block per line.
fn page_blocks(ops: &[ShowOp], page_index: usize, height: f32, blocks: &mut Vec<Block>) {
    let mut order: Vec<usize> = (0..ops.len()).collect();
    order.sort_by(|&a, &b| {
        baseline_of(&ops[b])
            .partial_cmp(&baseline_of(&ops[a]))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                ops[a]
                    .x
                    .partial_cmp(&ops[b].x)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });

    let mut lines: Vec<Line> = Vec::new();
    for i in order {
        let y = baseline_of(&ops[i]);
        match lines.last_mut() {
            Some(line) if (line.baseline - y).abs() <= LINE_TOLERANCE => {
                line.ops.push(i);
                line.size = line.size.max(ops[i].font_size);
            }
            _ => lines.push(Line {
                ops: vec![i],
                baseline: y,
                size: ops[i].font_size,
            }),
        }
    }
    for line in &mut lines {
        line.ops
            .sort_by(|&a, &b| ops[a].x.partial_cmp(&ops[b].x).unwrap_or(std::cmp::Ordering::Equal));
    }

    let boundary = footnote_boundary(ops, &lines, height);

    for line in &lines {
        let region = match boundary {
            Some(b) if line.baseline <= b => Region::PageBottom,
            _ => Region::Body,
        };
        let base_y = line
            .ops
            .iter()
            .map(|&i| ops[i].y)
            .fold(f32::INFINITY, f32::min);

        let mut runs = Vec::new();
        let mut prev_end: Option<f32> = None;
        for &i in &line.ops {
            let op = &ops[i];
            // Positioning gaps between show ops stand in for spaces the
            // stream never encodes.
            if let Some(end) = prev_end {
                if op.x - end > 1.0 {
                    let at = op.span.start;
                    runs.push(StyleRun {
                        text: " ".to_string(),
                        style: RunStyle::baseline(),
                        span: at..at,
                        markup: Markup::PdfOp,
                    });
                }
            }
            prev_end = Some(op.x + op.text.chars().count() as f32 * GLYPH_ADVANCE * op.font_size);

            let raised = op.y - base_y;
            let superscript =
                op.rise > 0.5 || (raised > 0.5 && op.font_size < 0.75 * line.size);
            runs.push(StyleRun {
                text: op.text.clone(),
                style: RunStyle {
                    is_superscript: superscript,
                    font_size_ratio: if line.size > 0.0 {
                        op.font_size / line.size
                    } else {
                        1.0
                    },
                    baseline_offset: if line.size > 0.0 { raised / line.size } else { 0.0 },
                },
                span: op.span.clone(),
                markup: Markup::PdfOp,
            });
        }
        if runs.is_empty() {
            continue;
        }
        let start = runs.iter().map(|r| r.span.start).min().unwrap_or(0);
        let end = runs.iter().map(|r| r.span.end).max().unwrap_or(0);
        blocks.push(Block {
            runs,
            region,
            buffer: page_index,
            span: start..end,
            markup: Markup::PdfOp,
            native_label: None,
        });
    }
}

/// Find the y coordinate separating body text from the page's footnote
/// area, if the page has one. Label-led small-type lines in the lower
/// part of the page anchor the boundary; failing that, a cluster of
/// clearly smaller type does. No signal means no footnote area.
fn footnote_boundary(ops: &[ShowOp], lines: &[Line], height: f32) -> Option<f32> {
    let ceiling = BOUNDARY_CEILING * height;
    let body_size = dominant_size(lines)?;

    let mut anchor: Option<f32> = None;
    for line in lines {
        if line.baseline >= ceiling || line.size > body_size {
            continue;
        }
        let text: String = line.ops.iter().map(|&i| ops[i].text.as_str()).collect();
        if split_label_lead(&text).is_some() {
            anchor = Some(anchor.map_or(line.baseline, |a: f32| a.max(line.baseline)));
        }
    }
    if let Some(top) = anchor {
        return Some((top + 2.0).min(ceiling));
    }

    let mut small_top: Option<f32> = None;
    for line in lines {
        if line.baseline < ceiling && line.size < 0.75 * body_size {
            small_top = Some(small_top.map_or(line.baseline, |a: f32| a.max(line.baseline)));
        }
    }
    small_top.map(|top| (top + 2.0).min(ceiling))
}

/// The most common line font size on the page.
fn dominant_size(lines: &[Line]) -> Option<f32> {
    let mut counts: Vec<(f32, usize)> = Vec::new();
    for line in lines {
        match counts.iter_mut().find(|(s, _)| (*s - line.size).abs() < 0.1) {
            Some((_, n)) => *n += 1,
            None => counts.push((line.size, 1)),
        }
    }
    counts
        .into_iter()
        .max_by_key(|&(_, n)| n)
        .map(|(s, _)| s)
}

pub(crate) fn serialize(doc: &Document) -> Result<Vec<u8>, Error> {
    let Source::Pdf(src) = &doc.source else {
        return Err(Error::Serialization("document source is not PDF".into()));
    };
    if doc.edits.is_empty() {
        return Ok(src.bytes.clone());
    }

    let mut rewritten: Vec<(usize, Vec<u8>)> = Vec::new();
    for (page_index, page) in src.pages.iter().enumerate() {
        let mut edits: Vec<&crate::model::Edit> = doc
            .edits
            .iter()
            .filter(|e| e.buffer == page_index && !e.span.is_empty())
            .collect();
        if edits.is_empty() {
            continue;
        }
        edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));

        let mut content = page.content.clone();
        for edit in edits {
            let replacement = match &edit.kind {
                EditKind::Delete => Vec::new(),
                EditKind::Replace(text) => {
                    let op = page
                        .ops
                        .iter()
                        .find(|o| o.span == edit.span)
                        .ok_or_else(|| {
                            Error::Serialization("edit span does not match a text operation".into())
                        })?;
                    inline_ops(op, text, page)
                }
            };
            content.splice(edit.span.clone(), replacement);
        }
        rewritten.push((page_index, content));
    }

    // Incremental update: the original file stays byte-for-byte intact
    // and replacement content streams are appended under their old
    // object numbers, followed by a new xref section chaining to the
    // previous one.
    let mut out = src.bytes.clone();
    if out.last() != Some(&b'\n') {
        out.push(b'\n');
    }

    let mut entries: Vec<(u32, u16, usize)> = Vec::new();
    for (page_index, new_content) in &rewritten {
        let page = &src.pages[*page_index];
        for (i, &(num, generation)) in page.content_refs.iter().enumerate() {
            let data = if i == 0 {
                miniz_oxide::deflate::compress_to_vec_zlib(new_content, 6)
            } else {
                // Extra streams collapse to nothing; the first carries
                // the whole page.
                miniz_oxide::deflate::compress_to_vec_zlib(&[], 6)
            };
            entries.push((num, generation, out.len()));
            if generation == 0 {
                let mut chunk = Chunk::new();
                chunk
                    .stream(Ref::new(num as i32), &data)
                    .filter(Filter::FlateDecode);
                out.extend_from_slice(chunk.as_bytes());
            } else {
                // pdf_writer refs are always generation zero; objects
                // replacing a reused number are written by hand so the
                // header matches the xref entry.
                out.extend_from_slice(
                    format!(
                        "{num} {generation} obj\n<< /Length {} /Filter /FlateDecode >>\nstream\n",
                        data.len()
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(&data);
                out.extend_from_slice(b"\nendstream\nendobj\n");
            }
        }
    }

    entries.sort_by_key(|&(num, _, _)| num);
    let xref_pos = out.len();
    out.extend_from_slice(b"xref\n");
    let mut i = 0;
    while i < entries.len() {
        let mut j = i + 1;
        while j < entries.len() && entries[j].0 == entries[j - 1].0 + 1 {
            j += 1;
        }
        out.extend_from_slice(format!("{} {}\n", entries[i].0, j - i).as_bytes());
        for &(_, generation, offset) in &entries[i..j] {
            out.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes());
        }
        i = j;
    }
    out.extend_from_slice(b"trailer\n");
    let mut trailer = format!("<< /Size {} /Root {} 0 R", src.size, src.root);
    if let Some(info) = src.info {
        trailer.push_str(&format!(" /Info {info} 0 R"));
    }
    trailer.push_str(&format!(" /Prev {} >>\n", src.startxref));
    out.extend_from_slice(trailer.as_bytes());
    out.extend_from_slice(format!("startxref\n{xref_pos}\n%%EOF\n").as_bytes());
    Ok(out)
}

/// Build the operator sequence that replaces a marker's show operation
/// with the inline notation at body size and baseline. Long notations
/// wrap at an assumed page margin; the text state and line matrix are
/// restored afterwards so the rest of the stream is unaffected.
fn inline_ops(op: &ShowOp, text: &str, page: &PageSource) -> Vec<u8> {
    let body_size = page
        .ops
        .iter()
        .filter(|o| (baseline_of(o) - baseline_of(op)).abs() <= LINE_TOLERANCE)
        .map(|o| o.font_size)
        .fold(op.font_size, f32::max);
    let leading = if op.leading > 0.0 {
        op.leading
    } else {
        body_size * 1.2
    };
    let char_w = GLYPH_ADVANCE * body_size;
    let first_width = (page.width - WRAP_MARGIN - op.x).max(char_w);
    let cont_width = (page.width - 2.0 * WRAP_MARGIN).max(char_w);

    let wrapped = wrap(text, (first_width / char_w) as usize, (cont_width / char_w) as usize);

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(format!("0 Ts /{} {} Tf ", op.font, fmt(body_size)).as_bytes());
    for (i, line) in wrapped.iter().enumerate() {
        if i > 0 {
            buf.extend_from_slice(format!("0 {} Td ", fmt(-leading)).as_bytes());
        }
        buf.push(b'(');
        pdf_escape(line, &mut buf);
        buf.extend_from_slice(b") Tj ");
    }
    let extra = wrapped.len().saturating_sub(1);
    if extra > 0 {
        buf.extend_from_slice(format!("0 {} Td ", fmt(leading * extra as f32)).as_bytes());
    }
    buf.extend_from_slice(
        format!("/{} {} Tf {} Ts", op.font, fmt(op.font_size), fmt(op.rise)).as_bytes(),
    );
    buf
}

fn wrap(text: &str, first: usize, cont: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut limit = first.max(1);
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if !current.is_empty() && needed > limit {
            lines.push(std::mem::take(&mut current));
            limit = cont.max(1);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Escape and encode notation text into a literal string. Content
/// strings map bytes straight to code points, so every char at or below
/// 0xFF is written as its single byte, never as UTF-8.
fn pdf_escape(text: &str, out: &mut Vec<u8>) {
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            c if (c as u32) < 0x100 => out.push(c as u32 as u8),
            // Outside Latin-1; simple fonts cannot encode it.
            _ => out.push(b'?'),
        }
    }
}

fn fmt(v: f32) -> String {
    if (v - v.round()).abs() < 0.001 {
        format!("{}", v.round() as i64)
    } else {
        format!("{v:.2}")
    }
}
