use std::collections::HashSet;
use std::io::{Cursor, Read, Write};

use crate::detect::superscript_digit;
use crate::error::Error;
use crate::model::{
    Block, Document, EditKind, Format, Markup, Region, RunStyle, Source, StyleRun,
};

pub(super) const WML_NS: &str =
    "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Word's default body size in half-points, used when a run carries no
/// explicit size; ratios are relative to this.
const DEFAULT_SZ_HALF_POINTS: f32 = 22.0;

pub struct DocxSource {
    pub(crate) bytes: Vec<u8>,
    pub(crate) parts: Vec<DocxPart>,
}

pub(crate) struct DocxPart {
    pub(crate) name: String,
    pub(crate) text: String,
}

fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

fn is_wml(node: &roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

fn read_zip_text(zip: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<String> {
    let mut entry = zip.by_name(name).ok()?;
    let mut text = String::new();
    entry.read_to_string(&mut text).ok()?;
    Some(text)
}

pub(crate) fn load(input: &[u8]) -> Result<Document, Error> {
    let mut zip = zip::ZipArchive::new(Cursor::new(input))
        .map_err(|_| Error::MalformedDocument("file is not a ZIP archive".into()))?;

    let document_xml = read_zip_text(&mut zip, "word/document.xml").ok_or_else(|| {
        Error::MalformedDocument("missing word/document.xml (is this a DOCX file?)".into())
    })?;
    let footnotes_xml = read_zip_text(&mut zip, "word/footnotes.xml");

    let mut blocks = Vec::new();
    parse_document_part(&document_xml, 0, &mut blocks)?;
    if let Some(footnotes) = &footnotes_xml {
        parse_footnotes_part(footnotes, 1, &mut blocks)?;
    }

    let mut parts = vec![DocxPart {
        name: "word/document.xml".to_string(),
        text: document_xml,
    }];
    if let Some(footnotes) = footnotes_xml {
        parts.push(DocxPart {
            name: "word/footnotes.xml".to_string(),
            text: footnotes,
        });
    }

    log::debug!("docx: {} blocks across {} parts", blocks.len(), parts.len());
    Ok(Document {
        format: Format::Docx,
        blocks,
        source: Source::Docx(DocxSource {
            bytes: input.to_vec(),
            parts,
        }),
        edits: Vec::new(),
    })
}

fn parse_document_part(
    xml_text: &str,
    buffer: usize,
    blocks: &mut Vec<Block>,
) -> Result<(), Error> {
    let xml = roxmltree::Document::parse(xml_text)?;
    let root = xml.root_element();
    let body =
        wml(root, "body").ok_or_else(|| Error::MalformedDocument("missing w:body".into()))?;

    for para in body.descendants().filter(|n| is_wml(n, "p")) {
        let mut runs = Vec::new();
        for run_node in para.descendants().filter(|n| is_wml(n, "r")) {
            collect_runs(run_node, xml_text, &mut runs);
        }
        blocks.push(Block {
            runs,
            region: Region::Body,
            buffer,
            span: para.range(),
            markup: Markup::XmlRun,
            native_label: None,
        });
    }
    Ok(())
}

fn parse_footnotes_part(
    xml_text: &str,
    buffer: usize,
    blocks: &mut Vec<Block>,
) -> Result<(), Error> {
    let xml = roxmltree::Document::parse(xml_text)?;
    let root = xml.root_element();

    for footnote in root.children().filter(|n| is_wml(n, "footnote")) {
        // Separator and continuation-separator footnotes carry a type
        // attribute; they are layout furniture, not definitions.
        if footnote.attribute((WML_NS, "type")).is_some() {
            continue;
        }
        let Some(id) = footnote.attribute((WML_NS, "id")) else {
            continue;
        };
        let mut runs = Vec::new();
        let mut first_para = true;
        for para in footnote.descendants().filter(|n| is_wml(n, "p")) {
            if !first_para {
                // Paragraph boundary inside the body; the span is empty
                // so the writer never splices it.
                let at = para.range().start;
                runs.push(StyleRun {
                    text: " ".to_string(),
                    style: RunStyle::baseline(),
                    span: at..at,
                    markup: Markup::XmlText,
                });
            }
            first_para = false;
            for run_node in para.descendants().filter(|n| is_wml(n, "r")) {
                collect_runs(run_node, xml_text, &mut runs);
            }
        }
        blocks.push(Block {
            runs,
            region: Region::NativeObject,
            buffer,
            span: footnote.range(),
            markup: Markup::XmlRun,
            native_label: Some(id.to_string()),
        });
    }
    Ok(())
}

fn run_style(run_node: roxmltree::Node) -> RunStyle {
    let rpr = wml(run_node, "rPr");
    let superscript = rpr
        .and_then(|n| wml_attr(n, "vertAlign"))
        .map(|v| v == "superscript")
        .unwrap_or(false);
    let ratio = rpr
        .and_then(|n| wml_attr(n, "sz"))
        .and_then(|v| v.parse::<f32>().ok())
        .map(|half_points| half_points / DEFAULT_SZ_HALF_POINTS);

    if superscript {
        RunStyle {
            is_superscript: true,
            font_size_ratio: ratio.unwrap_or(0.58),
            baseline_offset: 0.33,
        }
    } else {
        RunStyle {
            is_superscript: false,
            font_size_ratio: ratio.unwrap_or(1.0),
            baseline_offset: 0.0,
        }
    }
}

fn collect_runs(run_node: roxmltree::Node, src: &str, runs: &mut Vec<StyleRun>) {
    // A native footnote reference makes the whole run the marker; its
    // id is the explicit label linking it to word/footnotes.xml.
    if let Some(fref) = wml(run_node, "footnoteReference") {
        if let Some(id) = fref.attribute((WML_NS, "id")) {
            runs.push(StyleRun {
                text: id.to_string(),
                style: RunStyle::superscript(),
                span: run_node.range(),
                markup: Markup::XmlRun,
            });
        }
        return;
    }

    let style = run_style(run_node);
    if style.is_superscript {
        let text: String = run_node
            .children()
            .filter(|n| is_wml(n, "t"))
            .flat_map(|t| t.children())
            .filter_map(|n| n.text())
            .collect();
        if !text.is_empty() {
            runs.push(StyleRun {
                text,
                style,
                span: run_node.range(),
                markup: Markup::XmlRun,
            });
        }
        return;
    }

    // Entity references split a <w:t> into several text nodes and shift
    // byte offsets; superscript-digit segments are only split out when
    // the source slice and the decoded text agree.
    for t in run_node.children().filter(|n| is_wml(n, "t")) {
        for text_node in t.children() {
            let Some(text) = text_node.text() else {
                continue;
            };
            let range = text_node.range();
            if src.get(range.clone()) == Some(text) {
                push_text_segments(text, range.start, style, runs);
            } else {
                runs.push(StyleRun {
                    text: text.to_string(),
                    style,
                    span: range,
                    markup: Markup::XmlText,
                });
            }
        }
    }
}

/// Split a text node into segments so that Unicode superscript digit
/// sequences (`¹`, `²³`) become their own superscript-styled runs with
/// exact byte spans — these carry footnote references in documents that
/// encode markers as characters rather than run properties.
fn push_text_segments(text: &str, start: usize, style: RunStyle, runs: &mut Vec<StyleRun>) {
    let mut seg_start = 0usize;
    let mut seg_super: Option<bool> = None;

    let mut flush = |from: usize, to: usize, superscript: bool, runs: &mut Vec<StyleRun>| {
        if from == to {
            return;
        }
        runs.push(StyleRun {
            text: text[from..to].to_string(),
            style: if superscript {
                RunStyle::superscript()
            } else {
                style
            },
            span: start + from..start + to,
            markup: Markup::XmlText,
        });
    };

    for (off, c) in text.char_indices() {
        let superscript = superscript_digit(c).is_some();
        match seg_super {
            None => seg_super = Some(superscript),
            Some(current) if current == superscript => {}
            Some(current) => {
                flush(seg_start, off, current, runs);
                seg_start = off;
                seg_super = Some(superscript);
            }
        }
    }
    if let Some(current) = seg_super {
        flush(seg_start, text.len(), current, runs);
    }
}

fn serr(e: impl std::fmt::Display) -> Error {
    Error::Serialization(e.to_string())
}

pub(crate) fn serialize(doc: &Document) -> Result<Vec<u8>, Error> {
    let Source::Docx(src) = &doc.source else {
        return Err(Error::Serialization("document source is not DOCX".into()));
    };
    if doc.edits.is_empty() {
        return Ok(src.bytes.clone());
    }

    let dirty: HashSet<usize> = doc.edits.iter().map(|e| e.buffer).collect();
    let mut parts: Vec<String> = src.parts.iter().map(|p| p.text.clone()).collect();
    for (bi, part_text) in parts.iter_mut().enumerate() {
        let mut edits: Vec<&crate::model::Edit> =
            doc.edits.iter().filter(|e| e.buffer == bi).collect();
        edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));
        for edit in edits {
            let replacement = match &edit.kind {
                EditKind::Delete => String::new(),
                EditKind::Replace(text) => match edit.markup {
                    Markup::XmlText => xml_escape(text),
                    _ => format!(
                        "<w:r><w:t xml:space=\"preserve\">{}</w:t></w:r>",
                        xml_escape(text)
                    ),
                },
            };
            part_text.replace_range(edit.span.clone(), &replacement);
        }
    }

    // Repack: rewritten parts re-entered, everything else copied raw so
    // untouched entries keep their original compressed bytes.
    let mut zip = zip::ZipArchive::new(Cursor::new(src.bytes.as_slice())).map_err(serr)?;
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for i in 0..zip.len() {
        let entry = zip.by_index_raw(i).map_err(serr)?;
        let name = entry.name().to_string();
        let edited = src
            .parts
            .iter()
            .position(|p| p.name == name)
            .filter(|bi| dirty.contains(bi));
        match edited {
            Some(bi) => {
                drop(entry);
                writer.start_file(name, options).map_err(serr)?;
                writer.write_all(parts[bi].as_bytes()).map_err(serr)?;
            }
            None => writer.raw_copy_file(entry).map_err(serr)?,
        }
    }

    let cursor = writer.finish().map_err(serr)?;
    Ok(cursor.into_inner())
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
