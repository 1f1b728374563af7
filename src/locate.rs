use crate::detect::label_token;
use crate::model::{Document, FootnoteDefinition, Region, Warning, WarningKind};

/// Extract footnote definitions from every storage region of the
/// document. When native footnote objects coexist with heuristic
/// (page-bottom or endnote) candidates, the native set wins and each
/// heuristic definition is dropped with an ambiguous-source warning —
/// the two sources are never merged.
pub(crate) fn locate(doc: &Document) -> (Vec<FootnoteDefinition>, Vec<Warning>) {
    let native = native_definitions(doc);
    let mut page_bottom = page_bottom_definitions(doc);
    let mut endnotes = endnote_definitions(doc);
    let mut warnings = Vec::new();

    if !native.is_empty() && (!page_bottom.is_empty() || !endnotes.is_empty()) {
        for def in page_bottom.drain(..).chain(endnotes.drain(..)) {
            warnings.push(Warning::new(
                WarningKind::AmbiguousSource,
                def.label.as_deref(),
                format!(
                    "document has native footnote objects; ignoring heuristic definition{}",
                    def.label
                        .as_deref()
                        .map(|l| format!(" labeled {l}"))
                        .unwrap_or_default()
                ),
            ));
        }
    }

    let mut definitions = native;
    definitions.extend(page_bottom);
    definitions.extend(endnotes);
    definitions.sort_by_key(|d| d.blocks.first().copied().unwrap_or(usize::MAX));

    log::debug!("located {} footnote definitions", definitions.len());
    (definitions, warnings)
}

fn native_definitions(doc: &Document) -> Vec<FootnoteDefinition> {
    doc.blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.region == Region::NativeObject)
        .map(|(i, b)| {
            let raw = b.text();
            FootnoteDefinition {
                body: strip_label_echo(&raw, b.native_label.as_deref()),
                label: b.native_label.clone(),
                blocks: vec![i],
                region: Region::NativeObject,
            }
        })
        .collect()
}

/// Page-bottom candidates: blocks the loader placed below a page's
/// footnote boundary. A label-led block starts a definition; later
/// label-less blocks on the same page continue the previous body. A
/// label-less block before any definition on its page is a continuation
/// of a footnote that started on an earlier page.
fn page_bottom_definitions(doc: &Document) -> Vec<FootnoteDefinition> {
    let mut defs: Vec<FootnoteDefinition> = Vec::new();
    let mut orphans: Vec<(usize, String)> = Vec::new();
    let mut current_page = usize::MAX;
    let mut page_has_def = false;

    for (i, block) in doc.blocks.iter().enumerate() {
        if block.region != Region::PageBottom {
            continue;
        }
        if block.buffer != current_page {
            current_page = block.buffer;
            page_has_def = false;
        }
        let text = block.text();
        if let Some((label, lead_body)) = split_label_lead(&text) {
            defs.push(FootnoteDefinition {
                label: Some(label),
                body: lead_body,
                blocks: vec![i],
                region: Region::PageBottom,
            });
            page_has_def = true;
        } else if let (true, Some(last)) = (page_has_def, defs.last_mut()) {
            append_body(last, &text);
            last.blocks.push(i);
        } else if !text.trim().is_empty() {
            orphans.push((i, text));
        }
    }

    for (i, text) in orphans {
        if let Some(def) = defs.iter_mut().rev().find(|d| d.blocks[0] < i) {
            append_body(def, &text);
            def.blocks.push(i);
        }
    }
    defs
}

/// Endnote candidates: blocks after a trailing heading paragraph reading
/// "Footnotes", "Endnotes", or "Notes".
fn endnote_definitions(doc: &Document) -> Vec<FootnoteDefinition> {
    let heading = doc.blocks.iter().rposition(|b| {
        b.region == Region::Body && is_endnote_heading(&b.text())
    });
    let Some(heading) = heading else {
        return Vec::new();
    };

    let mut defs: Vec<FootnoteDefinition> = Vec::new();
    for (i, block) in doc.blocks.iter().enumerate().skip(heading + 1) {
        if block.region != Region::Body {
            continue;
        }
        let text = block.text();
        if let Some((label, lead_body)) = split_label_lead(&text) {
            defs.push(FootnoteDefinition {
                label: Some(label),
                body: lead_body,
                blocks: vec![i],
                region: Region::Endnotes,
            });
        } else if !text.trim().is_empty() {
            if let Some(last) = defs.last_mut() {
                append_body(last, &text);
                last.blocks.push(i);
            }
        }
    }
    defs
}

fn is_endnote_heading(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "footnotes" | "endnotes" | "notes"
    )
}

fn append_body(def: &mut FootnoteDefinition, text: &str) {
    let t = text.trim();
    if t.is_empty() {
        return;
    }
    if !def.body.is_empty() {
        def.body.push(' ');
    }
    def.body.push_str(t);
}

/// Split `1. Some note.` into label `1` and body `Some note.`. The lead
/// must be a recognized label token followed by a separator (`.`, `)`,
/// `:`, or whitespace); the separator is stripped from the body.
pub(crate) fn split_label_lead(text: &str) -> Option<(String, String)> {
    let t = text.trim_start();
    let sep = t.find(|c: char| c == '.' || c == ')' || c == ':' || c.is_whitespace())?;
    let (lead, rest) = t.split_at(sep);
    let label = label_token(lead)?;
    let mut body = rest;
    let mut chars = body.chars();
    if matches!(chars.next(), Some('.' | ')' | ':')) {
        body = chars.as_str();
    }
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    Some((label, body.to_string()))
}

/// Native footnote bodies often repeat their own label (`1 Body text`);
/// strip the echo so it doesn't appear twice in the inline notation.
fn strip_label_echo(text: &str, label: Option<&str>) -> String {
    let t = text.trim();
    if let Some(label) = label {
        if let Some(rest) = t.strip_prefix(label) {
            if rest.is_empty()
                || rest.starts_with(|c: char| c.is_whitespace() || matches!(c, '.' | ')' | ':'))
            {
                return rest
                    .trim_start_matches(['.', ')', ':'])
                    .trim_start()
                    .to_string();
            }
        }
    }
    t.to_string()
}
