use std::collections::{HashMap, HashSet};

use crate::model::{
    Document, Edit, EditKind, Format, ResolvedFootnote, RunStyle, StyleRun,
};

/// Replace each resolved marker run with the literal inline notation and
/// drop the inlined definitions from their storage regions. Produces a
/// new block sequence plus the byte-level edits the writer applies;
/// untouched blocks and runs are carried over unchanged, preserving
/// their relative order. With nothing resolved the document passes
/// through untouched (all-or-nothing).
pub(crate) fn substitute(mut doc: Document, resolved: &[ResolvedFootnote]) -> Document {
    if resolved.is_empty() {
        return doc;
    }

    let mut edits: Vec<Edit> = Vec::new();
    let mut removed: HashSet<usize> = HashSet::new();
    let mut replacements: HashMap<(usize, usize), String> = HashMap::new();

    for r in resolved {
        removed.extend(r.definition.blocks.iter().copied());
        let notation = inline_notation(&r.display_label, &r.definition.body);
        replacements.insert((r.marker.block, r.marker.run), notation);
    }

    for r in resolved {
        let block = &doc.blocks[r.marker.block];
        let run = &block.runs[r.marker.run];
        edits.push(Edit {
            buffer: block.buffer,
            span: run.span.clone(),
            markup: run.markup,
            kind: EditKind::Replace(replacements[&(r.marker.block, r.marker.run)].clone()),
        });
    }

    let mut removed_sorted: Vec<usize> = removed.iter().copied().collect();
    removed_sorted.sort_unstable();
    for &bi in &removed_sorted {
        let block = &doc.blocks[bi];
        if doc.format == Format::Pdf {
            // Deleting a whole page-bottom line span would take its
            // positioning operators with it; cut the show operators only.
            for run in &block.runs {
                edits.push(Edit {
                    buffer: block.buffer,
                    span: run.span.clone(),
                    markup: run.markup,
                    kind: EditKind::Delete,
                });
            }
        } else {
            edits.push(Edit {
                buffer: block.buffer,
                span: block.span.clone(),
                markup: block.markup,
                kind: EditKind::Delete,
            });
        }
    }

    let old_blocks = std::mem::take(&mut doc.blocks);
    let mut blocks = Vec::with_capacity(old_blocks.len() - removed.len());
    for (bi, mut block) in old_blocks.into_iter().enumerate() {
        if removed.contains(&bi) {
            continue;
        }
        for (ri, run) in block.runs.iter_mut().enumerate() {
            if let Some(text) = replacements.get(&(bi, ri)) {
                // The inline note reads as normal flowing text: it takes
                // the surrounding baseline style, not the marker's.
                *run = StyleRun {
                    text: text.clone(),
                    style: RunStyle::baseline(),
                    span: run.span.clone(),
                    markup: run.markup,
                };
            }
        }
        blocks.push(block);
    }

    log::info!(
        "inlined {} footnotes, removed {} storage blocks",
        resolved.len(),
        removed_sorted.len()
    );
    doc.blocks = blocks;
    doc.edits = edits;
    doc
}

fn inline_notation(label: &str, body: &str) -> String {
    format!("[Footnote {label}: {}]", scrub(body))
}

/// Control characters would corrupt the host markup when spliced back in.
fn scrub(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
