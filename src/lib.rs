//! Footnote inlining for PDF, DOCX, and RTF documents.
//!
//! Superscript footnote references are rewritten in place as
//! `[Footnote N: body]` and the footnote's stored definition is removed,
//! leaving a document that reads linearly. Each document is processed
//! independently; text the engine does not touch keeps its original
//! bytes.

mod detect;
mod docx;
mod error;
mod locate;
mod model;
mod pdf;
mod resolve;
mod rtf;
mod substitute;

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

pub use error::Error;
pub use model::{Format, Warning, WarningKind};

use model::Document;

/// The rewritten document plus everything that could not be resolved.
/// Warnings never abort a run; the affected footnotes are simply left
/// as they were.
#[derive(Debug)]
pub struct Processed {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Warning>,
}

/// Inline every resolvable footnote of a single document.
pub fn process(input: &[u8], format: Format) -> Result<Processed, Error> {
    let started = Instant::now();
    let doc = match format {
        Format::Pdf => pdf::load(input)?,
        Format::Docx => docx::load(input)?,
        Format::Rtf => rtf::load(input)?,
    };

    let markers = detect::detect(&doc);
    let (definitions, mut warnings) = locate::locate(&doc);

    // Superscripts inside located definition blocks are part of the
    // footnote text itself, not references to other footnotes.
    let storage: HashSet<usize> = definitions
        .iter()
        .flat_map(|d| d.blocks.iter().copied())
        .collect();
    let markers: Vec<_> = markers
        .into_iter()
        .filter(|m| !storage.contains(&m.block))
        .collect();

    let (resolved, mut resolve_warnings) = resolve::resolve(markers, definitions);
    warnings.append(&mut resolve_warnings);
    let inlined = resolved.len();

    let doc = substitute::substitute(doc, &resolved);
    let bytes = serialize(&doc)?;

    log::info!(
        "processed {} document: {} footnotes inlined, {} warnings, took {:?}",
        format.as_str(),
        inlined,
        warnings.len(),
        started.elapsed()
    );
    Ok(Processed { bytes, warnings })
}

fn serialize(doc: &Document) -> Result<Vec<u8>, Error> {
    match doc.format {
        Format::Pdf => pdf::serialize(doc),
        Format::Docx => docx::serialize(doc),
        Format::Rtf => rtf::serialize(doc),
    }
}

/// Process `input` into `output`, inferring the format from the input
/// file's extension.
pub fn process_path(input: &Path, output: &Path) -> Result<Vec<Warning>, Error> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            Error::UnsupportedFormat(format!("{} has no file extension", input.display()))
        })?;
    let format = Format::from_extension(ext)?;

    let bytes = std::fs::read(input).map_err(|e| decorate_io(e, input))?;
    let processed = process(&bytes, format)?;
    std::fs::write(output, &processed.bytes).map_err(|e| decorate_io(e, output))?;
    Ok(processed.warnings)
}

fn decorate_io(e: std::io::Error, path: &Path) -> Error {
    Error::Io(std::io::Error::new(
        e.kind(),
        format!("{}: {e}", path.display()),
    ))
}
