use std::ops::Range;

use crate::error::Error;

/// The three supported document profiles. A closed set: adapter selection
/// happens once, by this hint, never by sniffing content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Fixed page layout (classic cross-reference table subset).
    Pdf,
    /// Flow / XML markup (WordprocessingML in a ZIP container).
    Docx,
    /// Legacy markup-tagged text.
    Rtf,
}

impl Format {
    pub fn from_extension(ext: &str) -> Result<Format, Error> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Format::Pdf),
            "docx" => Ok(Format::Docx),
            "rtf" => Ok(Format::Rtf),
            other => Err(Error::UnsupportedFormat(format!(
                "unrecognized extension: .{other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Rtf => "rtf",
        }
    }
}

/// Where a block lives relative to footnote storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    Body,
    /// Below a page's detected footnote boundary (fixed-layout formats).
    PageBottom,
    /// Inside a trailing notes section recognized by its heading.
    Endnotes,
    /// A format-native footnote object (DOCX footnotes part, RTF
    /// `\footnote` destination). Highest-trust source.
    NativeObject,
}

/// What kind of markup a byte span points at, so the writer knows how to
/// splice a replacement. Stages between loader and writer never interpret
/// this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Markup {
    /// A whole `<w:r>`/`<w:p>`/`<w:footnote>` element in a DOCX part.
    XmlRun,
    /// Character data inside a `<w:t>` text node.
    XmlText,
    /// Plain RTF text in baseline state.
    RtfText,
    /// RTF text under `\super`.
    RtfSuper,
    /// A brace-delimited RTF group (footnote destination).
    RtfGroup,
    /// A text-showing operator in a PDF content stream.
    PdfOp,
}

/// Style attributes of a run, computed once at load time by each adapter.
/// Downstream stages read these and never inspect format-native objects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunStyle {
    pub is_superscript: bool,
    /// Font size relative to the dominant body size (1.0 = body).
    pub font_size_ratio: f32,
    /// Baseline raise as a fraction of the body size (0.0 = baseline).
    pub baseline_offset: f32,
}

impl RunStyle {
    pub fn baseline() -> Self {
        RunStyle {
            is_superscript: false,
            font_size_ratio: 1.0,
            baseline_offset: 0.0,
        }
    }

    pub fn superscript() -> Self {
        RunStyle {
            is_superscript: true,
            font_size_ratio: 0.58,
            baseline_offset: 0.33,
        }
    }
}

/// A contiguous span of text with uniform style. The minimal unit the
/// engine reads or rewrites. `span` is the byte range in the owning
/// adapter buffer that a replacement must splice over.
#[derive(Clone, Debug)]
pub struct StyleRun {
    pub text: String,
    pub style: RunStyle,
    pub span: Range<usize>,
    pub markup: Markup,
}

/// An ordered sequence of runs plus the positional tag distinguishing
/// body content from footnote storage. `buffer` names the adapter buffer
/// the spans index into (page index for PDF, part index for DOCX).
#[derive(Clone, Debug)]
pub struct Block {
    pub runs: Vec<StyleRun>,
    pub region: Region,
    pub buffer: usize,
    pub span: Range<usize>,
    pub markup: Markup,
    /// Explicit label carried by a native footnote object.
    pub native_label: Option<String>,
}

impl Block {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A superscript run recognized as a footnote reference.
#[derive(Clone, Debug)]
pub struct FootnoteMarker {
    pub label: Option<String>,
    pub block: usize,
    pub run: usize,
}

/// A footnote body extracted from a storage region. `blocks` are the
/// indices of the storage blocks to remove once the body is inlined.
#[derive(Clone, Debug)]
pub struct FootnoteDefinition {
    pub label: Option<String>,
    pub body: String,
    pub blocks: Vec<usize>,
    pub region: Region,
}

/// A marker paired with its definition. At most one marker resolves to a
/// given definition. `display_label` is the marker's label, or its
/// 1-based order among unlabeled pairs.
#[derive(Clone, Debug)]
pub struct ResolvedFootnote {
    pub marker: FootnoteMarker,
    pub definition: FootnoteDefinition,
    pub display_label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarningKind {
    UnresolvedReference,
    OrphanDefinition,
    CountMismatch,
    DuplicateLabel,
    AmbiguousSource,
}

/// A non-fatal condition. The affected marker or definition is left
/// unmodified in the output rather than guessed at.
#[derive(Clone, Debug)]
pub struct Warning {
    pub kind: WarningKind,
    pub label: Option<String>,
    pub message: String,
}

impl Warning {
    pub(crate) fn new(kind: WarningKind, label: Option<&str>, message: String) -> Self {
        Warning {
            kind,
            label: label.map(str::to_string),
            message,
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A pending byte-level change produced by the substitution engine and
/// consumed by the writer. Spans never overlap.
#[derive(Clone, Debug)]
pub struct Edit {
    pub buffer: usize,
    pub span: Range<usize>,
    pub markup: Markup,
    pub kind: EditKind,
}

#[derive(Clone, Debug)]
pub enum EditKind {
    /// Splice this plain text (the writer applies format-native escaping).
    Replace(String),
    Delete,
}

/// Adapter side-channel: original bytes plus whatever decoded buffers the
/// writer needs for byte-stable re-serialization.
pub enum Source {
    Docx(crate::docx::DocxSource),
    Pdf(crate::pdf::PdfSource),
    Rtf(crate::rtf::RtfSource),
}

/// The uniform in-memory document model. Immutable once loaded except
/// through the substitution engine, which builds a new block sequence and
/// queues edits rather than rewriting runs in place.
pub struct Document {
    pub format: Format,
    pub blocks: Vec<Block>,
    pub source: Source,
    pub edits: Vec<Edit>,
}
