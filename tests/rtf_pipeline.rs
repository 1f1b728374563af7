mod common;

use footnoted::{Format, process};

fn out_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn document_without_footnotes_is_byte_identical() {
    let input = common::rtf_doc("Just an ordinary paragraph.\\par ");
    let out = process(&input, Format::Rtf).expect("process");
    assert_eq!(out.bytes, input);
    assert!(out.warnings.is_empty());
}

#[test]
fn native_footnote_group_is_inlined_and_removed() {
    let input = common::rtf_doc(
        "Alpha\\chftn{\\footnote \\chftn  The native body.} and beta.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let text = out_text(&out.bytes);
    assert!(text.contains("Alpha{\\nosupersub [Footnote 1: The native body.]} and beta."));
    assert!(!text.contains("\\footnote"));
    assert!(!text.contains("\\chftn"));
}

#[test]
fn superscript_marker_resolves_against_endnote_section() {
    let input = common::rtf_doc(
        "The claim{\\super 1} stands.\\par Notes\\par 1. Supporting evidence.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let text = out_text(&out.bytes);
    assert!(text.contains("{\\super {\\nosupersub [Footnote 1: Supporting evidence.]}} stands."));
    assert!(text.contains("Notes\\par "));
    assert!(!text.contains("1. Supporting evidence."));
}

#[test]
fn letter_and_roman_labels_resolve() {
    let input = common::rtf_doc(
        "First{\\super a} then{\\super iv} last.\\par Notes\\par \
         a. Letter note.\\par iv. Roman note.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let text = out_text(&out.bytes);
    assert!(text.contains("[Footnote a: Letter note.]"));
    assert!(text.contains("[Footnote iv: Roman note.]"));
    assert!(!text.contains("a. Letter note."));
    assert!(!text.contains("iv. Roman note."));
}

#[test]
fn dagger_symbol_label_resolves() {
    let input = common::rtf_doc(
        "A caveat{\\super \\'86} applies.\\par Notes\\par \\'86 Rarely in practice.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let text = out_text(&out.bytes);
    assert!(text.contains("[Footnote \\u8224?: Rarely in practice.]"));
    assert!(!text.contains("Rarely in practice.\\par }"));
}

#[test]
fn empty_document_passes_through() {
    let input = common::rtf_doc("");
    let out = process(&input, Format::Rtf).expect("process");
    assert_eq!(out.bytes, input);
    assert!(out.warnings.is_empty());
}

#[test]
fn markers_in_separate_paragraphs_inline_in_order() {
    let input = common::rtf_doc(
        "First claim{\\super 1} here.\\par Second claim{\\super 2} there.\\par \
         Notes\\par 1. First.\\par 2. Second.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let text = out_text(&out.bytes);
    let first = text.find("[Footnote 1: First.]").expect("first inlined");
    let second = text.find("[Footnote 2: Second.]").expect("second inlined");
    assert!(first < second);
    assert!(!text.contains("1. First."));
    assert!(!text.contains("2. Second."));
}

#[test]
fn pard_does_not_clear_superscript_state() {
    let input = common::rtf_doc(
        "A claim{\\super \\pard 1} stands.\\par Notes\\par 1. Supporting note.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let text = out_text(&out.bytes);
    assert!(text.contains("[Footnote 1: Supporting note.]"));
    assert!(!text.contains("1. Supporting note."));
}

#[test]
fn ordinary_superscript_text_is_not_a_marker() {
    let input = common::rtf_doc("The area is 4 km{\\super 2x} wide.\\par ");
    let out = process(&input, Format::Rtf).expect("process");
    assert_eq!(out.bytes, input);
    assert!(out.warnings.is_empty());
}

#[test]
fn second_pass_is_a_no_op() {
    let input = common::rtf_doc(
        "Alpha\\chftn{\\footnote \\chftn  The native body.} and beta.\\par ",
    );
    let first = process(&input, Format::Rtf).expect("first pass");
    let second = process(&first.bytes, Format::Rtf).expect("second pass");
    assert_eq!(second.bytes, first.bytes);
    assert!(second.warnings.is_empty());
}

#[test]
fn rejects_non_rtf_input() {
    let err = process(b"plain text, not rtf", Format::Rtf).unwrap_err();
    assert!(err.to_string().contains("malformed"));
}
