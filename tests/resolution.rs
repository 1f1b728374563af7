mod common;

use footnoted::{Format, WarningKind, process};

fn kinds(warnings: &[footnoted::Warning]) -> Vec<WarningKind> {
    warnings.iter().map(|w| w.kind).collect()
}

#[test]
fn unresolved_reference_is_left_in_place() {
    let input = common::rtf_doc("A dangling claim{\\super 2} here.\\par ");
    let out = process(&input, Format::Rtf).expect("process");
    assert_eq!(out.bytes, input);
    assert_eq!(kinds(&out.warnings), vec![WarningKind::UnresolvedReference]);
    assert_eq!(out.warnings[0].label.as_deref(), Some("2"));
}

#[test]
fn orphan_definition_is_kept() {
    let input = common::rtf_doc(
        "One claim{\\super 1} only.\\par Notes\\par 1. Used note.\\par 2. Unused note.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert_eq!(kinds(&out.warnings), vec![WarningKind::OrphanDefinition]);
    assert_eq!(out.warnings[0].label.as_deref(), Some("2"));

    let text = String::from_utf8_lossy(&out.bytes).into_owned();
    assert!(text.contains("[Footnote 1: Used note.]"));
    assert!(text.contains("2. Unused note."));
    assert!(!text.contains("1. Used note.\\par"));
}

#[test]
fn duplicate_marker_resolves_first_only_and_is_deterministic() {
    let input = common::rtf_doc(
        "First{\\super 1} and again{\\super 1} later.\\par Notes\\par 1. Shared note.\\par ",
    );
    let first = process(&input, Format::Rtf).expect("first run");
    assert_eq!(kinds(&first.warnings), vec![WarningKind::DuplicateLabel]);

    let text = String::from_utf8_lossy(&first.bytes).into_owned();
    assert!(text.contains("First{\\super {\\nosupersub [Footnote 1: Shared note.]}}"));
    assert!(text.contains("and again{\\super 1} later."));

    let second = process(&input, Format::Rtf).expect("second run");
    assert_eq!(second.bytes, first.bytes);
    assert_eq!(kinds(&second.warnings), kinds(&first.warnings));
}

#[test]
fn duplicate_definitions_pair_the_first_and_keep_the_rest() {
    let input = common::rtf_doc(
        "A claim{\\super 1} here.\\par Notes\\par 1. First body.\\par 1. Second body.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert_eq!(kinds(&out.warnings), vec![WarningKind::DuplicateLabel]);

    let text = String::from_utf8_lossy(&out.bytes).into_owned();
    assert!(text.contains("[Footnote 1: First body.]"));
    assert!(text.contains("1. Second body."));
    assert!(!text.contains("1. First body."));
}

#[test]
fn anchorless_native_definition_reports_count_mismatch() {
    let input = common::rtf_doc("Some text{\\footnote  An anchorless note.} continues.\\par ");
    let out = process(&input, Format::Rtf).expect("process");
    assert_eq!(out.bytes, input);
    assert_eq!(kinds(&out.warnings), vec![WarningKind::CountMismatch]);
}

#[test]
fn native_definitions_win_over_heuristic_ones() {
    let input = common::rtf_doc(
        "Alpha\\chftn{\\footnote \\chftn  Native note.} beta.\\par \
         Notes\\par 1. Heuristic note.\\par ",
    );
    let out = process(&input, Format::Rtf).expect("process");
    assert_eq!(kinds(&out.warnings), vec![WarningKind::AmbiguousSource]);

    let text = String::from_utf8_lossy(&out.bytes).into_owned();
    assert!(text.contains("[Footnote 1: Native note.]"));
    // The heuristic candidate stays untouched.
    assert!(text.contains("1. Heuristic note."));
}

#[test]
fn unknown_extension_is_rejected() {
    let err = footnoted::Format::from_extension("odt").unwrap_err();
    assert!(err.to_string().contains("unsupported format"));
}
