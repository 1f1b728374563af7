mod common;

use footnoted::{Format, process};

fn para(inner: &str) -> String {
    format!("<w:p>{inner}</w:p>")
}

fn text_run(text: &str) -> String {
    format!("<w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r>")
}

fn footnote_ref_run(id: &str) -> String {
    format!(
        "<w:r><w:rPr><w:vertAlign w:val=\"superscript\"/></w:rPr>\
         <w:footnoteReference w:id=\"{id}\"/></w:r>"
    )
}

#[test]
fn document_without_footnotes_is_byte_identical() {
    let input = common::docx_bytes(&para(&text_run("Nothing to see here.")), None);
    let out = process(&input, Format::Docx).expect("process");
    assert_eq!(out.bytes, input);
    assert!(out.warnings.is_empty());
}

#[test]
fn native_footnote_is_inlined_and_removed() {
    let body = para(&format!(
        "{}{}{}",
        text_run("The result"),
        footnote_ref_run("2"),
        text_run(" holds.")
    ));
    let footnotes = format!(
        "<w:footnote w:type=\"separator\" w:id=\"-1\"><w:p><w:r><w:t></w:t></w:r></w:p></w:footnote>\
         <w:footnote w:id=\"2\"><w:p>{}{}</w:p></w:footnote>",
        text_run("2"),
        text_run(" Archival source.")
    );
    let input = common::docx_bytes(&body, Some(&footnotes));

    let out = process(&input, Format::Docx).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let text = common::docx_text(&out.bytes);
    assert_eq!(text, "The result[Footnote 2: Archival source.] holds.");

    let footnotes_xml = common::docx_part(&out.bytes, "word/footnotes.xml");
    assert!(!footnotes_xml.contains("w:id=\"2\""));
    assert!(footnotes_xml.contains("w:type=\"separator\""));
    roxmltree::Document::parse(&footnotes_xml).expect("footnotes.xml stays well-formed");
}

#[test]
fn unicode_superscript_marker_resolves_against_endnotes() {
    let body = format!(
        "{}{}{}",
        para(&text_run("Rainfall doubled\u{00B9} that year.")),
        para(&text_run("Notes")),
        para(&text_run("1. Measured at the coastal station."))
    );
    let input = common::docx_bytes(&body, None);

    let out = process(&input, Format::Docx).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let text = common::docx_text(&out.bytes);
    assert!(
        text.contains("Rainfall doubled[Footnote 1: Measured at the coastal station.] that year.")
    );
    assert!(text.contains("Notes"));
    assert!(!text.contains("1. Measured"));

    let document_xml = common::docx_part(&out.bytes, "word/document.xml");
    roxmltree::Document::parse(&document_xml).expect("document.xml stays well-formed");
}

#[test]
fn multi_paragraph_native_body_joins_with_spaces() {
    let body = para(&format!(
        "{}{}",
        text_run("A claim"),
        footnote_ref_run("3")
    ));
    let footnotes = format!(
        "<w:footnote w:id=\"3\"><w:p>{}</w:p><w:p>{}</w:p></w:footnote>",
        text_run("First sentence."),
        text_run("Second sentence.")
    );
    let input = common::docx_bytes(&body, Some(&footnotes));

    let out = process(&input, Format::Docx).expect("process");
    let text = common::docx_text(&out.bytes);
    assert!(text.contains("[Footnote 3: First sentence. Second sentence.]"));
}

#[test]
fn second_pass_is_a_no_op() {
    let body = para(&format!(
        "{}{}",
        text_run("A claim"),
        footnote_ref_run("2")
    ));
    let footnotes = format!(
        "<w:footnote w:id=\"2\"><w:p>{}</w:p></w:footnote>",
        text_run("The body.")
    );
    let input = common::docx_bytes(&body, Some(&footnotes));

    let first = process(&input, Format::Docx).expect("first pass");
    let second = process(&first.bytes, Format::Docx).expect("second pass");
    assert_eq!(second.bytes, first.bytes);
    assert!(second.warnings.is_empty());
}

#[test]
fn escapes_markup_characters_in_notation() {
    let body = para(&format!(
        "{}{}",
        text_run("See"),
        footnote_ref_run("2")
    ));
    let footnotes = format!(
        "<w:footnote w:id=\"2\"><w:p>{}</w:p></w:footnote>",
        text_run("Smith &amp; Jones, p. &lt;40&gt;.")
    );
    let input = common::docx_bytes(&body, Some(&footnotes));

    let out = process(&input, Format::Docx).expect("process");
    let document_xml = common::docx_part(&out.bytes, "word/document.xml");
    roxmltree::Document::parse(&document_xml).expect("document.xml stays well-formed");
    assert_eq!(
        common::docx_text(&out.bytes),
        "See[Footnote 2: Smith & Jones, p. <40>.]"
    );
}
