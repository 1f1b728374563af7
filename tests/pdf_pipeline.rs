mod common;

use footnoted::{Format, process};

const BODY: &str = "BT /F1 12 Tf 72 700 Td (Climate shifts were recorded) Tj ET\n\
                    BT /F1 12 Tf 72 686 Td (in the archive) Tj 3 Ts (1) Tj 0 Ts ( and elsewhere.) Tj ET";

#[test]
fn document_without_footnotes_is_byte_identical() {
    let page = "BT /F1 12 Tf 72 700 Td (Nothing but body text.) Tj ET";
    let input = common::pdf_bytes(&[page]);
    let out = process(&input, Format::Pdf).expect("process");
    assert_eq!(out.bytes, input);
    assert!(out.warnings.is_empty());
}

#[test]
fn page_bottom_footnote_is_inlined() {
    let page = format!(
        "{BODY}\nBT /F1 8 Tf 72 96 Td (1. Source: the 1911 survey.) Tj ET"
    );
    let input = common::pdf_bytes(&[&page]);

    let out = process(&input, Format::Pdf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    // Incremental update: the original file is an untouched prefix.
    assert!(out.bytes.starts_with(&input));
    assert!(out.bytes.ends_with(b"%%EOF\n"));

    let streams = common::appended_streams(&out.bytes, input.len());
    assert_eq!(streams.len(), 1);
    assert!(streams[0].contains("[Footnote 1: Source: the 1911 survey.]"));
    assert!(streams[0].contains("0 Ts"));
    assert!(!streams[0].contains("1. Source"));
    // Untouched operators survive verbatim.
    assert!(streams[0].contains("(Climate shifts were recorded) Tj"));
}

#[test]
fn high_byte_body_text_survives_unchanged() {
    // 0xE9 is é in the single-byte encodings these streams use; the
    // rewritten stream must carry the same byte, not its UTF-8 pair.
    let page = format!("{BODY}\nBT /F1 8 Tf 72 96 Td (1. Caf# note.) Tj ET");
    let input: Vec<u8> = common::pdf_bytes(&[&page])
        .into_iter()
        .map(|b| if b == b'#' { 0xE9 } else { b })
        .collect();

    let out = process(&input, Format::Pdf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let streams = common::appended_streams(&out.bytes, input.len());
    assert_eq!(streams.len(), 1);
    assert!(streams[0].contains("[Footnote 1: Caf\u{e9} note.]"));
    assert!(!streams[0].contains("Caf\u{c3}\u{a9}"));
}

#[test]
fn nonzero_generation_content_stream_keeps_its_generation() {
    let page = format!(
        "{BODY}\nBT /F1 8 Tf 72 96 Td (1. Source: the 1911 survey.) Tj ET"
    );
    let fixture = String::from_utf8(common::pdf_bytes(&[&page])).expect("ascii fixture");
    // Bump the content stream object to generation 1, in its header,
    // its reference, and its xref entry.
    let offset = fixture.find("4 0 obj").expect("content object");
    let input = fixture
        .replace("4 0 obj", "4 1 obj")
        .replace("/Contents 4 0 R", "/Contents 4 1 R")
        .replace(
            &format!("{offset:010} 00000 n"),
            &format!("{offset:010} 00001 n"),
        )
        .into_bytes();

    let out = process(&input, Format::Pdf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let tail = String::from_utf8_lossy(&out.bytes[input.len()..]).into_owned();
    assert!(tail.contains("4 1 obj"), "appended object header: {tail}");
    assert!(tail.contains("00001 n"), "appended xref entry: {tail}");
    assert!(!tail.contains("4 0 obj"));
}

#[test]
fn footnote_continues_across_pages() {
    let page_one = format!("{BODY}\nBT /F1 8 Tf 72 96 Td (1. Began in the south) Tj ET");
    let page_two = "BT /F1 12 Tf 72 700 Td (Chapter two begins) Tj ET\n\
                    BT /F1 12 Tf 72 686 Td (with calmer weather.) Tj ET\n\
                    BT /F1 8 Tf 72 96 Td (and ended in the north.) Tj ET";
    let input = common::pdf_bytes(&[&page_one, page_two]);

    let out = process(&input, Format::Pdf).expect("process");
    assert!(out.warnings.is_empty(), "warnings: {:?}", out.warnings);

    let streams = common::appended_streams(&out.bytes, input.len());
    assert_eq!(streams.len(), 2);
    assert!(streams[0].contains("[Footnote 1: Began in the south and ended in the north.]"));
    assert!(!streams[1].contains("ended in the north"));
    assert!(streams[1].contains("(Chapter two begins) Tj"));
}

#[test]
fn long_notation_wraps_onto_continuation_lines() {
    let body = "This note runs well past the right margin of a letter page and \
                must therefore wrap onto at least one continuation line when it \
                is written back into the content stream of the document";
    let page = format!("{BODY}\nBT /F1 8 Tf 72 96 Td (1. {body}) Tj ET");
    let input = common::pdf_bytes(&[&page]);

    let out = process(&input, Format::Pdf).expect("process");
    let streams = common::appended_streams(&out.bytes, input.len());
    assert_eq!(streams.len(), 1);
    assert!(streams[0].contains("[Footnote 1: This note runs"));
    // A line advance down per continuation line and one matching move
    // back up so the rest of the stream keeps its position.
    let advances = streams[0].matches("0 -14.40 Td").count();
    assert!(advances >= 1, "notation did not wrap: {}", streams[0]);
    let restore = format!("0 {:.2} Td", 14.4_f32 * advances as f32);
    assert!(streams[0].contains(&restore));
}

#[test]
fn second_pass_is_a_no_op() {
    let page = format!(
        "{BODY}\nBT /F1 8 Tf 72 96 Td (1. Source: the 1911 survey.) Tj ET"
    );
    let input = common::pdf_bytes(&[&page]);

    let first = process(&input, Format::Pdf).expect("first pass");
    let second = process(&first.bytes, Format::Pdf).expect("second pass");
    assert_eq!(second.bytes, first.bytes);
    assert!(second.warnings.is_empty());
}

#[test]
fn rejects_encrypted_documents() {
    let mut input = common::pdf_bytes(&["BT /F1 12 Tf 72 700 Td (secret) Tj ET"]);
    let text = String::from_utf8(input.clone()).expect("ascii fixture");
    let patched = text.replace("/Root 1 0 R", "/Root 1 0 R /Encrypt 9 0 R");
    input = patched.into_bytes();
    // The trailer grew, so the startxref offset is unchanged and still valid.
    let err = process(&input, Format::Pdf).unwrap_err();
    assert!(err.to_string().contains("encrypted"));
}

#[test]
fn rejects_non_pdf_input() {
    let err = process(b"not a pdf at all", Format::Pdf).unwrap_err();
    assert!(err.to_string().contains("malformed"));
}
