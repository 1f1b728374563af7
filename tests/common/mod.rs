#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

pub const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Build a minimal DOCX archive from raw WML body markup (a sequence of
/// `<w:p>` elements) and optionally a footnotes part (a sequence of
/// `<w:footnote>` elements).
pub fn docx_bytes(body: &str, footnotes: Option<&str>) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    let mut content_types = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>",
    );
    if footnotes.is_some() {
        content_types.push_str(
            "<Override PartName=\"/word/footnotes.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml\"/>",
        );
    }
    content_types.push_str("</Types>");

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(content_types.as_bytes()).unwrap();

    writer.start_file("_rels/.rels", options).unwrap();
    writer
        .write_all(
            b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
              <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\
              <Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>\
              </Relationships>",
        )
        .unwrap();

    writer.start_file("word/document.xml", options).unwrap();
    writer
        .write_all(
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                 <w:document xmlns:w=\"{WML_NS}\"><w:body>{body}</w:body></w:document>"
            )
            .as_bytes(),
        )
        .unwrap();

    if let Some(footnotes) = footnotes {
        writer.start_file("word/footnotes.xml", options).unwrap();
        writer
            .write_all(
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                     <w:footnotes xmlns:w=\"{WML_NS}\">{footnotes}</w:footnotes>"
                )
                .as_bytes(),
            )
            .unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// Extract one part of a DOCX archive as text.
pub fn docx_part(bytes: &[u8], name: &str) -> String {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    let mut entry = zip.by_name(name).expect("part present");
    let mut text = String::new();
    entry.read_to_string(&mut text).expect("utf-8 part");
    text
}

/// All visible text of word/document.xml, in document order.
pub fn docx_text(bytes: &[u8]) -> String {
    let xml_text = docx_part(bytes, "word/document.xml");
    let xml = roxmltree::Document::parse(&xml_text).expect("well-formed document.xml");
    xml.descendants()
        .filter(|n| n.tag_name().name() == "t" && n.tag_name().namespace() == Some(WML_NS))
        .filter_map(|n| n.text())
        .collect()
}

/// Wrap body markup in a standard RTF shell.
pub fn rtf_doc(body: &str) -> Vec<u8> {
    format!("{{\\rtf1\\ansi\\deff0{{\\fonttbl{{\\f0 Times New Roman;}}}}{body}}}").into_bytes()
}

/// Build a single-xref-table PDF with one uncompressed content stream
/// per page. Pages are US Letter.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets: Vec<usize> = Vec::new();

    let kids: String = (0..pages.len())
        .map(|i| format!("{} 0 R ", 3 + 2 * i))
        .collect();
    let objects_head = [
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string(),
        format!(
            "2 0 obj\n<< /Type /Pages /Kids [{kids}] /Count {} /MediaBox [0 0 612 792] >>\nendobj\n",
            pages.len()
        ),
    ];
    for body in objects_head {
        offsets.push(out.len());
        out.extend_from_slice(body.as_bytes());
    }
    for (i, content) in pages.iter().enumerate() {
        let page_id = 3 + 2 * i;
        let content_id = page_id + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{page_id} 0 obj\n<< /Type /Page /Parent 2 0 R /Contents {content_id} 0 R >>\nendobj\n"
            )
            .as_bytes(),
        );
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{content_id} 0 obj\n<< /Length {} >>\nstream\n{content}\nendstream\nendobj\n",
                content.len()
            )
            .as_bytes(),
        );
    }

    let xref_pos = out.len();
    let total = offsets.len() + 1;
    out.extend_from_slice(format!("xref\n0 {total}\n").as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {total} /Root 1 0 R >>\nstartxref\n{xref_pos}\n%%EOF\n")
            .as_bytes(),
    );
    out
}

/// Decode the content streams an incremental update appended after the
/// original file, in the order they were written.
pub fn appended_streams(bytes: &[u8], original_len: usize) -> Vec<String> {
    let mut streams = Vec::new();
    let mut at = original_len;
    while let Some(start) = find(&bytes[at..], b"stream\n").map(|i| at + i + 7) {
        let Some(end) = find(&bytes[start..], b"endstream").map(|i| start + i) else {
            break;
        };
        let mut data = &bytes[start..end];
        if data.ends_with(b"\n") {
            data = &data[..data.len() - 1];
        }
        let decoded =
            miniz_oxide::inflate::decompress_to_vec_zlib(data).expect("zlib stream");
        streams.push(decoded.iter().map(|&b| b as char).collect());
        at = end + 9;
    }
    streams
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}
