use crate::model::{Document, FootnoteMarker, Region};

/// Scan the document for runs whose style marks them as footnote
/// reference markers. Purely syntactic: no definition lookup happens
/// here. Markers come back in reading order.
pub(crate) fn detect(doc: &Document) -> Vec<FootnoteMarker> {
    let mut markers = Vec::new();
    for (bi, block) in doc.blocks.iter().enumerate() {
        if block.region != Region::Body {
            continue;
        }
        for (ri, run) in block.runs.iter().enumerate() {
            if !run.style.is_superscript {
                continue;
            }
            // Runs failing the token pattern are ordinary superscript
            // text (exponents, chemical notation), not references.
            let Some(label) = label_token(&run.text) else {
                continue;
            };
            markers.push(FootnoteMarker {
                label: Some(label),
                block: bi,
                run: ri,
            });
        }
    }
    log::debug!("detected {} footnote markers", markers.len());
    markers
}

/// Map a Unicode superscript digit to its ASCII equivalent.
pub(crate) fn superscript_digit(c: char) -> Option<char> {
    match c {
        '\u{2070}' => Some('0'),
        '\u{00B9}' => Some('1'),
        '\u{00B2}' => Some('2'),
        '\u{00B3}' => Some('3'),
        '\u{2074}' => Some('4'),
        '\u{2075}' => Some('5'),
        '\u{2076}' => Some('6'),
        '\u{2077}' => Some('7'),
        '\u{2078}' => Some('8'),
        '\u{2079}' => Some('9'),
        _ => None,
    }
}

const LABEL_SYMBOLS: [char; 4] = ['*', '\u{2020}', '\u{2021}', '\u{00A7}'];

/// Recognize a footnote label token: a digit sequence (Unicode
/// superscript digits normalized to ASCII), a single ASCII letter, a
/// Roman numeral, or one of the fixed symbols `* † ‡ §`. Returns the
/// normalized label, or None for anything else.
pub(crate) fn label_token(text: &str) -> Option<String> {
    let t = text.trim();
    if t.is_empty() || t.chars().count() > 8 {
        return None;
    }
    if t.chars().all(|c| c.is_ascii_digit()) {
        return Some(t.to_string());
    }
    if t.chars().all(|c| superscript_digit(c).is_some()) {
        return Some(t.chars().filter_map(superscript_digit).collect());
    }
    let mut chars = t.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() || LABEL_SYMBOLS.contains(&c) {
            return Some(c.to_string());
        }
    }
    if is_roman_numeral(t) {
        return Some(t.to_string());
    }
    None
}

/// Validate a Roman numeral of the classic shape
/// M{0,4}(CM|CD|D?C{0,3})(XC|XL|L?X{0,3})(IX|IV|V?I{0,3}).
pub(crate) fn is_roman_numeral(s: &str) -> bool {
    if s.is_empty() || !s.chars().all(|c| "IVXLCDMivxlcdm".contains(c)) {
        return false;
    }
    let upper = s.to_ascii_uppercase();
    let mut rest = upper.as_str();
    let mut thousands = 0;
    while let Some(r) = rest.strip_prefix('M') {
        thousands += 1;
        if thousands > 4 {
            return false;
        }
        rest = r;
    }
    rest = strip_roman_group(rest, 'C', 'D', 'M');
    rest = strip_roman_group(rest, 'X', 'L', 'C');
    rest = strip_roman_group(rest, 'I', 'V', 'X');
    rest.is_empty()
}

/// Consume one Roman digit group: (uT|uF|F?u{0,3}) where u is the unit
/// glyph, F the five-glyph, T the ten-glyph.
fn strip_roman_group(s: &str, unit: char, five: char, ten: char) -> &str {
    let subtractive_ten: String = [unit, ten].iter().collect();
    if let Some(r) = s.strip_prefix(subtractive_ten.as_str()) {
        return r;
    }
    let subtractive_five: String = [unit, five].iter().collect();
    if let Some(r) = s.strip_prefix(subtractive_five.as_str()) {
        return r;
    }
    let mut rest = s.strip_prefix(five).unwrap_or(s);
    for _ in 0..3 {
        match rest.strip_prefix(unit) {
            Some(r) => rest = r,
            None => break,
        }
    }
    rest
}
