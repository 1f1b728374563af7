use std::collections::HashMap;
use std::ops::Range;

use crate::error::Error;

/// A parsed PDF object. Streams keep a byte range into the original
/// file instead of copying their data.
#[derive(Debug, Clone)]
pub(crate) enum Object {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(Vec<u8>),
    Name(String),
    Array(Vec<Object>),
    Dict(HashMap<String, Object>),
    Stream {
        dict: HashMap<String, Object>,
        data: Range<usize>,
    },
    Ref(u32),
}

impl Object {
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Int(v) => Some(*v as f64),
            Object::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub(crate) fn as_dict(&self) -> Option<&HashMap<String, Object>> {
        match self {
            Object::Dict(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub(crate) fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub(crate) fn as_ref_num(&self) -> Option<u32> {
        match self {
            Object::Ref(n) => Some(*n),
            _ => None,
        }
    }
}

/// Offset and generation of every live object, plus the trailer of the
/// newest cross-reference section.
pub(crate) struct ObjectStore {
    pub(crate) offsets: HashMap<u32, (usize, u16)>,
    pub(crate) trailer: HashMap<String, Object>,
    pub(crate) startxref: usize,
    pub(crate) size: u32,
}

impl ObjectStore {
    pub(crate) fn get(&self, bytes: &[u8], num: u32) -> Result<Object, Error> {
        let &(offset, _) = self.offsets.get(&num).ok_or_else(|| {
            Error::MalformedDocument(format!("reference to missing object {num}"))
        })?;
        parse_indirect(bytes, offset)
    }

    /// Generation number recorded for an object in the xref table.
    pub(crate) fn generation(&self, num: u32) -> u16 {
        self.offsets.get(&num).map_or(0, |&(_, generation)| generation)
    }

    pub(crate) fn resolve(&self, bytes: &[u8], obj: &Object) -> Result<Object, Error> {
        match obj {
            Object::Ref(num) => self.get(bytes, *num),
            other => Ok(other.clone()),
        }
    }

    /// Fetch an indirect object's decoded stream data.
    pub(crate) fn stream(&self, bytes: &[u8], num: u32) -> Result<Vec<u8>, Error> {
        let obj = self.get(bytes, num)?;
        let Object::Stream { dict, data } = obj else {
            return Err(Error::MalformedDocument(format!(
                "object {num} is not a stream"
            )));
        };
        decode_stream(bytes, &dict, &data)
    }
}

pub(crate) fn decode_stream(
    bytes: &[u8],
    dict: &HashMap<String, Object>,
    data: &Range<usize>,
) -> Result<Vec<u8>, Error> {
    let raw = bytes
        .get(data.clone())
        .ok_or_else(|| Error::MalformedDocument("stream data out of bounds".into()))?;
    match dict.get("Filter") {
        None => Ok(raw.to_vec()),
        Some(Object::Name(n)) if n == "FlateDecode" => {
            miniz_oxide::inflate::decompress_to_vec_zlib(raw)
                .map_err(|_| Error::MalformedDocument("corrupt FlateDecode stream".into()))
        }
        Some(Object::Array(filters)) if filters.is_empty() => Ok(raw.to_vec()),
        Some(Object::Array(filters))
            if filters.len() == 1 && filters[0].as_name() == Some("FlateDecode") =>
        {
            miniz_oxide::inflate::decompress_to_vec_zlib(raw)
                .map_err(|_| Error::MalformedDocument("corrupt FlateDecode stream".into()))
        }
        Some(other) => Err(Error::MalformedDocument(format!(
            "unsupported stream filter {other:?}"
        ))),
    }
}

/// Locate the `startxref` offset near the end of the file.
pub(crate) fn find_startxref(bytes: &[u8]) -> Result<usize, Error> {
    let tail_start = bytes.len().saturating_sub(2048);
    let tail = &bytes[tail_start..];
    let at = find_last(tail, b"startxref")
        .ok_or_else(|| Error::MalformedDocument("missing startxref".into()))?;
    let mut lexer = Lexer::new(bytes, tail_start + at + b"startxref".len());
    lexer.skip_whitespace();
    let start = lexer.pos;
    while lexer.peek().is_some_and(|b| b.is_ascii_digit()) {
        lexer.pos += 1;
    }
    std::str::from_utf8(&bytes[start..lexer.pos])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::MalformedDocument("bad startxref offset".into()))
}

fn find_last(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).rev().find(|&i| &haystack[i..i + needle.len()] == needle)
}

/// Walk the classic cross-reference table chain from `startxref`
/// through every /Prev section. The newest entry for each object wins.
/// Cross-reference streams and encrypted files are rejected.
pub(crate) fn parse_xref(bytes: &[u8]) -> Result<ObjectStore, Error> {
    let startxref = find_startxref(bytes)?;
    let mut offsets: HashMap<u32, (usize, u16)> = HashMap::new();
    // Tracks every object number already decided by a newer section, so
    // an older /Prev section cannot resurrect a freed object.
    let mut seen: std::collections::HashSet<u32> = std::collections::HashSet::new();
    let mut trailer: Option<HashMap<String, Object>> = None;
    let mut size: u32 = 0;

    let mut next = Some(startxref);
    let mut depth = 0;
    while let Some(offset) = next {
        depth += 1;
        if depth > 64 {
            return Err(Error::MalformedDocument("xref /Prev chain too deep".into()));
        }
        let mut lexer = Lexer::new(bytes, offset);
        lexer.skip_whitespace();
        if !lexer.eat_keyword(b"xref") {
            return Err(Error::MalformedDocument(
                "cross-reference streams are not supported".into(),
            ));
        }

        loop {
            lexer.skip_whitespace();
            if lexer.eat_keyword(b"trailer") {
                break;
            }
            let first = lexer.read_uint()? as u32;
            let count = lexer.read_uint()? as u32;
            for i in 0..count {
                lexer.skip_whitespace();
                let entry_offset = lexer.read_uint()?;
                let generation = lexer.read_uint()?;
                lexer.skip_whitespace();
                let kind = lexer
                    .next_byte()
                    .ok_or_else(|| Error::MalformedDocument("truncated xref entry".into()))?;
                if seen.insert(first + i) && kind == b'n' {
                    offsets.insert(first + i, (entry_offset as usize, generation as u16));
                }
            }
        }

        let Object::Dict(dict) = lexer.parse_object()? else {
            return Err(Error::MalformedDocument("trailer is not a dictionary".into()));
        };
        if dict.contains_key("Encrypt") {
            return Err(Error::MalformedDocument("encrypted files are not supported".into()));
        }
        if let Some(s) = dict.get("Size").and_then(Object::as_int) {
            size = size.max(s as u32);
        }
        next = dict.get("Prev").and_then(Object::as_int).map(|v| v as usize);
        if trailer.is_none() {
            trailer = Some(dict);
        }
    }

    Ok(ObjectStore {
        offsets,
        trailer: trailer
            .ok_or_else(|| Error::MalformedDocument("missing trailer".into()))?,
        startxref,
        size,
    })
}

/// Parse the indirect object at `offset`, skipping its `N G obj` header.
pub(crate) fn parse_indirect(bytes: &[u8], offset: usize) -> Result<Object, Error> {
    let mut lexer = Lexer::new(bytes, offset);
    lexer.skip_whitespace();
    lexer.read_uint()?;
    lexer.read_uint()?;
    lexer.skip_whitespace();
    if !lexer.eat_keyword(b"obj") {
        return Err(Error::MalformedDocument(format!(
            "no object header at offset {offset}"
        )));
    }
    lexer.parse_object()
}

pub(crate) struct Lexer<'a> {
    bytes: &'a [u8],
    pub(crate) pos: usize,
}

fn is_pdf_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(bytes: &'a [u8], pos: usize) -> Self {
        Lexer { bytes, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub(crate) fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_pdf_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self.peek().is_some_and(|b| b != b'\n' && b != b'\r') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn eat_keyword(&mut self, word: &[u8]) -> bool {
        self.skip_whitespace();
        if self.bytes[self.pos..].starts_with(word) {
            let after = self.bytes.get(self.pos + word.len()).copied();
            if after.is_none() || after.is_some_and(|b| is_pdf_whitespace(b) || is_delimiter(b)) {
                self.pos += word.len();
                return true;
            }
        }
        false
    }

    fn read_uint(&mut self) -> Result<u64, Error> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(Error::MalformedDocument(format!(
                "expected integer at offset {start}"
            )));
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::MalformedDocument("integer overflow".into()))
    }

    pub(crate) fn parse_object(&mut self) -> Result<Object, Error> {
        self.skip_whitespace();
        let Some(b) = self.peek() else {
            return Err(Error::MalformedDocument("unexpected end of file".into()));
        };
        match b {
            b'<' if self.bytes.get(self.pos + 1) == Some(&b'<') => self.parse_dict_or_stream(),
            b'<' => self.parse_hex_string(),
            b'(' => self.parse_literal_string(),
            b'/' => self.parse_name().map(Object::Name),
            b'[' => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_whitespace();
                    if self.peek() == Some(b']') {
                        self.pos += 1;
                        return Ok(Object::Array(items));
                    }
                    items.push(self.parse_object()?);
                }
            }
            b't' | b'f' | b'n' => {
                if self.eat_keyword(b"true") {
                    Ok(Object::Bool(true))
                } else if self.eat_keyword(b"false") {
                    Ok(Object::Bool(false))
                } else if self.eat_keyword(b"null") {
                    Ok(Object::Null)
                } else {
                    Err(Error::MalformedDocument(format!(
                        "unknown token at offset {}",
                        self.pos
                    )))
                }
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number_or_ref(),
            _ => Err(Error::MalformedDocument(format!(
                "unexpected byte {b:#04x} at offset {}",
                self.pos
            ))),
        }
    }

    fn parse_number_or_ref(&mut self) -> Result<Object, Error> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut real = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => self.pos += 1,
                b'.' => {
                    real = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| Error::MalformedDocument("bad number".into()))?;
        if real {
            return text
                .parse()
                .map(Object::Real)
                .map_err(|_| Error::MalformedDocument("bad real number".into()));
        }
        let value: i64 = text
            .parse()
            .map_err(|_| Error::MalformedDocument("bad integer".into()))?;

        // `N G R` is an indirect reference; two-token lookahead tells it
        // apart from a plain integer.
        if value >= 0 {
            let saved = self.pos;
            self.skip_whitespace();
            let gen_start = self.pos;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
            if self.pos > gen_start {
                self.skip_whitespace();
                if self.peek() == Some(b'R') {
                    let after = self.bytes.get(self.pos + 1).copied();
                    if after.is_none()
                        || after.is_some_and(|b| is_pdf_whitespace(b) || is_delimiter(b))
                    {
                        self.pos += 1;
                        return Ok(Object::Ref(value as u32));
                    }
                }
            }
            self.pos = saved;
        }
        Ok(Object::Int(value))
    }

    fn parse_name(&mut self) -> Result<String, Error> {
        self.pos += 1;
        let mut name = String::new();
        while let Some(b) = self.peek() {
            if is_pdf_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
            if b == b'#' {
                let hi = self.next_byte().and_then(hex_value);
                let lo = self.next_byte().and_then(hex_value);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => name.push((hi * 16 + lo) as char),
                    _ => return Err(Error::MalformedDocument("bad #-escape in name".into())),
                }
            } else {
                name.push(b as char);
            }
        }
        Ok(name)
    }

    fn parse_literal_string(&mut self) -> Result<Object, Error> {
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1;
        while let Some(b) = self.next_byte() {
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Object::Str(out));
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(esc) = self.next_byte() else { break };
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(8),
                        b'f' => out.push(12),
                        b'(' | b')' | b'\\' => out.push(esc),
                        b'\r' | b'\n' => {
                            if esc == b'\r' && self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'0'..=b'7' => {
                            let mut v = (esc - b'0') as u32;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        v = v * 8 + (d - b'0') as u32;
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(v as u8);
                        }
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
        Err(Error::MalformedDocument("unterminated string".into()))
    }

    fn parse_hex_string(&mut self) -> Result<Object, Error> {
        self.pos += 1;
        let mut digits = Vec::new();
        while let Some(b) = self.next_byte() {
            match b {
                b'>' => {
                    if digits.len() % 2 == 1 {
                        digits.push(0);
                    }
                    let out = digits.chunks(2).map(|p| p[0] * 16 + p[1]).collect();
                    return Ok(Object::Str(out));
                }
                b if is_pdf_whitespace(b) => {}
                b => digits.push(hex_value(b).ok_or_else(|| {
                    Error::MalformedDocument("bad hex digit in string".into())
                })?),
            }
        }
        Err(Error::MalformedDocument("unterminated hex string".into()))
    }

    fn parse_dict_or_stream(&mut self) -> Result<Object, Error> {
        self.pos += 2;
        let mut dict = HashMap::new();
        loop {
            self.skip_whitespace();
            if self.bytes[self.pos..].starts_with(b">>") {
                self.pos += 2;
                break;
            }
            if self.peek() != Some(b'/') {
                return Err(Error::MalformedDocument(format!(
                    "expected name key at offset {}",
                    self.pos
                )));
            }
            let key = self.parse_name()?;
            let value = self.parse_object()?;
            dict.insert(key, value);
        }

        self.skip_whitespace();
        if !self.eat_keyword(b"stream") {
            return Ok(Object::Dict(dict));
        }
        // The keyword is followed by CRLF or LF, then raw data.
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
        let start = self.pos;
        let end = match dict.get("Length").and_then(Object::as_int) {
            Some(len) if start + len as usize <= self.bytes.len() => start + len as usize,
            // Indirect or broken /Length: fall back to scanning.
            _ => {
                let rel = find_sub(&self.bytes[start..], b"endstream").ok_or_else(|| {
                    Error::MalformedDocument("unterminated stream".into())
                })?;
                let mut end = start + rel;
                if end > start && self.bytes[end - 1] == b'\n' {
                    end -= 1;
                }
                if end > start && self.bytes[end - 1] == b'\r' {
                    end -= 1;
                }
                end
            }
        };
        self.pos = end;
        self.skip_whitespace();
        self.eat_keyword(b"endstream");
        Ok(Object::Stream { dict, data: start..end })
    }
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
