// modbreaker-parsers/src/config/text.rs
//! Text config decoding and class-body scanning
//!
//! Scanning works on bytes of the decoded `String`. Every position it
//! stops at is an ASCII delimiter, so slices always fall on character
//! boundaries.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use super::value::{ConfigValue, PropertyMap};

/// Text decoded from a config buffer
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    /// Encoding label (`UTF-8`, `windows-1252`, ...)
    pub encoding: &'static str,
    /// Share of U+FFFD in the decoded text
    pub replacement_ratio: f64,
}

/// Decode a config buffer.
///
/// A byte-order mark decides the encoding outright. Otherwise UTF-8 and
/// then Windows-1252 are tried, and the first whose share of replacement
/// characters is at most `max_replacement_ratio` wins.
pub fn decode_text(buffer: &[u8], max_replacement_ratio: f64) -> Option<DecodedText> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(buffer) {
        let decoded = decode_with(encoding, &buffer[bom_len..]);
        if decoded.replacement_ratio <= max_replacement_ratio {
            return Some(decoded);
        }
    }

    [UTF_8, WINDOWS_1252]
        .into_iter()
        .map(|encoding| decode_with(encoding, buffer))
        .find(|decoded| decoded.replacement_ratio <= max_replacement_ratio)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> DecodedText {
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    let replacement_ratio = replacement_ratio(&text);
    DecodedText {
        text: text.into_owned(),
        encoding: encoding.name(),
        replacement_ratio,
    }
}

/// Share of U+FFFD characters, 0 for empty text
pub fn replacement_ratio(text: &str) -> f64 {
    let (total, bad) = text
        .chars()
        .fold((0usize, 0usize), |(t, b), c| (t + 1, b + usize::from(c == '\u{FFFD}')));
    if total == 0 {
        0.0
    } else {
        bad as f64 / total as f64
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Skip whitespace, comments and preprocessor lines
pub fn skip_trivia(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    let at_line_start = |pos: usize| {
        bytes[..pos]
            .iter()
            .rev()
            .take_while(|b| **b != b'\n')
            .all(|b| b.is_ascii_whitespace())
    };

    while pos < bytes.len() {
        match bytes[pos] {
            b if b.is_ascii_whitespace() || b == 0 => pos += 1,
            b'/' if bytes.get(pos + 1) == Some(&b'/') => pos = line_end(bytes, pos),
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = find_from(bytes, pos + 2, b"*/").map_or(bytes.len(), |end| end + 2);
            }
            b'#' if at_line_start(pos) => pos = line_end(bytes, pos),
            _ => break,
        }
    }
    pos
}

fn line_end(bytes: &[u8], pos: usize) -> usize {
    bytes[pos..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(bytes.len(), |i| pos + i)
}

fn find_from(bytes: &[u8], pos: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(pos..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| pos + i)
}

/// Position just past a quoted string starting at `pos`; `""` inside a
/// string is an escaped quote. Unterminated strings run to the end.
pub fn skip_string(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let quote = bytes[pos];
    let mut i = pos + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        if bytes[i] == b'\n' {
            // Strings never span lines; stop so one stray quote cannot
            // swallow the rest of the file
            return i;
        }
        i += 1;
    }
    bytes.len()
}

/// Index of the `}` matching the `{` at `open`, skipping strings and
/// comments
pub fn match_brace(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_string(text, i);
                continue;
            }
            b'/' if matches!(bytes.get(i + 1), Some(b'/') | Some(b'*')) => {
                i = skip_trivia(text, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the `;` ending the statement at `pos`, or of the `}` closing
/// the enclosing block, or the text length
fn statement_end(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(text, i);
                continue;
            }
            b'/' if matches!(bytes.get(i + 1), Some(b'/') | Some(b'*')) => {
                i = skip_trivia(text, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' if depth == 0 => return i,
            b'}' => depth -= 1,
            b';' if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Offsets of the `class` keywords that sit outside every brace block
pub fn top_level_classes(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(text, i);
                continue;
            }
            b'/' if matches!(bytes.get(i + 1), Some(b'/') | Some(b'*')) => {
                i = skip_trivia(text, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'c' | b'C' if depth == 0 && keyword_at(text, i, "class") => {
                out.push(i);
                i += "class".len();
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    out
}

/// Identifier at `pos`, if any
pub fn ident_at(text: &str, pos: usize) -> Option<&str> {
    let len = text.as_bytes().get(pos..)?.iter().take_while(|b| is_ident_byte(**b)).count();
    (len > 0).then(|| &text[pos..pos + len])
}

/// Whether the keyword starts at `pos` as a whole word, ignoring case
pub fn keyword_at(text: &str, pos: usize, keyword: &str) -> bool {
    let bytes = text.as_bytes();
    let end = pos + keyword.len();
    bytes.get(pos..end).is_some_and(|w| w.eq_ignore_ascii_case(keyword.as_bytes()))
        && (pos == 0 || !is_ident_byte(bytes[pos - 1]))
        && !bytes.get(end).copied().is_some_and(is_ident_byte)
}

/// A `class` statement found while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub parent: Option<String>,
    /// Offset of the `class` keyword
    pub start: usize,
    /// Body between the braces; `None` for `class Name;`
    pub body: Option<std::ops::Range<usize>>,
    /// Offset just past the statement
    pub end: usize,
}

/// Parse a `class` statement whose keyword starts at `pos`
pub fn class_decl_at(text: &str, pos: usize) -> Option<ClassDecl> {
    let bytes = text.as_bytes();
    let mut i = skip_trivia(text, pos + "class".len());
    let name = ident_at(text, i)?.to_string();
    i = skip_trivia(text, i + name.len());

    let mut parent = None;
    if bytes.get(i) == Some(&b':') {
        i = skip_trivia(text, i + 1);
        let p = ident_at(text, i)?;
        parent = Some(p.to_string());
        i = skip_trivia(text, i + p.len());
    }

    match bytes.get(i) {
        Some(b'{') => {
            let close = match_brace(text, i)?;
            let mut end = close + 1;
            let after = skip_trivia(text, end);
            if bytes.get(after) == Some(&b';') {
                end = after + 1;
            }
            Some(ClassDecl {
                name,
                parent,
                start: pos,
                body: Some(i + 1..close),
                end,
            })
        }
        Some(b';') => Some(ClassDecl {
            name,
            parent,
            start: pos,
            body: None,
            end: i + 1,
        }),
        _ => None,
    }
}

/// Contents of one class body
#[derive(Debug, Clone, Default)]
pub struct ParsedBody {
    pub properties: PropertyMap,
    /// Array properties written with `+=`
    pub extended: Vec<String>,
    /// Nested class statements, offsets relative to the whole text
    pub classes: Vec<ClassDecl>,
}

/// Scan the statements of a body (`range` within `text`)
pub fn parse_body(text: &str, range: std::ops::Range<usize>) -> ParsedBody {
    let bytes = text.as_bytes();
    let end = range.end.min(bytes.len());
    let mut pos = range.start;
    let mut out = ParsedBody::default();

    loop {
        pos = skip_trivia(text, pos);
        if pos >= end {
            break;
        }

        if keyword_at(text, pos, "class") {
            match class_decl_at(text, pos) {
                Some(decl) if decl.end <= end => {
                    pos = decl.end;
                    out.classes.push(decl);
                }
                _ => pos = statement_end(text, pos).max(pos) + 1,
            }
            continue;
        }

        if keyword_at(text, pos, "delete") {
            pos = statement_end(text, pos) + 1;
            continue;
        }

        let Some(name) = ident_at(text, pos) else {
            pos = statement_end(text, pos).max(pos) + 1;
            continue;
        };

        let mut i = skip_trivia(text, pos + name.len());
        let mut is_array = false;
        if bytes.get(i..i + 2) == Some(b"[]") {
            is_array = true;
            i = skip_trivia(text, i + 2);
        }

        let extend = bytes.get(i..i + 2) == Some(b"+=");
        let assign = extend || bytes.get(i) == Some(&b'=');
        let value_start = i + if extend { 2 } else { 1 };
        let stmt_end = statement_end(text, if assign { value_start } else { i }).min(end);

        if assign {
            let value = parse_value(&text[value_start.min(stmt_end)..stmt_end]);
            if extend && is_array {
                out.extended.push(name.to_string());
            }
            out.properties.insert(name, value);
        }
        pos = stmt_end.max(pos) + 1;
    }

    out
}

/// Parse a raw value: `{...}` array, quoted text, number, or a bare word
pub fn parse_value(raw: &str) -> ConfigValue {
    let raw = raw.trim();
    let bytes = raw.as_bytes();

    match bytes.first() {
        Some(b'{') => {
            let close = match_brace(raw, 0).unwrap_or(raw.len());
            let inner = &raw[1..close.max(1)];
            ConfigValue::Array(split_elements(inner).into_iter().map(parse_value).collect())
        }
        Some(b'"') | Some(b'\'') => ConfigValue::Text(unquote(raw)),
        _ => parse_number(raw).unwrap_or_else(|| ConfigValue::Reference(raw.to_string())),
    }
}

fn unquote(raw: &str) -> String {
    let quote = raw.as_bytes()[0] as char;
    let end = skip_string(raw, 0);
    let inner_end = if raw[..end].len() > 1 && raw[..end].ends_with(quote) { end - 1 } else { end };
    let doubled: String = [quote, quote].iter().collect();
    raw[1..inner_end.max(1)].replace(&doubled, &quote.to_string())
}

fn parse_number(raw: &str) -> Option<ConfigValue> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Some(ConfigValue::Int(v));
    }
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(ConfigValue::Int);
    }
    let numeric = raw
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
    if numeric && raw.bytes().any(|b| b.is_ascii_digit()) {
        return raw.parse::<f64>().ok().map(ConfigValue::Float);
    }
    None
}

/// Split array contents at top-level commas
fn split_elements(inner: &str) -> Vec<&str> {
    let bytes = inner.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(inner, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&inner[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_and_latin1() {
        let utf8 = decode_text("class Café {};".as_bytes(), 0.01).unwrap();
        assert_eq!(utf8.encoding, "UTF-8");
        assert!(utf8.text.contains("Café"));

        let latin1 = decode_text(b"displayName = \"Caf\xE9\";", 0.01).unwrap();
        assert_eq!(latin1.encoding, "windows-1252");
        assert!(latin1.text.contains("Café"));
    }

    #[test]
    fn test_decode_bom() {
        let mut data = vec![0xFF, 0xFE];
        for unit in "class A {};".encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode_text(&data, 0.01).unwrap();
        assert_eq!(decoded.encoding, "UTF-16LE");
        assert_eq!(decoded.text, "class A {};");
    }

    #[test]
    fn test_match_brace_skips_strings_and_comments() {
        let text = r#"{ a = "}"; // }
            b[] = {1, {2}}; /* } */ }"#;
        assert_eq!(match_brace(text, 0), Some(text.len() - 1));
        assert_eq!(match_brace("{ never closed", 0), None);
    }

    #[test]
    fn test_parse_body() {
        let text = r#"{
            scope = 2;
            displayName = "Big ""Iron""";
            weight = 3.5;
            model = "\mymod\rifle.p3d";
            hiddenSelectionsTextures[] = {"a_co.paa", "b_co.paa"};
            attachments[] += {"optic"};
            simulation = Weapon;
            delete OldThing;
            class Inventory { capacity = 4; };
            class ExternalRef;
        }"#;
        let body = parse_body(text, 1..text.len() - 1);
        let props = &body.properties;

        assert_eq!(props.get("scope"), Some(&ConfigValue::Int(2)));
        assert_eq!(props.get("displayName").and_then(|v| v.as_str()), Some("Big \"Iron\""));
        assert_eq!(props.get("weight"), Some(&ConfigValue::Float(3.5)));
        assert_eq!(props.get("model").and_then(|v| v.as_str()), Some("\\mymod\\rifle.p3d"));
        assert_eq!(props.get("hiddenSelectionsTextures").map(|v| v.strings().len()), Some(2));
        assert_eq!(props.get("simulation"), Some(&ConfigValue::Reference("Weapon".into())));
        assert!(!props.contains("capacity"));
        assert_eq!(body.extended, vec!["attachments".to_string()]);

        assert_eq!(body.classes.len(), 2);
        assert_eq!(body.classes[0].name, "Inventory");
        assert!(body.classes[1].body.is_none());
    }

    #[test]
    fn test_class_decl() {
        let text = "class Rifle : Weapon_Base { model = \"x.p3d\"; };";
        let decl = class_decl_at(text, 0).unwrap();
        assert_eq!(decl.name, "Rifle");
        assert_eq!(decl.parent.as_deref(), Some("Weapon_Base"));
        assert_eq!(decl.end, text.len());
        assert!(class_decl_at("class ;", 0).is_none());
    }

    #[test]
    fn test_top_level_classes() {
        let text = "class A { class B {}; }; // class C\nclass D; s = \"class E {\"; /* { */ class F {};";
        let at = |needle: &str| text.find(needle).unwrap();
        assert_eq!(top_level_classes(text), vec![at("class A"), at("class D"), at("class F")]);
        assert_eq!(top_level_classes("}} class G {"), vec![3]);
    }

    #[test]
    fn test_keyword_boundaries() {
        assert!(keyword_at("class A", 0, "class"));
        assert!(keyword_at("x; CLASS A", 3, "class"));
        assert!(!keyword_at("subclass A", 3, "class"));
        assert!(!keyword_at("classes", 0, "class"));
    }

    #[test]
    fn test_parse_value_shapes() {
        assert_eq!(parse_value(" -12 "), ConfigValue::Int(-12));
        assert_eq!(parse_value("0x1F"), ConfigValue::Int(31));
        assert_eq!(parse_value("1e-3"), ConfigValue::Float(0.001));
        assert_eq!(parse_value("'single'"), ConfigValue::Text("single".into()));
        assert_eq!(parse_value("{}"), ConfigValue::Array(vec![]));
        assert_eq!(
            parse_value("{1, \"a,b\", {2}}"),
            ConfigValue::Array(vec![
                ConfigValue::Int(1),
                ConfigValue::Text("a,b".into()),
                ConfigValue::Array(vec![ConfigValue::Int(2)]),
            ])
        );
        assert_eq!(parse_value("true"), ConfigValue::Reference("true".into()));
        assert_eq!(parse_value("inf"), ConfigValue::Reference("inf".into()));
    }
}
