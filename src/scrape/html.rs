//! Tolerant HTML scanning helpers for the listings page.
//!
//! This is not a general-purpose HTML parser. The listings markup is scanned
//! locally: class-marked blocks are located case-insensitively, balanced to
//! their closing tag, and text is recovered by stripping tags, decoding the
//! common entities and collapsing whitespace. Attribute order, quoting style
//! and incidental markup noise must not matter.

/// A scanned element: the raw attribute source of its opening tag plus the
/// inner HTML between the opening and matching closing tag.
#[derive(Debug)]
pub struct Element<'a> {
    pub attrs: &'a str,
    pub inner: &'a str,
}

struct RawTag<'a> {
    start: usize,
    end: usize,
    /// Lowercased tag name; empty for comments and declarations.
    name: String,
    attrs: &'a str,
    closing: bool,
    self_closing: bool,
}

/// Scan for the next markup construct at or after `from`.
///
/// Comments and `<!`/`<?` declarations come back as nameless self-closing
/// tags so callers can skip their span uniformly. Stray `<` characters that
/// do not open a tag are treated as text.
fn next_tag(html: &str, from: usize) -> Option<RawTag<'_>> {
    let bytes = html.as_bytes();
    let mut i = from;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        if html[i..].starts_with("<!--") {
            let end = match html[i..].find("-->") {
                Some(off) => i + off + 3,
                None => html.len(),
            };
            return Some(RawTag {
                start: i,
                end,
                name: String::new(),
                attrs: "",
                closing: false,
                self_closing: true,
            });
        }
        if i + 1 < bytes.len() && (bytes[i + 1] == b'!' || bytes[i + 1] == b'?') {
            let end = match html[i + 1..].find('>') {
                Some(off) => i + 1 + off + 1,
                None => html.len(),
            };
            return Some(RawTag {
                start: i,
                end,
                name: String::new(),
                attrs: "",
                closing: false,
                self_closing: true,
            });
        }

        let closing = i + 1 < bytes.len() && bytes[i + 1] == b'/';
        let name_start = if closing { i + 2 } else { i + 1 };
        let mut j = name_start;
        while j < bytes.len() && bytes[j].is_ascii_alphanumeric() {
            j += 1;
        }
        if j == name_start {
            // A lone '<' in text content.
            i += 1;
            continue;
        }
        let name = html[name_start..j].to_ascii_lowercase();

        // Scan to the closing '>' while respecting quoted attribute values.
        let mut k = j;
        let mut quote: Option<u8> = None;
        while k < bytes.len() {
            match quote {
                Some(q) => {
                    if bytes[k] == q {
                        quote = None;
                    }
                }
                None => match bytes[k] {
                    b'"' | b'\'' => quote = Some(bytes[k]),
                    b'>' => break,
                    _ => {}
                },
            }
            k += 1;
        }
        if k >= bytes.len() {
            return None;
        }

        let self_closing = !closing && k > j && bytes[k - 1] == b'/';
        let attrs_end = if self_closing { k - 1 } else { k };

        return Some(RawTag {
            start: i,
            end: k + 1,
            name,
            attrs: html[j..attrs_end].trim(),
            closing,
            self_closing,
        });
    }

    None
}

/// Byte offset where the block opened by a `name` tag at `from` closes,
/// tracking nesting of same-named tags. Unclosed blocks run to end of input.
fn block_end(html: &str, from: usize, name: &str) -> usize {
    let mut depth = 1usize;
    let mut pos = from;
    while let Some(tag) = next_tag(html, pos) {
        pos = tag.end;
        if tag.name != name {
            continue;
        }
        if tag.closing {
            depth -= 1;
            if depth == 0 {
                return tag.start;
            }
        } else if !tag.self_closing {
            depth += 1;
        }
    }
    html.len()
}

/// All elements whose `class` attribute carries every one of `classes`.
pub fn elements_with_classes<'a>(html: &'a str, classes: &[&str]) -> Vec<Element<'a>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(tag) = next_tag(html, pos) {
        pos = tag.end;
        if tag.closing || tag.self_closing {
            continue;
        }
        let list = class_list(tag.attrs);
        if classes.iter().all(|c| list.iter().any(|have| have == c)) {
            let inner_end = block_end(html, tag.end, &tag.name);
            out.push(Element {
                attrs: tag.attrs,
                inner: &html[tag.end..inner_end],
            });
        }
    }
    out
}

/// First element carrying every one of `classes`, if any.
pub fn first_element_with_classes<'a>(html: &'a str, classes: &[&str]) -> Option<Element<'a>> {
    elements_with_classes(html, classes).into_iter().next()
}

/// All elements with the given (case-insensitive) tag name.
pub fn elements_by_tag<'a>(html: &'a str, name: &str) -> Vec<Element<'a>> {
    let name = name.to_ascii_lowercase();
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(tag) = next_tag(html, pos) {
        pos = tag.end;
        if tag.closing || tag.self_closing || tag.name != name {
            continue;
        }
        let inner_end = block_end(html, tag.end, &tag.name);
        out.push(Element {
            attrs: tag.attrs,
            inner: &html[tag.end..inner_end],
        });
    }
    out
}

/// Value of the named attribute (case-insensitive name), entity-decoded.
pub fn attr(attrs: &str, name: &str) -> Option<String> {
    let mut rest = attrs;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            return None;
        }
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let attr_name = &rest[..name_end];
        rest = rest[name_end..].trim_start();

        let mut value = "";
        if let Some(after_eq) = rest.strip_prefix('=') {
            let v = after_eq.trim_start();
            match v.as_bytes().first() {
                Some(&q) if q == b'"' || q == b'\'' => {
                    let v = &v[1..];
                    let end = v.find(q as char).unwrap_or(v.len());
                    value = &v[..end];
                    rest = &v[(end + 1).min(v.len())..];
                }
                _ => {
                    let end = v.find(char::is_whitespace).unwrap_or(v.len());
                    value = &v[..end];
                    rest = &v[end..];
                }
            }
        }

        if !attr_name.is_empty() && attr_name.eq_ignore_ascii_case(name) {
            return Some(decode_entities(value));
        }
    }
}

/// The element's class tokens, in document order.
pub fn class_list(attrs: &str) -> Vec<String> {
    attr(attrs, "class")
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Text content of a fragment: tags stripped, entities decoded,
/// whitespace collapsed and trimmed.
pub fn text(fragment: &str) -> String {
    let mut raw = String::with_capacity(fragment.len());
    let mut cursor = 0;
    let mut pos = 0;
    while let Some(tag) = next_tag(fragment, pos) {
        raw.push_str(&fragment[cursor..tag.start]);
        cursor = tag.end;
        pos = tag.end;
    }
    raw.push_str(&fragment[cursor..]);

    collapse_whitespace(&decode_entities(&raw))
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending = false;
    for c in s.chars() {
        if c.is_whitespace() {
            pending = !out.is_empty();
        } else {
            if pending {
                out.push(' ');
                pending = false;
            }
            out.push(c);
        }
    }
    out
}

/// Decode the named entities that actually occur in listings markup, plus
/// numeric references. Unknown entities pass through literally.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(idx) = rest.find('&') {
        out.push_str(&rest[..idx]);
        rest = &rest[idx..];

        let end = match rest[1..].find(';') {
            Some(off) if off <= 10 => off + 1,
            _ => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };
        let entity = &rest[1..end];
        let replacement = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity.strip_prefix('#').and_then(|num| {
                let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => num.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
            }),
        };
        match replacement {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
