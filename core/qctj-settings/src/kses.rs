//! Allowed-tag HTML filter for free-text settings.
//!
//! Tags outside the allow-list are dropped (their inner text is kept),
//! attributes outside a tag's allow-list are dropped, and `href`/`src`
//! values must use an allowed protocol. Comments are removed.

const ALLOWED_TAGS: &[(&str, &[&str])] = &[
    ("p", &["class", "id"]),
    ("span", &["class", "id"]),
    ("a", &["href", "target", "title", "class", "id"]),
    ("strong", &[]),
    ("em", &[]),
    ("br", &[]),
    ("img", &["src", "title", "alt", "id"]),
    ("div", &["class", "id"]),
    ("ul", &["class", "id"]),
    ("li", &["class", "id"]),
];

const ALLOWED_PROTOCOLS: &[&str] = &["http", "https", "mailto", "tel"];

enum Tag {
    Keep(String),
    Drop,
    /// `<` that does not open a tag, e.g. `a < b`.
    Text,
}

pub fn filter_allowed_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        if let Some(comment) = after.strip_prefix("!--") {
            rest = comment.find("-->").map_or("", |end| &comment[end + 3..]);
            continue;
        }

        let Some(end) = after.find('>') else {
            out.push_str("&lt;");
            rest = after;
            continue;
        };

        match render_tag(&after[..end]) {
            Tag::Keep(tag) => {
                out.push_str(&tag);
                rest = &after[end + 1..];
            }
            Tag::Drop => rest = &after[end + 1..],
            Tag::Text => {
                out.push_str("&lt;");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn allowed_attributes(tag: &str) -> Option<&'static [&'static str]> {
    ALLOWED_TAGS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, attrs)| *attrs)
}

fn render_tag(raw: &str) -> Tag {
    let (closing, body) = match raw.strip_prefix('/') {
        Some(body) => (true, body.trim_start()),
        None => (false, raw),
    };

    let name_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    if name_len == 0 {
        return if closing { Tag::Drop } else { Tag::Text };
    }

    let name = body[..name_len].to_ascii_lowercase();
    let Some(allowed) = allowed_attributes(&name) else {
        return Tag::Drop;
    };
    if closing {
        return Tag::Keep(format!("</{name}>"));
    }

    let mut tag = format!("<{name}");
    for (attr, value) in parse_attributes(&body[name_len..]) {
        if allowed.contains(&attr.as_str()) && protocol_allowed(&attr, &value) {
            tag.push_str(&format!(" {attr}=\"{}\"", value.replace('"', "&quot;")));
        }
    }
    if body.trim_end().ends_with('/') {
        tag.push_str(" /");
    }
    tag.push('>');
    Tag::Keep(tag)
}

fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    let chars: Vec<char> = raw.chars().collect();
    let len = chars.len();
    let mut attrs = Vec::new();
    let mut i = 0;

    while i < len {
        while i < len && (chars[i].is_whitespace() || chars[i] == '/') {
            i += 1;
        }
        if i >= len {
            break;
        }

        let start = i;
        while i < len && !chars[i].is_whitespace() && chars[i] != '=' && chars[i] != '/' {
            i += 1;
        }
        let name = chars[start..i].iter().collect::<String>().to_ascii_lowercase();
        while i < len && chars[i].is_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if i < len && chars[i] == '=' {
            i += 1;
            while i < len && chars[i].is_whitespace() {
                i += 1;
            }
            if i < len && (chars[i] == '"' || chars[i] == '\'') {
                let quote = chars[i];
                i += 1;
                let value_start = i;
                while i < len && chars[i] != quote {
                    i += 1;
                }
                value = chars[value_start..i].iter().collect();
                i += 1;
            } else {
                let value_start = i;
                while i < len && !chars[i].is_whitespace() {
                    i += 1;
                }
                value = chars[value_start..i].iter().collect();
            }
        }

        if !name.is_empty() {
            attrs.push((name, value));
        }
    }
    attrs
}

fn protocol_allowed(attr: &str, value: &str) -> bool {
    if attr != "href" && attr != "src" {
        return true;
    }
    // Browsers decode references and drop tab/newline before reading the scheme.
    let value: String = decode_references(value)
        .chars()
        .filter(|c| !c.is_ascii_control())
        .collect::<String>()
        .trim()
        .to_ascii_lowercase();
    match value.find(':') {
        Some(colon) => {
            let scheme = &value[..colon];
            scheme.contains(['/', '?', '#']) || ALLOWED_PROTOCOLS.contains(&scheme)
        }
        None => true,
    }
}

fn decode_references(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match decode_reference(after) {
            Some((ch, used)) => {
                out.push(ch);
                rest = &after[used..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decodes one reference following `&`. Returns the character and the
/// number of bytes consumed. Numeric references may omit the `;`.
fn decode_reference(after: &str) -> Option<(char, usize)> {
    if let Some(number) = after.strip_prefix('#') {
        let (radix, start) = if number.starts_with(['x', 'X']) {
            (16, 2)
        } else {
            (10, 1)
        };
        let digits = &after[start..];
        let len = digits
            .find(|c: char| !c.is_digit(radix))
            .unwrap_or(digits.len());
        if len == 0 {
            return None;
        }
        let ch = u32::from_str_radix(&digits[..len], radix)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        let used = start + len + usize::from(digits[len..].starts_with(';'));
        return Some((ch, used));
    }

    let len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    if !after[len..].starts_with(';') {
        return None;
    }
    let ch = match &after[..len] {
        "colon" => ':',
        "Tab" => '\t',
        "NewLine" => '\n',
        "amp" => '&',
        "sol" => '/',
        "quest" => '?',
        "num" => '#',
        "lpar" => '(',
        "rpar" => ')',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        _ => return None,
    };
    Some((ch, len + 1))
}
