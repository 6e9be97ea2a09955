//! HTML encoding of interpolated text

/// HTML-escape `text`, leaving existing character references intact.
///
/// Replaces `&`, `<`, `>`, `"` and newline with `&amp;`, `&lt;`, `&gt;`,
/// `&quot;` and `&#10;`. An ampersand that already starts a well-formed
/// reference (`&amp;`, `&#38;`, `&#x26;`) is copied as-is, so encoding is
/// idempotent on already-escaped input.
///
/// # Example
///
/// ```
/// use stache::encode::escape_html;
///
/// assert_eq!(escape_html("<b>"), "&lt;b&gt;");
/// assert_eq!(escape_html("&amp;"), "&amp;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_html_into(text, &mut out);
    out
}

/// HTML-escape `text`, appending to `out`.
pub fn escape_html_into(text: &str, out: &mut String) {
    let mut last = 0;
    for (i, b) in text.bytes().enumerate() {
        let replacement = match b {
            b'&' if is_reference(&text[i + 1..]) => continue,
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            b'\n' => "&#10;",
            _ => continue,
        };
        out.push_str(&text[last..i]);
        out.push_str(replacement);
        last = i + 1;
    }
    out.push_str(&text[last..]);
}

/// Reverse [`escape_html`] on rendered text.
///
/// Decodes `&amp;`, `&lt;`, `&gt;`, `&quot;` and numeric references. Other
/// named references are left as written.
///
/// # Example
///
/// ```
/// use stache::encode::unescape_html;
///
/// assert_eq!(unescape_html("&lt;b&gt; &#10;&#x41;"), "<b> \nA");
/// ```
pub fn unescape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        match decode_reference(rest) {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
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

/// Decode the reference at the start of `text` into a character and the
/// number of bytes it spans.
fn decode_reference(text: &str) -> Option<(char, usize)> {
    let end = text.find(';')?;
    let body = &text[1..end];
    let c = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        _ => {
            let code = match body.strip_prefix('#')? {
                hex if hex.starts_with(|c| c == 'x' || c == 'X') => u32::from_str_radix(&hex[1..], 16).ok()?,
                dec => dec.parse().ok()?,
            };
            char::from_u32(code)?
        }
    };
    Some((c, end + 1))
}

/// Whether `rest` (the text after an `&`) begins with `name;`, `#digits;`
/// or `#xhex;`.
fn is_reference(rest: &str) -> bool {
    let bytes = rest.as_bytes();
    let (body, valid): (&[u8], fn(&u8) -> bool) = match bytes {
        [b'#', b'x' | b'X', tail @ ..] => (tail, u8::is_ascii_hexdigit),
        [b'#', tail @ ..] => (tail, u8::is_ascii_digit),
        _ => (bytes, u8::is_ascii_alphanumeric),
    };
    let len = body.iter().take_while(|&b| valid(b)).count();
    len > 0 && body.get(len) == Some(&b';')
}
