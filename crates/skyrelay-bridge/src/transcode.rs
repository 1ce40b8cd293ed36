//! Conversion between the remote service's rich-text markup and IRC
//! formatting codes.
//!
//! Remote markup is HTML-like. Elements such as bold text, mentions or
//! emoticons may carry `raw_pre`/`raw_post` attributes holding their
//! canonical plain-text rendering; those literals are emitted verbatim and
//! every other tag is stripped, keeping the inner text.

use parking_lot::Mutex;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// IRC bold toggle.
pub const IRC_BOLD: char = '\x02';
/// IRC colour prefix.
pub const IRC_COLOR: char = '\x03';
/// IRC italic toggle.
pub const IRC_ITALIC: char = '\x1d';
/// IRC reset of all formatting.
pub const IRC_RESET: char = '\x0f';

#[allow(clippy::expect_used)]
static BOLD_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x02(.*?)(?:\x02|\x0f|$)").expect("bold pattern is valid"));

#[allow(clippy::expect_used)]
static ITALIC_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x1d(.*?)(?:\x1d|\x0f|$)").expect("italic pattern is valid"));

#[allow(clippy::expect_used)]
static FORMATTING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\x03(?:[0-9]{1,2}(?:,[0-9]{1,2})?)?|[\x02\x0f\x11\x16\x1d\x1e\x1f]")
        .expect("formatting pattern is valid")
});

/// Remote bold markup around `inner`.
pub fn bold(inner: &str) -> String {
    format!(r#"<b raw_pre="*" raw_post="*">{inner}</b>"#)
}

/// Remote italic markup around `inner`.
pub fn italic(inner: &str) -> String {
    format!(r#"<i raw_pre="_" raw_post="_">{inner}</i>"#)
}

/// Escapes the characters that are special in remote markup.
pub fn escape_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Removes every IRC formatting code (colours included).
pub fn strip_formatting(s: &str) -> String {
    FORMATTING.replace_all(s, "").into_owned()
}

/// Converts IRC-formatted text to remote markup.
///
/// Bold and italic spans become remote markup; a span ends at its toggle
/// code, at a reset code or at the end of the line. Any other formatting is
/// dropped.
pub fn text_to_markup(s: &str) -> String {
    let escaped = escape_markup(s);
    let with_bold = BOLD_SPAN.replace_all(&escaped, |caps: &Captures<'_>| bold(&caps[1]));
    let with_italic =
        ITALIC_SPAN.replace_all(&with_bold, |caps: &Captures<'_>| italic(&caps[1]));
    strip_formatting(&with_italic)
}

/// Converts remote markup to plain IRC text.
pub fn markup_to_text(markup: &str) -> String {
    let mut converter = MarkupToText::default();
    converter.feed(markup);
    converter.finish()
}

/// Streaming markup walker.
///
/// Open tags are kept on a stack together with their pending `raw_post`
/// literal, so a close tag emits the literal of the element it actually
/// closes even when intermediate tags were left open.
#[derive(Default)]
struct MarkupToText {
    out: String,
    stack: Vec<(String, Option<String>)>,
}

impl MarkupToText {
    fn feed(&mut self, markup: &str) {
        let mut rest = markup;
        while let Some(pos) = rest.find('<') {
            self.push_text(&rest[..pos]);
            rest = &rest[pos..];
            rest = self.consume_markup(rest);
        }
        self.push_text(rest);
    }

    fn finish(self) -> String {
        self.out
    }

    /// Handles the construct starting at `rest` (which begins with `<`) and
    /// returns what follows it.
    fn consume_markup<'a>(&mut self, rest: &'a str) -> &'a str {
        if let Some(comment) = rest.strip_prefix("<!--") {
            return match comment.find("-->") {
                Some(end) => &comment[end + 3..],
                None => "",
            };
        }

        let opens_tag = rest[1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        let end = if opens_tag { find_tag_end(rest) } else { None };
        let Some(end) = end else {
            // A bare or unterminated `<` is literal text.
            self.out.push('<');
            return &rest[1..];
        };
        let body = &rest[1..end];
        let after = &rest[end + 1..];

        if let Some(name) = body.strip_prefix('/') {
            let name = name.trim().to_ascii_lowercase();
            if !name.is_empty() {
                self.end_tag(&name);
            }
        } else if body.starts_with(|c: char| c.is_ascii_alphabetic()) {
            let self_closing = body.ends_with('/');
            let body = body.strip_suffix('/').unwrap_or(body);
            let (name, attrs) = parse_tag(body);
            self.start_tag(&name, &attrs);
            if self_closing {
                self.end_tag(&name);
            }
        }
        // Anything else (declarations, processing instructions) carries no text.
        after
    }

    fn start_tag(&mut self, name: &str, attrs: &[(String, String)]) {
        let raw = |key: &str| {
            attrs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        match raw("raw_pre") {
            Some(pre) => {
                self.push_literal(&pre);
                self.stack
                    .push((name.to_string(), Some(raw("raw_post").unwrap_or_default())));
            }
            None => {
                if name == "br" {
                    self.out.push(' ');
                }
                self.stack.push((name.to_string(), None));
            }
        }
    }

    /// Pops open tags until one named `name` is closed. An unmatched close
    /// tag empties the stack.
    fn end_tag(&mut self, name: &str) {
        while let Some((open, raw_post)) = self.stack.pop() {
            if open == name {
                if let Some(post) = raw_post {
                    self.push_literal(&post);
                }
                return;
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        let decoded = decode_entities(text);
        self.push_literal(&decoded);
    }

    /// Appends already decoded text. Line breaks become spaces so a remote
    /// message can never span several local lines.
    fn push_literal(&mut self, text: &str) {
        self.out
            .extend(text.chars().map(|c| if c == '\r' || c == '\n' { ' ' } else { c }));
    }
}

/// Index of the `>` closing the tag at the start of `s`, skipping quoted
/// attribute values.
fn find_tag_end(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            (None, '<') => return None,
            _ => {}
        }
    }
    None
}

/// Splits a start-tag body into its lowercased name and attributes.
fn parse_tag(body: &str) -> (String, Vec<(String, String)>) {
    let name_end = body
        .find(|c: char| c.is_whitespace())
        .unwrap_or(body.len());
    let name = body[..name_end].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut rest = body[name_end..].trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_ascii_lowercase();
        rest = rest[key_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let inner = &after_eq[1..];
                    let close = inner.find(q).unwrap_or(inner.len());
                    rest = inner.get(close + 1..).unwrap_or("");
                    decode_entities(&inner[..close])
                }
                _ => {
                    let end = after_eq
                        .find(char::is_whitespace)
                        .unwrap_or(after_eq.len());
                    rest = &after_eq[end..];
                    decode_entities(&after_eq[..end])
                }
            }
        } else {
            String::new()
        };

        if !key.is_empty() {
            attrs.push((key, value));
        }
        rest = rest.trim_start();
    }
    (name, attrs)
}

/// Decodes named and numeric character references. Unknown references are
/// left untouched.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
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

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Text converter with a single-entry cache for the IRC-to-remote
/// direction, where identical sends (fan-out, retries) repeat.
#[derive(Default)]
pub struct Transcoder {
    last_outbound: Mutex<Option<(String, String)>>,
}

impl Transcoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// [`text_to_markup`], answering repeated inputs from the cache.
    pub fn to_remote(&self, text: &str) -> String {
        let mut last = self.last_outbound.lock();
        if let Some((input, output)) = last.as_ref() {
            if input == text {
                return output.clone();
            }
        }
        let output = text_to_markup(text);
        *last = Some((text.to_string(), output.clone()));
        output
    }

    /// [`markup_to_text`].
    pub fn to_local(&self, markup: &str) -> String {
        markup_to_text(markup)
    }
}
