//! Markdown-ish agent output to Telegram HTML.
//!
//! Only the constructs agents actually emit are recognised: fenced blocks,
//! inline code, `**bold**`, `*bold*` (Telegram's own markdown flavour, used
//! by trace lines), `~~strike~~` and `[text](url)`. A delimiter without a
//! closing partner is kept verbatim so half-formatted text still reads.

use std::{iter::Peekable, str::Chars};

type Cursor<'a> = Peekable<Chars<'a>>;

/// Render `text` as Telegram HTML. The result is always balanced.
pub fn to_telegram_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '`' if starts_with(&chars, "```") => {
                advance(&mut chars, 3);
                let mut lookahead = chars.clone();
                let lang = take_line(&mut lookahead);
                match take_until(&mut lookahead, "```") {
                    Some(block) => {
                        chars = lookahead;
                        push_pre(&mut out, lang.trim(), &block);
                    },
                    None => out.push_str("```"),
                }
            },
            '`' => {
                chars.next();
                match take_until(&mut chars, "`") {
                    Some(code) => wrap(&mut out, "code", &escape_html(&code)),
                    None => out.push('`'),
                }
            },
            '*' if starts_with(&chars, "**") => {
                advance(&mut chars, 2);
                delimited(&mut out, &mut chars, "**", "b");
            },
            '*' => {
                chars.next();
                delimited(&mut out, &mut chars, "*", "b");
            },
            '~' if starts_with(&chars, "~~") => {
                advance(&mut chars, 2);
                delimited(&mut out, &mut chars, "~~", "s");
            },
            '[' => {
                chars.next();
                link(&mut out, &mut chars);
            },
            _ => {
                chars.next();
                push_escaped_char(&mut out, ch);
            },
        }
    }
    out
}

/// Escape the three characters Telegram's HTML parser cares about.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(&mut out, text);
    out
}

fn delimited(out: &mut String, chars: &mut Cursor<'_>, delim: &str, tag: &str) {
    let mut lookahead = chars.clone();
    match take_until(&mut lookahead, delim) {
        Some(inner) if !inner.is_empty() && !inner.contains('\n') => {
            *chars = lookahead;
            wrap(out, tag, &to_telegram_html(&inner));
        },
        _ => push_escaped(out, delim),
    }
}

fn link(out: &mut String, chars: &mut Cursor<'_>) {
    let mut lookahead = chars.clone();
    let parsed = take_until(&mut lookahead, "](")
        .and_then(|label| take_until(&mut lookahead, ")").map(|url| (label, url)));
    match parsed {
        Some((label, url)) if !url.contains(char::is_whitespace) => {
            *chars = lookahead;
            out.push_str("<a href=\"");
            push_escaped(out, &url.replace('"', "%22"));
            out.push_str("\">");
            out.push_str(&to_telegram_html(&label));
            out.push_str("</a>");
        },
        _ => out.push('['),
    }
}

fn push_pre(out: &mut String, lang: &str, block: &str) {
    let body = escape_html(block.strip_prefix('\n').unwrap_or(block));
    let plain_lang = lang
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+');
    if lang.is_empty() || !plain_lang {
        wrap(out, "pre", &body);
    } else {
        out.push_str("<pre><code class=\"language-");
        out.push_str(lang);
        out.push_str("\">");
        out.push_str(&body);
        out.push_str("</code></pre>");
    }
}

fn wrap(out: &mut String, tag: &str, inner: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(inner);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        push_escaped_char(out, ch);
    }
}

fn push_escaped_char(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        other => out.push(other),
    }
}

fn starts_with(chars: &Cursor<'_>, needle: &str) -> bool {
    let mut lookahead = chars.clone();
    needle.chars().all(|c| lookahead.next() == Some(c))
}

fn advance(chars: &mut Cursor<'_>, n: usize) {
    for _ in 0..n {
        chars.next();
    }
}

/// Consume the rest of the current line, including the newline.
fn take_line(chars: &mut Cursor<'_>) -> String {
    let mut line = String::new();
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
        line.push(c);
    }
    line
}

/// Consume up to and including `delim`, returning what came before it.
/// Leaves `chars` untouched and returns `None` when `delim` never appears.
fn take_until(chars: &mut Cursor<'_>, delim: &str) -> Option<String> {
    let mut lookahead = chars.clone();
    let mut inner = String::new();
    loop {
        if starts_with(&lookahead, delim) {
            advance(&mut lookahead, delim.chars().count());
            *chars = lookahead;
            return Some(inner);
        }
        inner.push(lookahead.next()?);
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("plain text", "plain text")]
    #[case("a < b && c > d", "a &lt; b &amp;&amp; c &gt; d")]
    #[case("**bold** move", "<b>bold</b> move")]
    #[case("🧠 *Thought* (planner): hm", "🧠 <b>Thought</b> (planner): hm")]
    #[case("use `x < 1` here", "use <code>x &lt; 1</code> here")]
    #[case("~~old~~ new", "<s>old</s> new")]
    #[case("see [docs](https://example.com/a)", "see <a href=\"https://example.com/a\">docs</a>")]
    fn renders_inline_constructs(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_telegram_html(input), expected);
    }

    #[rstest]
    #[case("2 * 3 = 6", "2 * 3 = 6")]
    #[case("unclosed `tick", "unclosed `tick")]
    #[case("[not a link]", "[not a link]")]
    #[case("**half bold", "**half bold")]
    #[case("```\nno end", "```\nno end")]
    fn unmatched_delimiters_stay_literal(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(to_telegram_html(input), expected);
    }

    #[test]
    fn fenced_block_with_language() {
        let html = to_telegram_html("before\n```rust\nfn main() {}\n```\nafter");
        assert_eq!(
            html,
            "before\n<pre><code class=\"language-rust\">fn main() {}\n</code></pre>\nafter"
        );
    }

    #[test]
    fn fenced_block_content_is_not_formatted() {
        let html = to_telegram_html("```\n**x** <y>\n```");
        assert_eq!(html, "<pre>**x** &lt;y&gt;\n</pre>");
    }

    #[test]
    fn tool_trace_args_survive() {
        let html = to_telegram_html(r#"🔧 *Tool Call* (a): `search` with args: `{"q":"a*b"}`"#);
        assert_eq!(
            html,
            r#"🔧 <b>Tool Call</b> (a): <code>search</code> with args: <code>{"q":"a*b"}</code>"#
        );
    }

    #[test]
    fn nested_bold_inside_link_label() {
        assert_eq!(
            to_telegram_html("[**hi**](http://x)"),
            "<a href=\"http://x\"><b>hi</b></a>"
        );
    }
}
