//! Renderer for the bracketed page markup dialect.
//!
//! Supported tags: `[b] [i] [u] [s] [code] [quote] [h1] [h2] [h3]`,
//! `[url]…[/url]`, `[url=…]…[/url]`, `[img]…[/img]`, and `[list]` with
//! `[*]` item markers. Text is HTML-escaped and newlines become `<br>`.
//! Unknown or unbalanced tags are emitted literally.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(/?)([a-zA-Z][a-zA-Z0-9]*|\*)(?:=([^\]\[]*))?\]").expect("valid regex")
});

const CODE_CLOSE: &str = "[/code]";

#[derive(Debug)]
enum Node {
    Text(String),
    Code(String),
    ItemMarker,
    Element {
        tag: String,
        arg: Option<String>,
        children: Vec<Node>,
    },
}

struct Open {
    tag: String,
    arg: Option<String>,
    raw: String,
    children: Vec<Node>,
}

fn is_container(tag: &str) -> bool {
    matches!(
        tag,
        "b" | "i" | "u" | "s" | "quote" | "h1" | "h2" | "h3" | "url" | "img" | "list"
    )
}

/// Render a page body to HTML.
pub fn render(body: &str) -> String {
    let nodes = parse(body);
    let mut out = String::with_capacity(body.len() + body.len() / 4);
    render_nodes(&nodes, &mut out);
    out
}

fn parse(body: &str) -> Vec<Node> {
    let mut root: Vec<Node> = Vec::new();
    let mut stack: Vec<Open> = Vec::new();
    let mut cursor = 0;

    while let Some(caps) = TAG_RE.captures_at(body, cursor) {
        let Some(whole) = caps.get(0) else { break };
        push_text(current(&mut root, &mut stack), &body[cursor..whole.start()]);
        cursor = whole.end();

        let closing = !caps[1].is_empty();
        let tag = caps[2].to_ascii_lowercase();
        let arg = caps.get(3).map(|m| m.as_str().to_string());
        let raw = whole.as_str().to_string();

        if tag == "code" && !closing {
            if let Some(rel) = body[cursor..].to_ascii_lowercase().find(CODE_CLOSE) {
                let code = body[cursor..cursor + rel].to_string();
                current(&mut root, &mut stack).push(Node::Code(code));
                cursor += rel + CODE_CLOSE.len();
            } else {
                push_text(current(&mut root, &mut stack), &raw);
            }
            continue;
        }

        if tag == "*" && !closing {
            if stack.iter().any(|o| o.tag == "list") {
                current(&mut root, &mut stack).push(Node::ItemMarker);
            } else {
                push_text(current(&mut root, &mut stack), &raw);
            }
            continue;
        }

        if !is_container(&tag) {
            push_text(current(&mut root, &mut stack), &raw);
            continue;
        }

        if !closing {
            stack.push(Open {
                tag,
                arg,
                raw,
                children: Vec::new(),
            });
            continue;
        }

        match stack.iter().rposition(|o| o.tag == tag) {
            Some(pos) => {
                // Anything opened after the match was never closed.
                while stack.len() > pos + 1 {
                    if let Some(unclosed) = stack.pop() {
                        let parent = current(&mut root, &mut stack);
                        flatten_into(parent, unclosed);
                    }
                }
                if let Some(open) = stack.pop() {
                    let node = Node::Element {
                        tag: open.tag,
                        arg: open.arg,
                        children: open.children,
                    };
                    current(&mut root, &mut stack).push(node);
                }
            }
            None => push_text(current(&mut root, &mut stack), &raw),
        }
    }

    push_text(current(&mut root, &mut stack), &body[cursor..]);
    while let Some(unclosed) = stack.pop() {
        let parent = current(&mut root, &mut stack);
        flatten_into(parent, unclosed);
    }
    root
}

fn current<'a>(root: &'a mut Vec<Node>, stack: &'a mut [Open]) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(open) => &mut open.children,
        None => root,
    }
}

fn push_text(target: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(existing)) = target.last_mut() {
        existing.push_str(text);
    } else {
        target.push(Node::Text(text.to_string()));
    }
}

fn flatten_into(target: &mut Vec<Node>, open: Open) {
    push_text(target, &open.raw);
    for child in open.children {
        match child {
            Node::Text(text) => push_text(target, &text),
            // Item markers only mean something directly inside a list.
            Node::ItemMarker if open.tag != "list" => target.push(Node::ItemMarker),
            Node::ItemMarker => push_text(target, "[*]"),
            other => target.push(other),
        }
    }
}

fn render_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => push_escaped_text(text, out),
            Node::Code(code) => {
                out.push_str("<pre><code>");
                out.push_str(&escape_html(code));
                out.push_str("</code></pre>");
            }
            Node::ItemMarker => out.push_str("[*]"),
            Node::Element { tag, arg, children } => render_element(tag, arg.as_deref(), children, out),
        }
    }
}

fn render_element(tag: &str, arg: Option<&str>, children: &[Node], out: &mut String) {
    let simple = match tag {
        "b" => Some("strong"),
        "i" => Some("em"),
        "u" => Some("u"),
        "s" => Some("del"),
        "quote" => Some("blockquote"),
        "h1" => Some("h1"),
        "h2" => Some("h2"),
        "h3" => Some("h3"),
        _ => None,
    };
    if let Some(html_tag) = simple {
        out.push('<');
        out.push_str(html_tag);
        out.push('>');
        render_nodes(children, out);
        out.push_str("</");
        out.push_str(html_tag);
        out.push('>');
        return;
    }

    match tag {
        "url" => {
            let href = arg.map(str::to_string).unwrap_or_else(|| plain_text(children));
            let href = href.trim();
            if is_safe_url(href) {
                out.push_str("<a href=\"");
                out.push_str(&escape_html(href));
                out.push_str("\" rel=\"nofollow noopener\">");
                render_nodes(children, out);
                out.push_str("</a>");
            } else {
                render_nodes(children, out);
            }
        }
        "img" => {
            let src = plain_text(children);
            let src = src.trim();
            if is_safe_url(src) {
                out.push_str("<img src=\"");
                out.push_str(&escape_html(src));
                out.push_str("\" alt=\"\">");
            } else {
                push_escaped_text(src, out);
            }
        }
        "list" => render_list(children, out),
        _ => render_nodes(children, out),
    }
}

fn render_list(children: &[Node], out: &mut String) {
    let mut items: Vec<&[Node]> = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, child) in children.iter().enumerate() {
        if matches!(child, Node::ItemMarker) {
            if let Some(s) = start {
                items.push(&children[s..idx]);
            }
            start = Some(idx + 1);
        }
    }
    if let Some(s) = start {
        items.push(&children[s..]);
    }

    out.push_str("<ul>");
    for item in items {
        let mut html = String::new();
        render_nodes(item, &mut html);
        out.push_str("<li>");
        out.push_str(trim_breaks(&html));
        out.push_str("</li>");
    }
    out.push_str("</ul>");
}

fn trim_breaks(html: &str) -> &str {
    let mut s = html.trim();
    loop {
        let before = s;
        s = s.strip_prefix("<br>").unwrap_or(s).trim_start();
        s = s.strip_suffix("<br>").unwrap_or(s).trim_end();
        if s == before {
            return s;
        }
    }
}

fn plain_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) | Node::Code(text) => out.push_str(text),
            Node::ItemMarker => {}
            Node::Element { children, .. } => out.push_str(&plain_text(children)),
        }
    }
    out
}

fn is_safe_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    !url.is_empty()
        && !url.contains('"')
        && (lower.starts_with("http://")
            || lower.starts_with("https://")
            || lower.starts_with("mailto:")
            || (url.starts_with('/') && !url.starts_with("//"))
            || url.starts_with('#'))
}

fn push_escaped_text(text: &str, out: &mut String) {
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push_str("<br>\n");
        }
        out.push_str(&escape_html(line));
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
