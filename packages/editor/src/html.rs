//! HTML rendering of a whole state, used for full rebuilds and debugging.

use crate::node::{Format, Node, TextNode};
use crate::state::NodeStore;
use crate::NodeKey;

/// Options for HTML rendering
#[derive(Debug, Clone)]
pub struct HtmlOptions {
    /// One block per line, indented by depth
    pub pretty: bool,
    /// Indentation string
    pub indent: String,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: "  ".to_string(),
        }
    }
}

struct Context {
    options: HtmlOptions,
    depth: usize,
    buffer: String,
}

impl Context {
    fn new(options: HtmlOptions) -> Self {
        Self {
            options,
            depth: 0,
            buffer: String::new(),
        }
    }

    fn add_line(&mut self, text: &str) {
        if self.options.pretty {
            for _ in 0..self.depth {
                self.buffer.push_str(&self.options.indent);
            }
        }
        self.buffer.push_str(text);
        if self.options.pretty {
            self.buffer.push('\n');
        }
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        if self.depth > 0 {
            self.depth -= 1;
        }
    }
}

/// Render the document as compact HTML
pub fn render_html<S: NodeStore>(state: &S) -> String {
    render_html_with(state, HtmlOptions::default())
}

pub fn render_html_with<S: NodeStore>(state: &S, options: HtmlOptions) -> String {
    let mut ctx = Context::new(options);
    for child in state.children(state.root()) {
        render_node(state, child, &mut ctx);
    }
    ctx.buffer
}

fn render_node<S: NodeStore>(state: &S, key: NodeKey, ctx: &mut Context) {
    match state.node(key) {
        Some(Node::Text(text)) => ctx.add_line(&render_run(text)),
        Some(Node::Element(element)) => {
            let tag = html_tag(&element.tag);
            let inline_only = state
                .children(key)
                .all(|child| matches!(state.node(child), Some(Node::Text(_))));

            if inline_only {
                let runs: String = state
                    .children(key)
                    .filter_map(|child| state.node(child).and_then(Node::as_text))
                    .map(render_run)
                    .collect();
                ctx.add_line(&format!("<{tag}>{runs}</{tag}>"));
            } else {
                ctx.add_line(&format!("<{tag}>"));
                ctx.indent();
                for child in state.children(key) {
                    render_node(state, child, ctx);
                }
                ctx.dedent();
                ctx.add_line(&format!("</{tag}>"));
            }
        }
        Some(Node::Root(_)) | None => {}
    }
}

/// HTML element for a block tag
pub fn html_tag(tag: &str) -> &'static str {
    match tag {
        "paragraph" => "p",
        "heading" => "h1",
        "quote" => "blockquote",
        "list" => "ul",
        "listitem" => "li",
        _ => "div",
    }
}

fn format_tag(format: Format) -> &'static str {
    match format {
        Format::Bold => "strong",
        Format::Italic => "em",
        Format::Underline => "u",
        Format::Strikethrough => "s",
        Format::Code => "code",
        Format::Subscript => "sub",
        Format::Superscript => "sup",
    }
}

/// A text run wrapped in its format tags, outermost first
fn render_run(text: &TextNode) -> String {
    let mut html = String::new();
    for format in text.format.iter() {
        html.push('<');
        html.push_str(format_tag(format));
        html.push('>');
    }
    html.push_str(&escape_html(&text.text));
    let closing: Vec<Format> = text.format.iter().collect();
    for format in closing.into_iter().rev() {
        html.push_str("</");
        html.push_str(format_tag(format));
        html.push('>');
    }
    html
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
