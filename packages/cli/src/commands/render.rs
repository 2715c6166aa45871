use super::load_document;
use crate::config::Config;
use anyhow::Result;
use clap::{Args, ValueEnum};
use scribe_editor::{render_html_with, to_json, HtmlOptions, NodeStore, State};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Serialized document (.json)
    pub input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = RenderFormat::Html)]
    pub format: RenderFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderFormat {
    Html,
    Json,
    Text,
}

pub fn render(args: RenderArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let state = load_document(&args.input)?;
    println!("{}", render_document(&state, args.format, config.pretty)?);
    Ok(())
}

pub fn render_document(state: &State, format: RenderFormat, pretty: bool) -> Result<String> {
    let output = match format {
        RenderFormat::Html => render_html_with(
            state,
            HtmlOptions {
                pretty,
                ..HtmlOptions::default()
            },
        ),
        RenderFormat::Json => to_json(state, pretty)?,
        RenderFormat::Text => state.text_content(),
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_editor::from_json;

    fn document() -> State {
        from_json(
            r#"{ "key": 1, "type": "root", "children": [
                { "key": 2, "type": "element", "tag": "quote", "children": [
                    { "key": 3, "type": "text", "text": "Be " },
                    { "key": 4, "type": "text", "text": "brief", "format": ["underline"] }
                ] },
                { "key": 5, "type": "element", "tag": "paragraph", "children": [
                    { "key": 6, "type": "text", "text": "End" }
                ] }
            ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_html() {
        let html = render_document(&document(), RenderFormat::Html, false).unwrap();
        assert_eq!(html, "<blockquote>Be <u>brief</u></blockquote><p>End</p>");
    }

    #[test]
    fn test_render_text() {
        let text = render_document(&document(), RenderFormat::Text, false).unwrap();
        assert_eq!(text, "Be brief\nEnd");
    }

    #[test]
    fn test_render_json_round_trips() {
        let state = document();
        let json = render_document(&state, RenderFormat::Json, true).unwrap();
        assert_eq!(from_json(&json).unwrap(), state);
    }
}
