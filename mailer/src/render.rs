//! Markdown to e-mail HTML.

use pulldown_cmark::{html, Options, Parser};
use pulldown_cmark_escape::escape_html;

const STYLE: &str = r#"
body {
    font-family: Arial, sans-serif;
    line-height: 1.6;
    color: #333;
    max-width: 800px;
    margin: 0 auto;
    padding: 20px;
}
h1, h2, h3, h4, h5, h6 {
    color: #2c3e50;
    margin-top: 1.5em;
    margin-bottom: 0.5em;
}
a { color: #3498db; text-decoration: none; }
a:hover { text-decoration: underline; }
code {
    background-color: #f8f9fa;
    padding: 2px 4px;
    border-radius: 4px;
    font-family: monospace;
}
pre {
    background-color: #f8f9fa;
    padding: 15px;
    border-radius: 8px;
    overflow-x: auto;
}
blockquote {
    border-left: 4px solid #3498db;
    margin: 0;
    padding-left: 20px;
    color: #666;
}
table { border-collapse: collapse; }
th, td { border: 1px solid #ddd; padding: 6px 10px; }
img { max-width: 100%; height: auto; }
ul, ol { padding-left: 20px; }
li { margin-bottom: 8px; }
strong { color: #2c3e50; }
"#;

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Renders Markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, parser);
    html_output
}

/// Full HTML document for the digest body, styled inline for mail clients.
pub fn render_email_html(title: &str, markdown: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_text(title),
        STYLE,
        markdown_to_html(markdown)
    )
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = escape_html(&mut escaped, text);
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_structure_renders() {
        let html = markdown_to_html(
            "# Newsletter\n## 🚀 Modelos\nTexto com **negrito** e [link](https://example.com).\n",
        );
        assert!(html.contains("<h1>Newsletter</h1>"));
        assert!(html.contains("<h2>🚀 Modelos</h2>"));
        assert!(html.contains("<strong>negrito</strong>"));
        assert!(html.contains("<a href=\"https://example.com\">link</a>"));
    }

    #[test]
    fn test_extensions_enabled() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>old</del>"));

        let html = markdown_to_html("## Perspectivas {#futuro}\n");
        assert!(html.contains("id=\"futuro\""));
    }

    #[test]
    fn test_email_document() {
        let html = render_email_html("Daily <Digest>", "Hello");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Daily &lt;Digest&gt;</title>"));

        let html = render_email_html("R&D \"weekly\"", "x");
        assert!(html.contains("<title>R&amp;D &quot;weekly&quot;</title>"));
        assert!(html.contains("max-width: 800px"));
        assert!(html.contains("<p>Hello</p>"));
    }

    #[test]
    fn test_malformed_markdown_still_renders() {
        let html = markdown_to_html("**unclosed [link](\n# ");
        assert!(!html.is_empty());
    }
}
