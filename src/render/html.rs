use std::fmt::Write;
use crate::aggregator::ProjectDocumentSet;
use crate::client::Outcome;
use super::markdown::summary_block;

const STYLESHEET: &str = r#"
body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
    line-height: 1.6;
    margin: 0;
    display: flex;
}
nav {
    position: sticky;
    top: 0;
    height: 100vh;
    overflow-y: auto;
    min-width: 240px;
    max-width: 300px;
    padding: 20px;
    background-color: #f6f8fa;
    border-right: 1px solid #ddd;
    font-size: 0.9em;
}
nav ul { list-style: none; padding-left: 0; }
nav li { margin: 4px 0; word-break: break-all; }
nav a { color: #2563EB; text-decoration: none; }
nav .failed a { color: #b91c1c; }
nav .skipped a { color: #6b7280; }
main {
    padding: 20px;
    max-width: 800px;
    margin: 0 auto;
    flex: 1;
}
h1 {
    color: #1E3A8A;
    border-bottom: 1px solid #ddd;
    padding-bottom: 0.3em;
}
h2 {
    color: #2563EB;
    margin-top: 1.5em;
}
h3 {
    color: #3B82F6;
}
pre {
    background-color: #f6f8fa;
    border-radius: 6px;
    padding: 16px;
    overflow: auto;
}
code {
    font-family: "SFMono-Regular", Consolas, "Liberation Mono", Menlo, monospace;
    background-color: rgba(175, 184, 193, 0.2);
    padding: 0.2em 0.4em;
    border-radius: 6px;
    font-size: 85%;
}
pre code {
    background-color: transparent;
    padding: 0;
}
blockquote {
    border-left: 4px solid #ddd;
    padding-left: 16px;
    color: #57606a;
    margin-left: 0;
}
table {
    border-collapse: collapse;
    width: 100%;
    margin-bottom: 16px;
}
th, td {
    border: 1px solid #ddd;
    padding: 8px 16px;
    text-align: left;
}
th {
    background-color: #f6f8fa;
}
.markdown-source { display: none; }
@media print {
    nav { display: none; }
    body { font-size: 12pt; }
    pre, code { font-size: 10pt; }
}
"#;

const SCRIPT: &str = r#"
<script src="https://cdn.jsdelivr.net/npm/marked/marked.min.js"></script>
<script src="https://cdn.jsdelivr.net/npm/mermaid/dist/mermaid.min.js"></script>
<script>
document.querySelectorAll('pre.markdown-source').forEach(function (source) {
    var target = document.getElementById(source.dataset.target);
    if (target && window.marked) {
        target.innerHTML = marked.parse(source.textContent);
    } else if (target) {
        target.textContent = source.textContent;
    }
});
if (window.mermaid) {
    mermaid.initialize({ startOnLoad: true });
}
</script>
"#;

/// Escapes text for HTML element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn markdown_block(out: &mut String, id: &str, markdown: &str) {
    let _ = write!(
        out,
        "<div id=\"{id}\"></div>\n<pre class=\"markdown-source\" data-target=\"{id}\">{}</pre>\n",
        escape(markdown)
    );
}

/// Self-contained page: file index sidebar, Markdown rendered in the browser
pub fn render(set: &ProjectDocumentSet) -> String {
    let title = format!("{} Documentation", set.project_name);
    let mut nav = String::from("<nav>\n<h3>Files</h3>\n<ul>\n");
    let mut body = String::new();

    let _ = writeln!(body, "<h1>{}</h1>", escape(&title));
    markdown_block(&mut body, "summary", &summary_block(set));

    if let Some(structure) = &set.directory_structure {
        nav.push_str("<li><a href=\"#structure\">Directory structure</a></li>\n");
        body.push_str("<section id=\"structure\">\n");
        markdown_block(&mut body, "structure-tree", &structure.ascii);
        let _ = writeln!(body, "<pre class=\"mermaid\">{}</pre>", escape(&structure.mermaid));
        body.push_str("</section>\n");
    }

    if let Some(overview) = &set.overview {
        nav.push_str("<li><a href=\"#overview\">Project overview</a></li>\n");
        body.push_str("<section id=\"overview\">\n<h1>Project Overview</h1>\n");
        markdown_block(&mut body, "overview-body", overview);
        body.push_str("</section>\n");
    }

    for (i, result) in set.results.iter().enumerate() {
        let anchor = format!("file-{}", i + 1);
        let _ = writeln!(
            nav,
            "<li class=\"{}\"><a href=\"#{}\">{}</a></li>",
            result.status_str(),
            anchor,
            escape(&result.path)
        );
        let _ = writeln!(
            body,
            "<section id=\"{}\">\n<h2><code>{}</code></h2>",
            anchor,
            escape(&result.path)
        );
        match &result.outcome {
            Outcome::Success { documentation, .. } => {
                markdown_block(&mut body, &format!("{}-body", anchor), documentation);
            }
            Outcome::Failed { reason, message } => {
                let _ = writeln!(
                    body,
                    "<blockquote>Documentation failed ({}): {}</blockquote>",
                    reason,
                    escape(message)
                );
            }
            Outcome::Skipped { cause } => {
                let _ = writeln!(body, "<blockquote>Skipped: {}</blockquote>", cause.as_str());
            }
        }
        body.push_str("</section>\n");
    }
    nav.push_str("</ul>\n</nav>\n");

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}<main>\n{}</main>\n{}</body>\n</html>\n",
        escape(&title),
        STYLESHEET,
        nav,
        body,
        SCRIPT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::fixtures::sample_set;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&'</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn test_page_contents() {
        let html = render(&sample_set());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>demo Documentation</title>"));
        assert!(html.contains("<a href=\"#file-1\">src/main.rs</a>"));
        assert!(html.contains("<li class=\"failed\"><a href=\"#file-2\">src/lib.rs</a></li>"));
        assert!(html.contains("<pre class=\"mermaid\">graph TD"));
        assert!(html.contains("Skipped: non_text_content"));
    }

    #[test]
    fn test_documentation_is_escaped() {
        let html = render(&sample_set());
        assert!(html.contains("Entry point &lt;b&gt;bold&lt;/b&gt;."));
        assert!(!html.contains("<b>bold</b>"));
    }
}
