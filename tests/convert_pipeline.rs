use std::sync::Arc;

use mdpress::application::convert::{ConvertService, ConvertTarget};
use mdpress::application::render::{ComrakRenderService, DiagramRenderer, RenderError};
use mdpress::application::style::preview_text;
use mdpress::domain::catalog::TemplateCatalog;
use mdpress_api_types::ConvertRequest;

const ARTICLE: &str = "# Release notes\n\nInline $a_1 * b_2$ math and *emphasis*.\n\n$$\nE = mc^2\n$$\n\n```rust\nfn main() {}\n```\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n---\n\n> quoted\n";

struct StaticDiagrams;

impl DiagramRenderer for StaticDiagrams {
    fn render_svg(&self, source: &str) -> Result<String, RenderError> {
        if source.contains("broken") {
            return Err(RenderError::Diagram {
                message: "syntax error".to_string(),
            });
        }
        Ok("<svg id=\"static\"></svg>".to_string())
    }
}

fn service(diagrams: Option<Arc<dyn DiagramRenderer>>) -> ConvertService {
    ConvertService::new(
        Arc::new(ComrakRenderService::with_diagram_renderer(diagrams)),
        Arc::new(TemplateCatalog::builtin().expect("builtin catalog")),
    )
}

#[test]
fn math_survives_markdown_emphasis_rules() {
    let conversion = service(None)
        .convert(ConvertTarget::Wechat, &ConvertRequest::new(ARTICLE))
        .expect("converts");

    assert_eq!(conversion.degraded, 0);
    assert!(conversion.html.contains("katex-inline"));
    assert!(conversion.html.contains("katex-block"));
    // Only the prose emphasis becomes <em>; the `*` inside the formula does not.
    assert_eq!(conversion.html.matches("<em").count(), 1);
}

#[test]
fn inlined_output_styles_every_known_tag_once() {
    let conversion = service(None)
        .convert(ConvertTarget::Wechat, &ConvertRequest::new(ARTICLE))
        .expect("converts");

    for tag in ["<h1 ", "<table ", "<th ", "<td ", "<blockquote ", "<hr "] {
        let start = conversion.html.find(tag).unwrap_or_else(|| panic!("{tag} present"));
        let end = start + conversion.html[start..].find('>').expect("tag closes");
        assert_eq!(
            conversion.html[start..end].matches("style=").count(),
            1,
            "{tag} has a single style attribute"
        );
    }
    assert!(!conversion.html.contains("<style"));
}

#[test]
fn highlighted_code_keeps_language_marker() {
    let conversion = service(None)
        .convert(ConvertTarget::Html, &ConvertRequest::new(ARTICLE))
        .expect("converts");

    assert!(conversion.html.contains("data-language=\"rust\""));
    assert!(conversion.html.contains("<style"));
}

#[test]
fn email_document_is_table_based() {
    let conversion = service(None)
        .convert(ConvertTarget::Email, &ConvertRequest::new(ARTICLE))
        .expect("converts");

    assert!(conversion.html.starts_with("<!DOCTYPE html>"));
    assert!(conversion.html.contains("role=\"presentation\""));
    assert!(conversion.html.contains("Release notes"));
}

#[test]
fn failed_diagram_degrades_without_failing_document() {
    let markdown = "before\n\n```mermaid\ngraph TD; broken\n```\n\n```mermaid\ngraph TD; A-->B\n```\n\nafter";
    let conversion = service(Some(Arc::new(StaticDiagrams)))
        .convert(ConvertTarget::Html, &ConvertRequest::new(markdown))
        .expect("converts");

    assert_eq!(conversion.degraded, 1);
    assert!(conversion.html.contains("[diagram error:"));
    assert!(conversion.html.contains("<svg id=\"static\"></svg>"));
    assert!(conversion.html.contains("before"));
    assert!(conversion.html.contains("after"));
}

#[test]
fn nested_mermaid_examples_render_as_code() {
    let markdown = "~~~text\n```mermaid\ngraph TD\n```\n~~~\n\n````markdown\n```mermaid\ngraph LR\n```\n````\n";
    let conversion = service(Some(Arc::new(StaticDiagrams)))
        .convert(ConvertTarget::Html, &ConvertRequest::new(markdown))
        .expect("converts");

    assert_eq!(conversion.degraded, 0);
    assert!(!conversion.html.contains("mermaid-diagram"));
    assert!(!conversion.html.contains("<svg id=\"static\">"));
    assert_eq!(conversion.html.matches("<pre class=\"code-block\"").count(), 2);
}

#[test]
fn email_preview_matches_public_helper() {
    let markdown = "# Weekly *digest*\n\nbody";
    let conversion = service(None)
        .convert(ConvertTarget::Email, &ConvertRequest::new(markdown))
        .expect("converts");

    assert_eq!(preview_text(markdown), "Weekly digest\n\nbody...");
    assert!(conversion.html.contains("Weekly digest"));
}

#[test]
fn extra_templates_extend_the_catalog() {
    let mut catalog = TemplateCatalog::builtin().expect("builtin catalog");
    let before = catalog.len();
    catalog
        .extend_from_toml(
            r##"
[[templates]]
id = "house-style"
name = "House style"
format = "wechat"

[templates.styles]
h1 = "color: #123456;"
"##,
        )
        .expect("extra templates load");
    assert_eq!(catalog.len(), before + 1);

    let service = ConvertService::new(
        Arc::new(ComrakRenderService::with_diagram_renderer(None)),
        Arc::new(catalog),
    );
    let conversion = service
        .convert(
            ConvertTarget::Wechat,
            &ConvertRequest::new("# Hi").with_template("house-style"),
        )
        .expect("converts");
    assert!(conversion.html.contains("<h1 style=\"color: #123456;\">Hi</h1>"));
}
