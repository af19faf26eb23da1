use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use syntect::{
    html::{ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};

use crate::application::{
    markup::{decode_entities, escape_attribute, escape_html},
    render::types::RenderError,
};

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<pre><code(?: class="language-([^"]+)")?>(.*?)</code></pre>"#)
        .expect("code block pattern is valid")
});

const PLAIN_LANGUAGE: &str = "text";
const DIAGRAM_LANGUAGE: &str = "mermaid";

/// Short forms accepted in fence info strings.
const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("sh", "bash"),
    ("shell", "bash"),
    ("yml", "yaml"),
    ("md", "markdown"),
    ("c#", "csharp"),
    ("cs", "csharp"),
    ("dockerfile", "docker"),
    ("rs", "rust"),
    ("golang", "go"),
];

#[derive(Debug, Default)]
pub(crate) struct Annotated {
    pub(crate) html: String,
    pub(crate) code_blocks: usize,
}

/// Rewrite parser-emitted code blocks into highlighted, language-labelled
/// blocks. `diagram` receives the source of any `mermaid` block that reached
/// the parser.
pub(crate) fn annotate<F>(
    html: &str,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
    mut diagram: F,
) -> Result<Annotated, RenderError>
where
    F: FnMut(&str) -> String,
{
    let mut code_blocks = 0;
    let mut failure = None;

    let rewritten = CODE_BLOCK.replace_all(html, |caps: &Captures<'_>| {
        let declared = caps.get(1).map(|m| m.as_str());
        let source = decode_entities(caps.get(2).map(|m| m.as_str()).unwrap_or_default());

        if declared.is_some_and(|lang| lang.eq_ignore_ascii_case(DIAGRAM_LANGUAGE)) {
            return diagram(source.trim());
        }

        code_blocks += 1;
        let language = canonical_language(declared.unwrap_or(PLAIN_LANGUAGE));
        match highlight_code(&language, declared, &source, syntax_set, class_style) {
            Ok(block) => block,
            Err(err) => {
                failure.get_or_insert(err);
                String::new()
            }
        }
    });

    if let Some(err) = failure {
        return Err(err);
    }

    Ok(Annotated {
        html: rewritten.into_owned(),
        code_blocks,
    })
}

pub(crate) fn canonical_language(token: &str) -> String {
    let lowercase = token.trim().to_ascii_lowercase();
    LANGUAGE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowercase)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(lowercase)
}

fn highlight_code(
    language: &str,
    declared: Option<&str>,
    code: &str,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> Result<String, RenderError> {
    let label = escape_attribute(language);
    let syntax = find_syntax(syntax_set, language)
        .or_else(|| declared.and_then(|token| find_syntax(syntax_set, token)));

    let body = match syntax {
        Some(syntax) if syntax.name != "Plain Text" => {
            highlight_lines(language, code, syntax, syntax_set, class_style)?
        }
        _ => escape_html(code),
    };

    Ok(format!(
        "<pre class=\"code-block\" data-language=\"{label}\"><code class=\"language-{label}\">{body}</code></pre>"
    ))
}

fn highlight_lines(
    language: &str,
    code: &str,
    syntax: &SyntaxReference,
    syntax_set: &SyntaxSet,
    class_style: &ClassStyle,
) -> Result<String, RenderError> {
    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, syntax_set, *class_style);

    let mut code_with_newline = code.to_string();
    if !code_with_newline.ends_with('\n') {
        code_with_newline.push('\n');
    }

    for line in LinesWithEndings::from(code_with_newline.as_str()) {
        generator
            .parse_html_for_line_which_includes_newline(line)
            .map_err(|err| RenderError::Highlighting {
                language: language.to_string(),
                message: err.to_string(),
            })?;
    }

    Ok(generator.finalize())
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, token: &str) -> Option<&'a SyntaxReference> {
    let lowercase = token.to_ascii_lowercase();
    syntax_set
        .find_syntax_by_token(&lowercase)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(&lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntaxes() -> SyntaxSet {
        SyntaxSet::load_defaults_newlines()
    }

    fn style() -> ClassStyle {
        ClassStyle::SpacedPrefixed { prefix: "syntax-" }
    }

    fn no_diagram(_: &str) -> String {
        panic!("no diagram expected")
    }

    #[test]
    fn aliases_map_to_canonical_names() {
        assert_eq!(canonical_language("JS"), "javascript");
        assert_eq!(canonical_language("golang"), "go");
        assert_eq!(canonical_language("c#"), "csharp");
        assert_eq!(canonical_language("haskell"), "haskell");
    }

    #[test]
    fn known_language_is_highlighted_and_labelled() {
        let html = "<pre><code class=\"language-rs\">fn main() {}\n</code></pre>\n";
        let out = annotate(html, &syntaxes(), &style(), no_diagram).expect("annotates");
        assert_eq!(out.code_blocks, 1);
        assert!(out.html.starts_with(
            "<pre class=\"code-block\" data-language=\"rust\"><code class=\"language-rust\">"
        ));
        assert!(out.html.contains("syntax-"), "expected highlight spans: {}", out.html);
    }

    #[test]
    fn unknown_language_falls_back_to_escaped_text() {
        let html = "<pre><code class=\"language-nonsense\">a &lt; b\n</code></pre>";
        let out = annotate(html, &syntaxes(), &style(), no_diagram).expect("annotates");
        assert_eq!(
            out.html,
            "<pre class=\"code-block\" data-language=\"nonsense\"><code class=\"language-nonsense\">a &lt; b\n</code></pre>"
        );
    }

    #[test]
    fn unlabelled_block_is_plain_text() {
        let html = "<pre><code>x\n</code></pre>";
        let out = annotate(html, &syntaxes(), &style(), no_diagram).expect("annotates");
        assert!(out.html.contains("data-language=\"text\""));
        assert!(out.html.contains(">x\n</code>"));
    }

    #[test]
    fn mermaid_block_is_routed_to_diagram() {
        let html = "<pre><code class=\"language-mermaid\">A--&gt;B\n</code></pre>";
        let mut seen = Vec::new();
        let out = annotate(html, &syntaxes(), &style(), |source| {
            seen.push(source.to_string());
            "<div>diagram</div>".to_string()
        })
        .expect("annotates");
        assert_eq!(seen, vec!["A-->B".to_string()]);
        assert_eq!(out.html, "<div>diagram</div>");
        assert_eq!(out.code_blocks, 0);
    }
}
