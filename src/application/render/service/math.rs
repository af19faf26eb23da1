use katex::{OptsBuilder, OutputType};

use crate::application::{markup::escape_html, render::types::RenderError};

/// Render a KaTeX expression to HTML, returning an inline (`<span>`) or block (`<div>`) fragment.
pub(crate) fn render_math_html(literal: &str, display_mode: bool) -> Result<String, RenderError> {
    let mut builder = OptsBuilder::default();
    builder.display_mode(display_mode);
    builder.output_type(OutputType::Html);
    builder.throw_on_error(true);

    let opts = builder.build().map_err(|err| RenderError::Math {
        message: format!("failed to build KaTeX options: {err}"),
    })?;

    katex::render_with_opts(literal.trim(), opts).map_err(|err| RenderError::Math {
        message: err.to_string(),
    })
}

pub(crate) fn wrap_block(rendered: &str) -> String {
    format!("<div class=\"katex-block\" style=\"text-align: center;\">{rendered}</div>")
}

pub(crate) fn wrap_inline(rendered: &str) -> String {
    format!("<span class=\"katex-inline\">{rendered}</span>")
}

/// Visible marker substituted for a formula KaTeX rejected.
pub(crate) fn error_marker(source: &str, display_mode: bool) -> String {
    let marker = format!(
        "<span class=\"render-error\" style=\"color: red;\">[formula error: {}]</span>",
        escape_html(source.trim())
    );
    if display_mode {
        format!("<div class=\"katex-block render-error-block\">{marker}</div>")
    } else {
        marker
    }
}
