use crate::{
    application::markup::{escape_attribute, escape_html},
    domain::{
        settings::StyleSettings,
        template::{StyleTag, Template},
    },
};

const PREVIEW_CHARS: usize = 100;
const EMAIL_WIDTH_PX: u32 = 600;

/// Hidden inbox preview line: the head of the Markdown source without
/// heading, emphasis or code markers.
pub fn preview_text(markdown: &str) -> String {
    let head: String = markdown.chars().take(PREVIEW_CHARS).collect();
    let stripped: String = head
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '`'))
        .collect();
    format!("{}...", stripped.trim())
}

/// Table-based document shell understood by desktop and web mail clients.
pub(crate) fn email_document(
    fragment: &str,
    markdown: &str,
    template: &Template,
    settings: &StyleSettings,
) -> String {
    let background = settings.background.to_string();
    let container = escape_attribute(template.declaration(StyleTag::Container));
    let preview = escape_html(&preview_text(markdown));
    let font_size = settings.font_size;

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<meta http-equiv="X-UA-Compatible" content="IE=edge">
<title>Email</title>
<style type="text/css">
body, table, td, p, a, li, blockquote {{ -webkit-text-size-adjust: 100%; -ms-text-size-adjust: 100%; }}
table, td {{ mso-table-lspace: 0pt; mso-table-rspace: 0pt; }}
img {{ -ms-interpolation-mode: bicubic; border: 0; height: auto; line-height: 100%; outline: none; text-decoration: none; }}
body {{ margin: 0 !important; padding: 0 !important; width: 100% !important; background-color: {background}; }}
.preview-text {{ display: none; max-height: 0; overflow: hidden; }}
</style>
</head>
<body style="margin: 0; padding: 20px 0; background-color: {background}; width: 100% !important;">
<div class="preview-text" style="display: none; max-height: 0; overflow: hidden;">{preview}</div>
<table role="presentation" cellspacing="0" cellpadding="0" border="0" width="100%" style="background-color: {background};">
<tr>
<td align="center" style="padding: 20px 10px;">
<table role="presentation" cellspacing="0" cellpadding="0" border="0" width="{EMAIL_WIDTH_PX}" style="{container}">
<tr>
<td style="padding: 20px; font-size: {font_size}px; line-height: 1.6; color: #374151;">
{fragment}
</td>
</tr>
</table>
</td>
</tr>
</table>
</body>
</html>
"#
    )
}
