use once_cell::sync::Lazy;
use regex::Regex;

/// Empty table scaffolding some clients render as visible rows or gaps.
static EMPTY_SCAFFOLDING: Lazy<[(Regex, &'static str); 6]> = Lazy::new(|| {
    [
        (
            Regex::new(r"(?i)<thead>\s*<tr>\s*(?:<t[hd]>\s*</t[hd]>\s*)*</tr>\s*</thead>")
                .expect("empty header row pattern is valid"),
            "",
        ),
        (
            Regex::new(r"(?i)<thead>\s*</thead>").expect("empty thead pattern is valid"),
            "",
        ),
        (
            Regex::new(r"(?i)<tbody>\s*</tbody>").expect("empty tbody pattern is valid"),
            "",
        ),
        (
            Regex::new(r"(?i)<tr>\s*</tr>").expect("empty row pattern is valid"),
            "",
        ),
        (
            Regex::new(r"(?i)<p>\s*</p>\s*(<table)").expect("empty paragraph pattern is valid"),
            "$1",
        ),
        (
            Regex::new(r"(?i)<p\s*/>\s*(<table)").expect("void paragraph pattern is valid"),
            "$1",
        ),
    ]
});

/// Strip empty table wrappers until nothing changes. Removing one wrapper can
/// leave its parent empty, so a single pass is not enough.
pub(crate) fn strip_empty_table_scaffolding(html: &str) -> String {
    let mut current = html.to_string();
    loop {
        let next = EMPTY_SCAFFOLDING
            .iter()
            .fold(current.clone(), |acc, (pattern, replacement)| {
                pattern.replace_all(&acc, *replacement).into_owned()
            });
        if next == current {
            return current;
        }
        current = next;
    }
}
