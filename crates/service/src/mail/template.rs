use std::collections::BTreeMap;

pub const WELCOME_EMAIL: &str = include_str!("templates/welcome_email.html");

pub fn template_by_name(name: &str) -> Option<&'static str> {
    match name {
        "welcome_email.html" => Some(WELCOME_EMAIL),
        _ => None,
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
}

/// Replace `{{ key }}` (inner whitespace optional) with the HTML-escaped
/// context value. Unknown keys render as empty; an unterminated `{{` is
/// copied verbatim.
pub fn render_template(source: &str, context: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(v) = context.get(key) {
                    push_escaped(&mut out, v);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
