use std::borrow::Cow;

/// Replace `[%field%]` placeholders using `lookup`; unknown fields become empty.
pub fn fill_template<'a, F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<Cow<'a, str>>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("[%") {
        let Some(len) = rest[start + 2..].find("%]") else {
            break;
        };
        out.push_str(&rest[..start]);
        let field = rest[start + 2..start + 2 + len].trim();
        if let Some(value) = lookup(field) {
            out.push_str(&value);
        }
        rest = &rest[start + 2 + len + 2..];
    }

    out.push_str(rest);
    out
}

/// Substitute a node id into a data location such as `./data/[%id%].json`.
pub fn substitute_id(template: &str, id: &str) -> String {
    fill_template(template, |field| {
        field
            .eq_ignore_ascii_case("id")
            .then(|| Cow::Owned(id.to_owned()))
    })
}

pub fn short_label(text: &str, max_chars: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_chars {
        return Cow::Borrowed(text);
    }
    let mut short = text.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    short.push('…');
    Cow::Owned(short)
}
