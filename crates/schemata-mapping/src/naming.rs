//! Machine names for generated bundles and fields.

/// Longest machine name the host accepts for bundles and fields.
pub const MAX_NAME_LENGTH: usize = 32;

/// Prefix of generated field names.
pub const FIELD_PREFIX: &str = "schema_";

/// Convert a camelCase or PascalCase id to snake_case.
///
/// Acronym runs stay together: `isbnURL` → `isbn_url`, `URLTemplate` →
/// `url_template`.
pub fn snake_case(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let mut out = String::with_capacity(id.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }

    out.trim_end_matches('_').to_string()
}

fn truncate(mut name: String) -> String {
    name.truncate(MAX_NAME_LENGTH);
    name.trim_end_matches('_').to_string()
}

/// Field name generated for a property: `schema_` + snake_case id.
pub fn field_name(property: &str) -> String {
    truncate(format!("{FIELD_PREFIX}{}", snake_case(property)))
}

/// Bundle name generated for a type.
pub fn bundle_name(type_id: &str) -> String {
    truncate(snake_case(type_id))
}

/// Human-readable label for an id: `startDate` → `Start date`.
pub fn label(id: &str) -> String {
    let words = snake_case(id).replace('_', " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
