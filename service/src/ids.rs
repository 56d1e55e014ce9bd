//! Composite id generation: slugify the name, prefix the
//! active context. Stable across repeated upserts of the same name under
//! the same context, which is what lets `remember` behave idempotently
//! when callers never pass an explicit id.

/// Lowercases, maps whitespace/underscore runs to a single hyphen, and
/// strips anything outside `[a-z0-9\-:]`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true; // swallow leading separators

    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() || ch == ':' {
            slug.push(ch);
            last_was_hyphen = false;
        } else if ch == '-' {
            if !last_was_hyphen {
                slug.push('-');
                last_was_hyphen = true;
            }
        } else if ch.is_whitespace() || ch == '_' {
            if !last_was_hyphen {
                slug.push('-');
                last_was_hyphen = true;
            }
        }
        // anything else (punctuation, emoji, ...) is dropped
    }

    slug.trim_end_matches('-').to_string()
}

/// `{context}:{slugified name}` when a context is in effect, else just
/// the slug.
pub fn composite_id(name: &str, context: Option<&str>) -> String {
    let slug = slugify(name);
    match context {
        Some(ctx) if !ctx.trim().is_empty() => format!("{}:{slug}", ctx.trim()),
        _ => slug,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_spaces_and_case() {
        assert_eq!(slugify("  Hello World  "), "hello-world");
    }

    #[test]
    fn strips_non_allowed_characters() {
        assert_eq!(slugify("Rust! & Go?"), "rust-go");
    }

    #[test]
    fn composite_id_prefixes_context() {
        assert_eq!(composite_id("Widget", Some("acme")), "acme:widget");
        assert_eq!(composite_id("Widget", None), "widget");
    }

    #[test]
    fn same_name_and_context_yields_stable_id() {
        assert_eq!(
            composite_id("Load Balancer", Some("infra")),
            composite_id("load balancer", Some("infra"))
        );
    }
}
