//! Shared tree-sitter helpers for the language walkers.

/// Get text content of a tree-sitter node.
///
/// Returns `None` if the node's byte range contains invalid UTF-8.
pub fn node_text(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    match std::str::from_utf8(content.get(node.byte_range())?) {
        Ok(s) => Some(s.to_string()),
        Err(e) => {
            tracing::trace!(
                byte_range = ?node.byte_range(),
                error = %e,
                node_kind = %node.kind(),
                "Failed to decode node text as UTF-8"
            );
            None
        }
    }
}

/// Text of the named field `field` of `node`.
pub fn field_text(node: &tree_sitter::Node, field: &str, content: &[u8]) -> Option<String> {
    let child = node.child_by_field_name(field)?;
    node_text(&child, content)
}

/// Join path segments with `.`, the normalized call and import form.
pub fn dotted(segments: &[String]) -> String {
    segments.join(".")
}

/// Strip whitespace and render a `::`-separated path as `a.b.c`.
pub fn dotted_path(text: &str) -> String {
    text.split_whitespace().collect::<String>().replace("::", ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_path_normalizes_separators_and_whitespace() {
        assert_eq!(dotted_path("crate :: auth::\n  validate"), "crate.auth.validate");
    }

    #[test]
    fn dotted_joins_segments() {
        assert_eq!(dotted(&["self".to_string(), "db".to_string(), "save".to_string()]), "self.db.save");
    }
}
