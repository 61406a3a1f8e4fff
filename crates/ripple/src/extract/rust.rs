//! Rust fact extraction using tree-sitter-rust.
//!
//! Free functions are recorded by name, methods inside `impl T` (and default
//! methods inside `trait T`) as `T.method`. Structs, enums, and traits count
//! as classes. `use` trees are expanded to one dotted import per leaf.

use super::LanguageSupport;
use super::tree_sitter_utils::{dotted, dotted_path, field_text, node_text};
use crate::types::{CallRecord, FactSheet, Language};

/// Tree-sitter node kind constants for the Rust grammar.
mod node_kinds {
    // Items
    pub const FUNCTION_ITEM: &str = "function_item";
    pub const STRUCT_ITEM: &str = "struct_item";
    pub const ENUM_ITEM: &str = "enum_item";
    pub const TRAIT_ITEM: &str = "trait_item";
    pub const IMPL_ITEM: &str = "impl_item";
    pub const USE_DECLARATION: &str = "use_declaration";

    // Types
    pub const TYPE_IDENTIFIER: &str = "type_identifier";
    pub const GENERIC_TYPE: &str = "generic_type";
    pub const SCOPED_TYPE_IDENTIFIER: &str = "scoped_type_identifier";

    // Use trees
    pub const USE_LIST: &str = "use_list";
    pub const SCOPED_USE_LIST: &str = "scoped_use_list";
    pub const USE_WILDCARD: &str = "use_wildcard";
    pub const USE_AS_CLAUSE: &str = "use_as_clause";
    pub const SCOPED_IDENTIFIER: &str = "scoped_identifier";
    pub const IDENTIFIER: &str = "identifier";
    pub const CRATE: &str = "crate";
    pub const SELF: &str = "self";
    pub const SUPER: &str = "super";

    // Expressions
    pub const CALL_EXPRESSION: &str = "call_expression";
    pub const FIELD_EXPRESSION: &str = "field_expression";
    pub const GENERIC_FUNCTION: &str = "generic_function";
}

/// Rust language support implementation.
pub struct RustLanguage;

impl LanguageSupport for RustLanguage {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn collect_facts(&self, root: &tree_sitter::Node, content: &[u8], sheet: &mut FactSheet) {
        visit(root, content, None, None, sheet);
    }
}

fn visit(
    node: &tree_sitter::Node,
    content: &[u8],
    owner: Option<&str>,
    function: Option<&str>,
    sheet: &mut FactSheet,
) {
    use node_kinds::{
        CALL_EXPRESSION, ENUM_ITEM, FUNCTION_ITEM, IMPL_ITEM, STRUCT_ITEM, TRAIT_ITEM,
        USE_DECLARATION,
    };

    match node.kind() {
        FUNCTION_ITEM => {
            let Some(name) = field_text(node, "name", content) else {
                return;
            };
            let qualified = owner.map_or_else(|| name.clone(), |o| format!("{o}.{name}"));
            sheet.functions.push(qualified.clone());
            if let Some(body) = node.child_by_field_name("body") {
                visit(&body, content, None, Some(&qualified), sheet);
            }
            return;
        }
        IMPL_ITEM => {
            let impl_type = node
                .child_by_field_name("type")
                .and_then(|t| type_name(&t, content));
            if let Some(body) = node.child_by_field_name("body") {
                visit(&body, content, impl_type.as_deref(), function, sheet);
            }
            return;
        }
        TRAIT_ITEM => {
            let Some(name) = field_text(node, "name", content) else {
                return;
            };
            sheet.classes.push(name.clone());
            if let Some(body) = node.child_by_field_name("body") {
                visit(&body, content, Some(&name), function, sheet);
            }
            return;
        }
        STRUCT_ITEM | ENUM_ITEM => {
            if let Some(name) = field_text(node, "name", content) {
                sheet.classes.push(name);
            }
            return;
        }
        USE_DECLARATION => {
            if let Some(argument) = node.child_by_field_name("argument") {
                let mut imports = Vec::new();
                collect_use(&argument, content, "", &mut imports);
                sheet.imports.extend(imports);
            }
            return;
        }
        CALL_EXPRESSION => {
            if let (Some(caller), Some(callee)) = (
                function,
                node.child_by_field_name("function")
                    .and_then(|f| call_name(&f, content)),
            ) {
                sheet.calls.push(CallRecord::new(caller, callee));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(&child, content, owner, function, sheet);
    }
}

/// Base type name of an `impl` target (`Foo`, `Foo<T>`, `a::Foo`).
fn type_name(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{GENERIC_TYPE, SCOPED_TYPE_IDENTIFIER, TYPE_IDENTIFIER};

    match node.kind() {
        TYPE_IDENTIFIER => node_text(node, content),
        GENERIC_TYPE => type_name(&node.child_by_field_name("type")?, content),
        SCOPED_TYPE_IDENTIFIER => field_text(node, "name", content),
        _ => None,
    }
}

fn join(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}.{path}")
    }
}

/// Expand a use tree into dotted import paths.
fn collect_use(node: &tree_sitter::Node, content: &[u8], prefix: &str, out: &mut Vec<String>) {
    use node_kinds::{
        CRATE, IDENTIFIER, SCOPED_IDENTIFIER, SCOPED_USE_LIST, SELF, SUPER, USE_AS_CLAUSE,
        USE_LIST, USE_WILDCARD,
    };

    match node.kind() {
        // `use a::{self}` imports `a` itself
        SELF if !prefix.is_empty() => out.push(prefix.to_string()),
        IDENTIFIER | SCOPED_IDENTIFIER | CRATE | SELF | SUPER | USE_WILDCARD => {
            if let Some(text) = node_text(node, content) {
                out.push(join(prefix, &dotted_path(&text)));
            }
        }
        USE_AS_CLAUSE => {
            if let Some(path) = node.child_by_field_name("path") {
                collect_use(&path, content, prefix, out);
            }
        }
        SCOPED_USE_LIST => {
            let nested = node
                .child_by_field_name("path")
                .and_then(|p| node_text(&p, content))
                .map_or_else(|| prefix.to_string(), |p| join(prefix, &dotted_path(&p)));
            if let Some(list) = node.child_by_field_name("list") {
                collect_use(&list, content, &nested, out);
            }
        }
        USE_LIST => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_use(&child, content, prefix, out);
            }
        }
        _ => {}
    }
}

/// Normalized callee: `name`, `a.b.c` for paths, `self.x.y` for field chains.
fn call_name(function: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{FIELD_EXPRESSION, GENERIC_FUNCTION, IDENTIFIER, SCOPED_IDENTIFIER, SELF};

    match function.kind() {
        IDENTIFIER => node_text(function, content),
        SCOPED_IDENTIFIER => scoped_path(function, content),
        GENERIC_FUNCTION => call_name(&function.child_by_field_name("function")?, content),
        FIELD_EXPRESSION => {
            let mut parts = Vec::new();
            let mut current = *function;
            while current.kind() == FIELD_EXPRESSION {
                parts.push(field_text(&current, "field", content)?);
                current = current.child_by_field_name("value")?;
            }
            match current.kind() {
                IDENTIFIER | SELF => parts.push(node_text(&current, content)?),
                SCOPED_IDENTIFIER => parts.push(scoped_path(&current, content)?),
                _ => {}
            }
            parts.reverse();
            Some(dotted(&parts))
        }
        _ => None,
    }
}

/// Dotted form of a `::` path with turbofish arguments dropped
/// (`Vec::<u32>::new` is `Vec.new`).
fn scoped_path(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{GENERIC_TYPE, SCOPED_IDENTIFIER};

    match node.kind() {
        SCOPED_IDENTIFIER => {
            let name = field_text(node, "name", content)?;
            match node.child_by_field_name("path") {
                Some(path) => Some(join(&scoped_path(&path, content)?, &name)),
                None => Some(name),
            }
        }
        // The grammar aliases a turbofish path segment to `generic_type`
        GENERIC_TYPE => scoped_path(&node.child_by_field_name("type")?, content),
        _ => node_text(node, content).map(|t| dotted_path(&t)),
    }
}
