//! Python fact extraction using tree-sitter-python.
//!
//! - `def`/`async def` record functions; inside a class body they are
//!   `Class.method`, nested functions keep their own name.
//! - `import a.b` records `a.b`; `from m import x` records `m.x`. Relative
//!   dots are dropped, so `from . import x` records `x`.
//! - Calls belong to the innermost enclosing function. Module-level calls have
//!   no caller and are skipped.
//! - `name = Column(...)` / `name = Field(...)` outside functions are ORM fields.

use super::LanguageSupport;
use super::tree_sitter_utils::{dotted, field_text, node_text};
use crate::types::{CallRecord, FactSheet, Language};

/// Tree-sitter node kind constants for the Python grammar.
mod node_kinds {
    pub const FUNCTION_DEFINITION: &str = "function_definition";
    pub const CLASS_DEFINITION: &str = "class_definition";
    pub const IMPORT_STATEMENT: &str = "import_statement";
    pub const IMPORT_FROM_STATEMENT: &str = "import_from_statement";
    pub const ALIASED_IMPORT: &str = "aliased_import";
    pub const DOTTED_NAME: &str = "dotted_name";
    pub const RELATIVE_IMPORT: &str = "relative_import";
    pub const WILDCARD_IMPORT: &str = "wildcard_import";
    pub const CALL: &str = "call";
    pub const ATTRIBUTE: &str = "attribute";
    pub const IDENTIFIER: &str = "identifier";
    pub const ASSIGNMENT: &str = "assignment";
}

/// Constructors whose assignment marks an ORM column.
const ORM_CONSTRUCTORS: &[&str] = &["column", "field"];

/// Python language support implementation.
pub struct PythonLanguage;

impl LanguageSupport for PythonLanguage {
    fn language(&self) -> Language {
        Language::Python
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn collect_facts(&self, root: &tree_sitter::Node, content: &[u8], sheet: &mut FactSheet) {
        visit(root, content, None, None, sheet);
    }
}

/// Walk `node`. `class` is set while directly inside a class body, `function`
/// names the innermost enclosing function.
fn visit(
    node: &tree_sitter::Node,
    content: &[u8],
    class: Option<&str>,
    function: Option<&str>,
    sheet: &mut FactSheet,
) {
    use node_kinds::{
        ASSIGNMENT, CALL, CLASS_DEFINITION, FUNCTION_DEFINITION, IMPORT_FROM_STATEMENT,
        IMPORT_STATEMENT,
    };

    match node.kind() {
        FUNCTION_DEFINITION => {
            let Some(name) = field_text(node, "name", content) else {
                return;
            };
            let qualified = class.map_or_else(|| name.clone(), |c| format!("{c}.{name}"));
            sheet.functions.push(qualified.clone());
            if let Some(body) = node.child_by_field_name("body") {
                visit(&body, content, None, Some(&qualified), sheet);
            }
            return;
        }
        CLASS_DEFINITION => {
            let Some(name) = field_text(node, "name", content) else {
                return;
            };
            sheet.classes.push(name.clone());
            if let Some(body) = node.child_by_field_name("body") {
                visit(&body, content, Some(&name), function, sheet);
            }
            return;
        }
        IMPORT_STATEMENT => {
            collect_import(node, content, sheet);
            return;
        }
        IMPORT_FROM_STATEMENT => {
            collect_from_import(node, content, sheet);
            return;
        }
        CALL => {
            if let (Some(caller), Some(callee)) = (
                function,
                node.child_by_field_name("function")
                    .and_then(|f| call_name(&f, content)),
            ) {
                sheet.calls.push(CallRecord::new(caller, callee));
            }
        }
        ASSIGNMENT if function.is_none() => {
            if let Some(field) = orm_field(node, content) {
                sheet.orm_fields.push(field);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(&child, content, class, function, sheet);
    }
}

/// `import a.b, c as d` records `a.b` and `c`.
fn collect_import(node: &tree_sitter::Node, content: &[u8], sheet: &mut FactSheet) {
    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        if let Some(name) = imported_name(&child, content) {
            sheet.imports.insert(name);
        }
    }
}

/// `from m import x, y` records `m.x` and `m.y`.
fn collect_from_import(node: &tree_sitter::Node, content: &[u8], sheet: &mut FactSheet) {
    use node_kinds::{DOTTED_NAME, RELATIVE_IMPORT, WILDCARD_IMPORT};

    let module = node.child_by_field_name("module_name").and_then(|m| match m.kind() {
        DOTTED_NAME => node_text(&m, content),
        RELATIVE_IMPORT => {
            let mut cursor = m.walk();
            let inner = m
                .named_children(&mut cursor)
                .find(|c| c.kind() == DOTTED_NAME);
            inner.and_then(|d| node_text(&d, content))
        }
        _ => None,
    });
    let qualify = |name: &str| match &module {
        Some(module) => format!("{module}.{name}"),
        None => name.to_string(),
    };

    let mut cursor = node.walk();
    for child in node.children_by_field_name("name", &mut cursor) {
        if let Some(name) = imported_name(&child, content) {
            sheet.imports.insert(qualify(&name));
        }
    }

    let mut cursor = node.walk();
    if node
        .named_children(&mut cursor)
        .any(|c| c.kind() == WILDCARD_IMPORT)
    {
        sheet.imports.insert(qualify("*"));
    }
}

/// Imported name, ignoring any `as` alias.
fn imported_name(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{ALIASED_IMPORT, DOTTED_NAME};

    match node.kind() {
        DOTTED_NAME => node_text(node, content),
        ALIASED_IMPORT => field_text(node, "name", content),
        _ => None,
    }
}

/// Normalized callee: `name` or `a.b.c`.
///
/// When the chain starts with something other than a name (`get().run()`),
/// only the attribute part is kept.
fn call_name(function: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{ATTRIBUTE, IDENTIFIER};

    let mut parts = Vec::new();
    let mut current = *function;
    while current.kind() == ATTRIBUTE {
        parts.push(field_text(&current, "attribute", content)?);
        current = current.child_by_field_name("object")?;
    }
    if current.kind() == IDENTIFIER {
        parts.push(node_text(&current, content)?);
    }
    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(dotted(&parts))
}

/// Target of `name = Column(...)` or `name = models.Field(...)`.
fn orm_field(assignment: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{ATTRIBUTE, CALL, IDENTIFIER};

    let left = assignment.child_by_field_name("left")?;
    let right = assignment.child_by_field_name("right")?;
    if left.kind() != IDENTIFIER || right.kind() != CALL {
        return None;
    }
    let function = right.child_by_field_name("function")?;
    let constructor = match function.kind() {
        IDENTIFIER => node_text(&function, content)?,
        ATTRIBUTE => field_text(&function, "attribute", content)?,
        _ => return None,
    };
    if ORM_CONSTRUCTORS.contains(&constructor.to_lowercase().as_str()) {
        node_text(&left, content)
    } else {
        None
    }
}
