//! C# fact extraction using tree-sitter-c-sharp.
//!
//! Type declarations (class, struct, interface, record, enum) are classes.
//! Methods and constructors are recorded as `Type.Member`, local functions by
//! their own name. `new T()` counts as a call to `T`.

use super::LanguageSupport;
use super::tree_sitter_utils::{dotted, dotted_path, field_text, node_text};
use crate::types::{CallRecord, FactSheet, Language};

/// Tree-sitter node kind constants for the C# grammar.
mod node_kinds {
    // Type declarations
    pub const CLASS_DECLARATION: &str = "class_declaration";
    pub const STRUCT_DECLARATION: &str = "struct_declaration";
    pub const INTERFACE_DECLARATION: &str = "interface_declaration";
    pub const ENUM_DECLARATION: &str = "enum_declaration";
    pub const RECORD_DECLARATION: &str = "record_declaration";

    // Members
    pub const METHOD_DECLARATION: &str = "method_declaration";
    pub const CONSTRUCTOR_DECLARATION: &str = "constructor_declaration";
    pub const LOCAL_FUNCTION_STATEMENT: &str = "local_function_statement";

    // Imports
    pub const USING_DIRECTIVE: &str = "using_directive";

    // Expressions
    pub const INVOCATION_EXPRESSION: &str = "invocation_expression";
    pub const OBJECT_CREATION_EXPRESSION: &str = "object_creation_expression";
    pub const MEMBER_ACCESS_EXPRESSION: &str = "member_access_expression";
    pub const THIS: &str = "this";
    pub const THIS_EXPRESSION: &str = "this_expression";
    pub const BASE: &str = "base";

    // Names
    pub const IDENTIFIER: &str = "identifier";
    pub const QUALIFIED_NAME: &str = "qualified_name";
    pub const GENERIC_NAME: &str = "generic_name";
}

/// C# language support implementation.
pub struct CSharpLanguage;

impl LanguageSupport for CSharpLanguage {
    fn language(&self) -> Language {
        Language::CSharp
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_c_sharp::LANGUAGE.into()
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
        CLASS_DECLARATION, CONSTRUCTOR_DECLARATION, ENUM_DECLARATION, INTERFACE_DECLARATION,
        INVOCATION_EXPRESSION, LOCAL_FUNCTION_STATEMENT, METHOD_DECLARATION,
        OBJECT_CREATION_EXPRESSION, RECORD_DECLARATION, STRUCT_DECLARATION, USING_DIRECTIVE,
    };

    match node.kind() {
        CLASS_DECLARATION | STRUCT_DECLARATION | INTERFACE_DECLARATION | RECORD_DECLARATION
        | ENUM_DECLARATION => {
            let Some(name) = field_text(node, "name", content) else {
                return;
            };
            sheet.classes.push(name.clone());
            if let Some(body) = node.child_by_field_name("body") {
                visit(&body, content, Some(&name), function, sheet);
            }
            return;
        }
        METHOD_DECLARATION | CONSTRUCTOR_DECLARATION => {
            let Some(name) = field_text(node, "name", content) else {
                return;
            };
            let qualified = owner.map_or_else(|| name.clone(), |o| format!("{o}.{name}"));
            enter_function(node, content, qualified, sheet);
            return;
        }
        LOCAL_FUNCTION_STATEMENT => {
            if let Some(name) = field_text(node, "name", content) {
                enter_function(node, content, name, sheet);
            }
            return;
        }
        USING_DIRECTIVE => {
            if let Some(import) = using_target(node, content) {
                sheet.imports.insert(import);
            }
            return;
        }
        INVOCATION_EXPRESSION => {
            if let (Some(caller), Some(callee)) = (
                function,
                node.child_by_field_name("function")
                    .and_then(|f| call_name(&f, content)),
            ) {
                sheet.calls.push(CallRecord::new(caller, callee));
            }
        }
        OBJECT_CREATION_EXPRESSION => {
            if let (Some(caller), Some(created)) = (
                function,
                node.child_by_field_name("type")
                    .and_then(|t| type_name(&t, content)),
            ) {
                sheet.calls.push(CallRecord::new(caller, created));
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(&child, content, owner, function, sheet);
    }
}

/// Record a function and walk its body with it as the caller.
fn enter_function(node: &tree_sitter::Node, content: &[u8], name: String, sheet: &mut FactSheet) {
    sheet.functions.push(name.clone());
    if let Some(body) = node.child_by_field_name("body") {
        visit(&body, content, None, Some(&name), sheet);
    }
}

/// Namespace or type named by a `using` directive; aliases are skipped.
fn using_target(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{GENERIC_NAME, IDENTIFIER, QUALIFIED_NAME};

    let mut cursor = node.walk();
    let target = node
        .named_children(&mut cursor)
        .filter(|c| matches!(c.kind(), QUALIFIED_NAME | IDENTIFIER | GENERIC_NAME))
        .last()?;
    node_text(&target, content).map(|t| dotted_path(&t))
}

/// Name of a created type (`Foo`, `Foo<T>`, `Ns.Foo`).
fn type_name(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{GENERIC_NAME, IDENTIFIER, QUALIFIED_NAME};

    match node.kind() {
        IDENTIFIER => node_text(node, content),
        QUALIFIED_NAME => node_text(node, content).map(|t| dotted_path(&t)),
        GENERIC_NAME => generic_base(node, content),
        _ => None,
    }
}

/// `List<T>` -> `List`.
fn generic_base(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    let identifier = node
        .named_children(&mut cursor)
        .find(|c| c.kind() == node_kinds::IDENTIFIER)?;
    node_text(&identifier, content)
}

/// Simple member name, stripping generic arguments.
fn member_name(node: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    if node.kind() == node_kinds::GENERIC_NAME {
        generic_base(node, content)
    } else {
        node_text(node, content)
    }
}

/// Normalized invocation target: `Name` or `a.b.Method`.
fn call_name(function: &tree_sitter::Node, content: &[u8]) -> Option<String> {
    use node_kinds::{BASE, GENERIC_NAME, IDENTIFIER, MEMBER_ACCESS_EXPRESSION, THIS, THIS_EXPRESSION};

    match function.kind() {
        IDENTIFIER | GENERIC_NAME => member_name(function, content),
        MEMBER_ACCESS_EXPRESSION => {
            let mut parts = Vec::new();
            let mut current = *function;
            while current.kind() == MEMBER_ACCESS_EXPRESSION {
                parts.push(member_name(&current.child_by_field_name("name")?, content)?);
                current = current.child_by_field_name("expression")?;
            }
            match current.kind() {
                IDENTIFIER => parts.push(node_text(&current, content)?),
                THIS | THIS_EXPRESSION => parts.push("this".to_string()),
                BASE => parts.push("base".to_string()),
                _ => {}
            }
            parts.reverse();
            Some(dotted(&parts))
        }
        _ => None,
    }
}
