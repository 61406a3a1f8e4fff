//! Source fact extraction.
//!
//! Each supported language implements `LanguageSupport`, which walks a
//! tree-sitter syntax tree and fills a [`FactSheet`]. Extraction never fails
//! for a single file: problems become [`ExtractionError`] diagnostics next to
//! a (possibly empty or partial) sheet.
//!
//! | Situation | Sheet | Diagnostic |
//! |-----------|-------|------------|
//! | Unknown extension | empty | `UnsupportedLanguage` |
//! | Invalid UTF-8 | facts from the lossy decode | `EncodingError` |
//! | Syntax errors | facts outside the error nodes | `SyntaxErrors` |
//! | Parser unavailable or no tree | empty | `ParseFailed` |
//!
//! ## Adding a New Language
//!
//! 1. Add the variant to `Language` in `types.rs`
//! 2. Create a walker module implementing `LanguageSupport`
//! 3. Register it in `language_support()`

pub mod csharp;
pub mod python;
pub mod rust;
mod tree_sitter_utils;

use std::borrow::Cow;
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::types::{FactSheet, Language};

/// Language-specific fact collection over a tree-sitter tree.
pub trait LanguageSupport: Send + Sync {
    /// Language handled by this walker.
    fn language(&self) -> Language;

    /// Get the tree-sitter language for parsing.
    fn tree_sitter_language(&self) -> tree_sitter::Language;

    /// Walk the tree rooted at `root` and record facts into `sheet`.
    fn collect_facts(&self, root: &tree_sitter::Node, content: &[u8], sheet: &mut FactSheet);
}

/// Get the walker for a language.
#[must_use]
pub fn language_support(language: Language) -> &'static dyn LanguageSupport {
    match language {
        Language::Python => &python::PythonLanguage,
        Language::Rust => &rust::RustLanguage,
        Language::CSharp => &csharp::CSharpLanguage,
    }
}

/// Facts and diagnostics for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Extracted facts (empty when the file could not be parsed)
    pub sheet: FactSheet,
    /// Non-fatal problems met while extracting
    pub diagnostics: Vec<ExtractionError>,
}

impl Extraction {
    /// Returns `true` if any diagnostic is an internal problem.
    #[must_use]
    pub fn has_internal_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.kind.is_internal_error())
    }
}

/// Extract facts from one file's raw bytes.
///
/// The language is chosen by file extension.
#[must_use]
pub fn extract_facts(path: &str, content: &[u8]) -> Extraction {
    let mut sheet = FactSheet::new(path);
    let mut diagnostics = Vec::new();

    let Some(language) = sheet.language else {
        debug!(file = %path, "no extractor for file, recording file only");
        diagnostics.push(ExtractionError::unsupported_language(PathBuf::from(path)));
        return Extraction { sheet, diagnostics };
    };

    let source = String::from_utf8_lossy(content);
    if matches!(source, Cow::Owned(_)) {
        diagnostics.push(ExtractionError::encoding_error(PathBuf::from(path)));
    }

    let support = language_support(language);
    let mut parser = tree_sitter::Parser::new();
    if let Err(e) = parser.set_language(&support.tree_sitter_language()) {
        warn!(file = %path, language = language.as_str(), error = %e, "failed to load grammar");
        diagnostics.push(ExtractionError::parse_failed(
            PathBuf::from(path),
            format!("failed to load {} grammar: {e}", language.as_str()),
        ));
        return Extraction { sheet, diagnostics };
    }

    let Some(tree) = parser.parse(source.as_bytes(), None) else {
        warn!(file = %path, "parser produced no tree");
        diagnostics.push(ExtractionError::parse_failed(
            PathBuf::from(path),
            "parser produced no tree",
        ));
        return Extraction { sheet, diagnostics };
    };

    let root = tree.root_node();
    if root.has_error() {
        debug!(file = %path, "syntax errors present, keeping partial facts");
        diagnostics.push(ExtractionError::syntax_errors(PathBuf::from(path)));
    }
    support.collect_facts(&root, source.as_bytes(), &mut sheet);

    debug!(
        file = %path,
        functions = sheet.functions.len(),
        classes = sheet.classes.len(),
        imports = sheet.imports.len(),
        calls = sheet.calls.len(),
        "extracted facts"
    );
    Extraction { sheet, diagnostics }
}

/// Extract facts from many files in parallel.
///
/// Output order matches input order.
pub fn extract_repository<P, C>(files: &[(P, C)]) -> Vec<Extraction>
where
    P: AsRef<str> + Sync,
    C: AsRef<[u8]> + Sync,
{
    let extractions: Vec<Extraction> = files
        .par_iter()
        .map(|(path, content)| extract_facts(path.as_ref(), content.as_ref()))
        .collect();

    let diagnostics: usize = extractions.iter().map(|e| e.diagnostics.len()).sum();
    debug!(files = files.len(), diagnostics, "extracted repository");
    extractions
}
