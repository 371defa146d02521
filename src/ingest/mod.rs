//! Per-language source extraction.
//!
//! Each parser consumes one file's content plus a tree-sitter syntax tree
//! and emits pure facts: symbol definitions, raw call sites, raw imports,
//! heritage declarations, type annotations, decorators, export markers.
//! Parsers never resolve anything cross-file; resolution is the pipeline's
//! job.
//!
//! All records are pure data. No behavior. No filesystem access.

pub mod csharp;
pub mod detect;
pub mod pool;
pub mod python;
pub mod typescript;

use serde::{Deserialize, Serialize};

pub use detect::{detect_language, Language};

use crate::graph::TypeRole;

/// Category of an extracted symbol, mapped 1:1 onto graph node kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SymbolCategory {
    Function,
    Class,
    Method,
    Interface,
    TypeAlias,
    Enum,
}

impl SymbolCategory {
    pub fn node_kind(&self) -> crate::graph::NodeKind {
        use crate::graph::NodeKind;
        match self {
            SymbolCategory::Function => NodeKind::Function,
            SymbolCategory::Class => NodeKind::Class,
            SymbolCategory::Method => NodeKind::Method,
            SymbolCategory::Interface => NodeKind::Interface,
            SymbolCategory::TypeAlias => NodeKind::TypeAlias,
            SymbolCategory::Enum => NodeKind::Enum,
        }
    }
}

/// A symbol definition extracted from one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolRecord {
    pub name: String,
    pub category: SymbolCategory,
    /// Owning class for methods, empty otherwise.
    #[serde(default)]
    pub class_name: String,
    /// 1-indexed source span.
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub signature: String,
    /// Raw body text of the definition (capped later by the parse phase).
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub is_exported: bool,
    #[serde(default)]
    pub is_ctor: bool,
    #[serde(default)]
    pub is_property: bool,
    /// Interface method declaration without a body.
    #[serde(default)]
    pub is_stub: bool,
    /// Parameter count (used for override matching).
    #[serde(default)]
    pub arity: usize,
    /// Base names as written in source (classes/interfaces).
    #[serde(default)]
    pub bases: Vec<String>,
    /// Declared method names (interfaces).
    #[serde(default)]
    pub methods_declared: Vec<String>,
    /// Variant names (enums).
    #[serde(default)]
    pub variants: Vec<String>,
    /// Aliased type as written (type aliases).
    #[serde(default)]
    pub target_syntactic: String,
}

impl SymbolRecord {
    /// Qualified name used in the node identifier: `Class.method` for
    /// methods, the plain name otherwise.
    pub fn qualified_name(&self) -> String {
        if self.category == SymbolCategory::Method && !self.class_name.is_empty() {
            format!("{}.{}", self.class_name, self.name)
        } else {
            self.name.clone()
        }
    }
}

/// A raw call site. Carries everything the tracer needs and nothing it can
/// only learn cross-file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallSite {
    /// Callee textual name (`save` for `user.save()`).
    pub name: String,
    /// 1-indexed line of the call expression.
    pub line: usize,
    /// Receiver expression root (`user` for `user.save()`), empty for
    /// plain calls.
    #[serde(default)]
    pub receiver: String,
    /// Receiver static type where locally determinable (typed parameter,
    /// typed field, or typed local in scope).
    #[serde(default)]
    pub receiver_type: Option<String>,
    /// Bare identifier arguments (callback candidates).
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl CallSite {
    pub fn plain(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            receiver: String::new(),
            receiver_type: None,
            arguments: Vec::new(),
        }
    }
}

/// A raw import statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRecord {
    /// Specifier as written: `./utils`, `src.a.b`, `System.Linq`.
    pub module: String,
    /// Names imported from the module (empty for whole-module imports).
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub alias: String,
    /// Relative specifier (`./x`, `../y`, or a leading-dot Python module).
    #[serde(default)]
    pub is_relative: bool,
}

/// Heritage kind as written in source. A syntactic hint only: the heritage
/// phase decides the final edge type from the resolved target's kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HeritageKind {
    Extends,
    Implements,
}

/// `(child, kind, parent)` heritage declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeritageRecord {
    pub child: String,
    pub kind: HeritageKind,
    pub parent: String,
}

/// A type annotation occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeRefRecord {
    /// Primary type name (`User` for `list[User]`).
    pub name: String,
    pub role: TypeRole,
    pub line: usize,
    #[serde(default)]
    pub param_name: String,
}

/// Everything one parser run produces for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParseOutput {
    pub symbols: Vec<SymbolRecord>,
    pub calls: Vec<CallSite>,
    pub imports: Vec<ImportRecord>,
    pub heritage: Vec<HeritageRecord>,
    pub type_refs: Vec<TypeRefRecord>,
    /// Names exported from the file (module surface).
    pub exports: Vec<String>,
}

/// UTF-8 text of a tree-sitter node, bounds-checked against the source.
pub(crate) fn node_text<'a>(node: &tree_sitter::Node, source: &'a [u8]) -> Option<&'a str> {
    let start = node.start_byte();
    let end = node.end_byte();
    if start > end || end > source.len() {
        return None;
    }
    std::str::from_utf8(&source[start..end]).ok()
}

/// Owned variant of [`node_text`] defaulting to empty on failure.
pub(crate) fn node_string(node: &tree_sitter::Node, source: &[u8]) -> String {
    node_text(node, source).unwrap_or_default().to_string()
}

/// 1-indexed start line of a node (tree-sitter rows are 0-indexed).
pub(crate) fn start_line(node: &tree_sitter::Node) -> usize {
    node.start_position().row + 1
}

/// 1-indexed end line of a node.
pub(crate) fn end_line(node: &tree_sitter::Node) -> usize {
    node.end_position().row + 1
}
