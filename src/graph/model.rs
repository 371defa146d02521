//! Node and edge model for the knowledge graph.
//!
//! Pure data structures. No behavior beyond identity generation. Every node
//! carries one fixed property set with a `kind` discriminator; the storage
//! layer emits one row per kind.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic Community/Process UUIDs.
///
/// v5 UUIDs keep the idempotency guarantee: running the pipeline twice on
/// the same commit yields identical node identities.
const ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x9e, 0x2a, 0x41, 0x7c, 0x5b, 0x8d, 0x4f, 0x01, 0xb3, 0x6e, 0xd4, 0x20, 0x7a, 0x91, 0x4c,
    0x33,
]);

/// Kind of node in the knowledge graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    File,
    Function,
    Class,
    Method,
    Interface,
    TypeAlias,
    Enum,
    Community,
    Process,
}

impl NodeKind {
    /// All kinds, in stable persistence order.
    pub const ALL: [NodeKind; 10] = [
        NodeKind::Folder,
        NodeKind::File,
        NodeKind::Function,
        NodeKind::Class,
        NodeKind::Method,
        NodeKind::Interface,
        NodeKind::TypeAlias,
        NodeKind::Enum,
        NodeKind::Community,
        NodeKind::Process,
    ];

    /// Lowercase prefix used in node identifiers.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::File => "file",
            NodeKind::Function => "function",
            NodeKind::Class => "class",
            NodeKind::Method => "method",
            NodeKind::Interface => "interface",
            NodeKind::TypeAlias => "type_alias",
            NodeKind::Enum => "enum",
            NodeKind::Community => "community",
            NodeKind::Process => "process",
        }
    }

    /// Table name used by storage backends.
    pub fn table_name(&self) -> &'static str {
        match self {
            NodeKind::Folder => "Folder",
            NodeKind::File => "File",
            NodeKind::Function => "Function",
            NodeKind::Class => "Class",
            NodeKind::Method => "Method",
            NodeKind::Interface => "Interface",
            NodeKind::TypeAlias => "TypeAlias",
            NodeKind::Enum => "Enum",
            NodeKind::Community => "Community",
            NodeKind::Process => "Process",
        }
    }

    /// True for kinds the glossary counts as symbols.
    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            NodeKind::Function
                | NodeKind::Class
                | NodeKind::Method
                | NodeKind::Interface
                | NodeKind::TypeAlias
                | NodeKind::Enum
        )
    }

    /// Kinds that can appear as call targets or sources.
    pub fn is_callable(&self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Method | NodeKind::Class)
    }
}

/// Directed edge types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Contains,
    Defines,
    Calls,
    Imports,
    Extends,
    Implements,
    UsesType,
    Exports,
    MemberOf,
    StepInProcess,
    CoupledWith,
}

impl EdgeType {
    /// All types, in stable persistence order.
    pub const ALL: [EdgeType; 11] = [
        EdgeType::Contains,
        EdgeType::Defines,
        EdgeType::Calls,
        EdgeType::Imports,
        EdgeType::Extends,
        EdgeType::Implements,
        EdgeType::UsesType,
        EdgeType::Exports,
        EdgeType::MemberOf,
        EdgeType::StepInProcess,
        EdgeType::CoupledWith,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::Defines => "DEFINES",
            EdgeType::Calls => "CALLS",
            EdgeType::Imports => "IMPORTS",
            EdgeType::Extends => "EXTENDS",
            EdgeType::Implements => "IMPLEMENTS",
            EdgeType::UsesType => "USES_TYPE",
            EdgeType::Exports => "EXPORTS",
            EdgeType::MemberOf => "MEMBER_OF",
            EdgeType::StepInProcess => "STEP_IN_PROCESS",
            EdgeType::CoupledWith => "COUPLED_WITH",
        }
    }
}

/// Role of a type reference on a USES_TYPE edge. Closed set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TypeRole {
    Param,
    Return,
    Variable,
}

impl TypeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeRole::Param => "param",
            TypeRole::Return => "return",
            TypeRole::Variable => "variable",
        }
    }
}

/// A node in the knowledge graph.
///
/// One shape for every kind; fields that do not apply to a kind stay at
/// their defaults and are skipped during serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    /// Stable identifier: `{kind}:{relative_path}:{qualified_name}`.
    pub id: String,
    pub kind: NodeKind,
    pub name: String,

    /// Repo-relative path (forward slashes). For Folder/File nodes this is
    /// the node's own path; for symbols it is the defining file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub start_line: usize,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub end_line: usize,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,

    /// Body snippet (capped by `AnalysisConfig::body_snippet_limit`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,

    /// Owning class for methods (`User` for `User.save`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,

    /// Base names as written in source, unresolved (Class nodes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases_syntactic: Vec<String>,

    /// Method names declared on an Interface node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods_declared: Vec<String>,

    /// Variant names (Enum nodes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,

    /// Aliased type as written in source (TypeAlias nodes).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_syntactic: String,

    /// Parameter arity for functions/methods (override matching).
    #[serde(default, skip_serializing_if = "is_zero")]
    pub arity: usize,

    // File-only attributes.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub byte_size: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub parse_failed: bool,

    // Symbol flags.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_exported: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_test: bool,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_entry_point: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_ctor: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_property: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_override: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_stub: bool,

    // Community-only attributes.
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub cohesion: f64,

    // Process-only attributes.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entry_symbol_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flow_kind: String,

    /// Embedding vector (set by phase 12, absent on encoder failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}
fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}
fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

impl GraphNode {
    /// Create a node with defaults for every optional field.
    pub fn new(kind: NodeKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            file_path: String::new(),
            language: String::new(),
            start_line: 0,
            end_line: 0,
            signature: String::new(),
            body: String::new(),
            class_name: String::new(),
            decorators: Vec::new(),
            bases_syntactic: Vec::new(),
            methods_declared: Vec::new(),
            variants: Vec::new(),
            target_syntactic: String::new(),
            arity: 0,
            byte_size: 0,
            hash: String::new(),
            parse_failed: false,
            is_exported: false,
            is_test: false,
            is_dead: false,
            is_entry_point: false,
            is_ctor: false,
            is_property: false,
            is_override: false,
            is_stub: false,
            cohesion: 0.0,
            entry_symbol_id: String::new(),
            flow_kind: String::new(),
            embedding: None,
        }
    }
}

/// A directed, typed, labelled edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub edge_type: EdgeType,
    pub source: String,
    pub target: String,

    /// Call-resolution certainty, always set on CALLS edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Role, always set on USES_TYPE edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<TypeRole>,

    /// BFS distance, always set on STEP_IN_PROCESS edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,

    /// Coupling strength, always set on COUPLED_WITH edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,

    /// Shared-commit count, always set on COUPLED_WITH edges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_changes: Option<u32>,

    /// Imported symbol names, set on IMPORTS edges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,
}

impl GraphEdge {
    /// Create a plain edge with no properties.
    pub fn new(
        edge_type: EdgeType,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            edge_type,
            source: source.into(),
            target: target.into(),
            confidence: None,
            role: None,
            step_number: None,
            strength: None,
            co_changes: None,
            symbols: Vec::new(),
        }
    }

    /// A CALLS edge with a confidence score.
    pub fn calls(source: impl Into<String>, target: impl Into<String>, confidence: f64) -> Self {
        let mut edge = Self::new(EdgeType::Calls, source, target);
        edge.confidence = Some(confidence);
        edge
    }

    /// A USES_TYPE edge with a role.
    pub fn uses_type(source: impl Into<String>, target: impl Into<String>, role: TypeRole) -> Self {
        let mut edge = Self::new(EdgeType::UsesType, source, target);
        edge.role = Some(role);
        edge
    }

    /// Identity key: edges are unique by (source, target, type, role).
    pub fn identity(&self) -> (String, String, EdgeType, Option<TypeRole>) {
        (
            self.source.clone(),
            self.target.clone(),
            self.edge_type,
            self.role,
        )
    }
}

/// Build a node identifier: `{kind}:{relative_path}:{qualified_name}`.
///
/// Folder/File identifiers omit the name segment. The result is the graph's
/// only cross-phase handle, so it must be deterministic.
pub fn node_id(kind: NodeKind, file_path: &str, qualified_name: &str) -> String {
    if qualified_name.is_empty() {
        format!("{}:{}", kind.id_prefix(), file_path)
    } else {
        format!("{}:{}:{}", kind.id_prefix(), file_path, qualified_name)
    }
}

/// Deterministic UUID for Community/Process nodes.
///
/// Derived from a fixed namespace + an ordinal label, so identity is fresh
/// (not path-derived) yet stable across runs.
pub fn synthetic_id(kind: NodeKind, ordinal_label: &str) -> String {
    let uuid = Uuid::new_v5(
        &ID_NAMESPACE,
        format!("{}:{}", kind.id_prefix(), ordinal_label).as_bytes(),
    );
    format!("{}:{}", kind.id_prefix(), uuid)
}
