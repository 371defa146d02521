//! Python symbol extraction using tree-sitter-python.
//!
//! Extracts functions, classes, methods, decorators, imports, call sites,
//! type annotations, and inheritance from Python source code.
//!
//! Pure function: input (source bytes) → `ParseOutput`. No filesystem
//! access. No global state. Cross-file resolution happens later in the
//! pipeline.

use std::collections::HashMap;

use crate::graph::TypeRole;

use super::{
    end_line, node_string, start_line, CallSite, HeritageKind, HeritageRecord, ImportRecord,
    ParseOutput, SymbolCategory, SymbolRecord, TypeRefRecord,
};

/// Built-in types skipped when extracting type references.
const BUILTIN_TYPES: &[&str] = &[
    "str", "int", "float", "bool", "None", "list", "dict", "set", "tuple", "Any", "Optional",
    "bytes", "complex", "object", "type",
];

/// Parse Python source into a `ParseOutput`.
///
/// Returns `None` when tree-sitter cannot produce a tree at all; the caller
/// marks the file `parse_failed`.
pub fn parse(parser: &mut tree_sitter::Parser, source: &[u8]) -> Option<ParseOutput> {
    let tree = parser.parse(source, None)?;
    let mut output = ParseOutput::default();
    let mut types = HashMap::new();

    walk(&tree.root_node(), source, &mut output, "", &mut types);
    extract_calls(&tree.root_node(), source, &mut output, &types);

    // A tree that is all errors with nothing extracted counts as a parse
    // failure; partial trees with recoverable symbols do not.
    if output.symbols.is_empty() && !source.is_empty() && tree.root_node().has_error() {
        return None;
    }
    Some(output)
}

fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// Recursive walk extracting definitions, imports, and annotations.
///
/// `class_name` is the enclosing class (methods); `types` accumulates
/// locally visible `name -> type` annotations for receiver typing.
fn walk(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    class_name: &str,
    types: &mut HashMap<String, String>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "decorated_definition" => {
                let decorators = extract_decorators(&child, source);
                if let Some(definition) = child.child_by_field_name("definition") {
                    walk_definition(&definition, source, output, class_name, &decorators, types);
                }
            }
            "function_definition" | "class_definition" => {
                walk_definition(&child, source, output, class_name, &[], types);
            }
            "import_statement" => extract_import(&child, source, output),
            "import_from_statement" => extract_import_from(&child, source, output),
            "expression_statement" => {
                extract_annotated_assignment(&child, source, output, types);
                walk(&child, source, output, class_name, types);
            }
            _ => walk(&child, source, output, class_name, types),
        }
    }
}

fn walk_definition(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    class_name: &str,
    decorators: &[String],
    types: &mut HashMap<String, String>,
) {
    match node.kind() {
        "function_definition" => {
            extract_function(node, source, output, class_name, decorators, types)
        }
        "class_definition" => extract_class(node, source, output, decorators, types),
        _ => {}
    }
}

fn extract_function(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    class_name: &str,
    decorators: &[String],
    types: &mut HashMap<String, String>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_string(&name_node, source);

    let category = if class_name.is_empty() {
        SymbolCategory::Function
    } else {
        SymbolCategory::Method
    };

    let params_node = node.child_by_field_name("parameters");
    let arity = params_node.map(|p| parameter_arity(&p, source)).unwrap_or(0);

    output.symbols.push(SymbolRecord {
        name: name.clone(),
        category,
        class_name: class_name.to_string(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: build_signature(node, source),
        body: node_string(node, source),
        decorators: decorators.to_vec(),
        is_exported: false,
        is_ctor: matches!(name.as_str(), "__init__" | "__new__"),
        is_property: decorators.iter().any(|d| d == "property"),
        is_stub: false,
        arity,
        bases: Vec::new(),
        methods_declared: Vec::new(),
        variants: Vec::new(),
        target_syntactic: String::new(),
    });

    // Parameter type annotations.
    if let Some(params) = params_node {
        extract_param_types(&params, source, output, types);
    }

    // Return type annotation.
    if let Some(return_type) = node.child_by_field_name("return_type") {
        let type_name = primary_type_name(&return_type, source);
        if !type_name.is_empty() && !is_builtin_type(&type_name) {
            output.type_refs.push(TypeRefRecord {
                name: type_name,
                role: TypeRole::Return,
                line: start_line(&return_type),
                param_name: String::new(),
            });
        }
    }

    // Nested definitions inside the body are standalone symbols, not
    // methods of the enclosing class.
    if let Some(body) = node.child_by_field_name("body") {
        walk(&body, source, output, "", types);
    }
}

fn extract_class(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    decorators: &[String],
    types: &mut HashMap<String, String>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let class_name = node_string(&name_node, source);

    // Inheritance: every Python base is syntactically "extends"; phase 6
    // re-types the edge from the resolved target's kind.
    let mut bases = Vec::new();
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        let mut cursor = superclasses.walk();
        for child in superclasses.children(&mut cursor) {
            if child.is_named() && matches!(child.kind(), "identifier" | "attribute") {
                let base = last_identifier(&child, source);
                if !base.is_empty() {
                    bases.push(base.clone());
                    output.heritage.push(HeritageRecord {
                        child: class_name.clone(),
                        kind: HeritageKind::Extends,
                        parent: base,
                    });
                }
            }
        }
    }

    output.symbols.push(SymbolRecord {
        name: class_name.clone(),
        category: SymbolCategory::Class,
        class_name: String::new(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: String::new(),
        body: node_string(node, source),
        decorators: decorators.to_vec(),
        is_exported: false,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: 0,
        bases,
        methods_declared: Vec::new(),
        variants: Vec::new(),
        target_syntactic: String::new(),
    });

    if let Some(body) = node.child_by_field_name("body") {
        walk(&body, source, output, &class_name, types);
    }
}

/// Decorator names without the leading `@` or call arguments:
/// `@app.route("/x")` → `app.route`.
fn extract_decorators(node: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        let text = node_string(&child, source);
        let trimmed = text.trim_start_matches('@');
        let name = trimmed.split('(').next().unwrap_or(trimmed).trim();
        if !name.is_empty() {
            decorators.push(name.to_string());
        }
    }
    decorators
}

fn build_signature(func_node: &tree_sitter::Node, source: &[u8]) -> String {
    let name = func_node
        .child_by_field_name("name")
        .map(|n| node_string(&n, source))
        .unwrap_or_default();
    let params = func_node
        .child_by_field_name("parameters")
        .map(|n| node_string(&n, source))
        .unwrap_or_default();
    let mut sig = format!("def {name}{params}");
    if let Some(return_type) = func_node.child_by_field_name("return_type") {
        sig.push_str(" -> ");
        sig.push_str(&node_string(&return_type, source));
    }
    sig
}

/// Parameter count excluding `self`/`cls`.
fn parameter_arity(params: &tree_sitter::Node, source: &[u8]) -> usize {
    let mut count = 0;
    let mut cursor = params.walk();
    for (i, child) in params.named_children(&mut cursor).enumerate() {
        let text = match child.kind() {
            "identifier" => node_string(&child, source),
            "typed_parameter" | "default_parameter" | "typed_default_parameter" => {
                first_identifier(&child, source)
            }
            _ => continue,
        };
        if i == 0 && (text == "self" || text == "cls") {
            continue;
        }
        count += 1;
    }
    count
}

fn extract_param_types(
    params: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    types: &mut HashMap<String, String>,
) {
    let mut cursor = params.walk();
    for param in params.children(&mut cursor) {
        if !matches!(param.kind(), "typed_parameter" | "typed_default_parameter") {
            continue;
        }
        let param_name = first_identifier(&param, source);
        let Some(type_node) = param.child_by_field_name("type") else {
            continue;
        };
        let type_name = primary_type_name(&type_node, source);
        if type_name.is_empty() {
            continue;
        }
        if !param_name.is_empty() {
            types.insert(param_name.clone(), type_name.clone());
        }
        if !is_builtin_type(&type_name) {
            output.type_refs.push(TypeRefRecord {
                name: type_name,
                role: TypeRole::Param,
                line: start_line(&type_node),
                param_name,
            });
        }
    }
}

/// Variable annotations: `x: Config = ...` (also `self.x: Config = ...`).
fn extract_annotated_assignment(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    types: &mut HashMap<String, String>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "assignment" {
            continue;
        }
        let Some(type_node) = child.child_by_field_name("type") else {
            continue;
        };
        let type_name = primary_type_name(&type_node, source);
        if type_name.is_empty() {
            continue;
        }
        if let Some(left) = child.child_by_field_name("left") {
            let var = last_identifier(&left, source);
            if !var.is_empty() {
                types.insert(var, type_name.clone());
            }
        }
        if !is_builtin_type(&type_name) {
            output.type_refs.push(TypeRefRecord {
                name: type_name,
                role: TypeRole::Variable,
                line: start_line(&type_node),
                param_name: String::new(),
            });
        }
    }
}

/// `import os.path` / `import numpy as np`.
fn extract_import(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let module = node_string(&child, source);
                let last = module.rsplit('.').next().unwrap_or(&module).to_string();
                output.imports.push(ImportRecord {
                    module,
                    names: vec![last],
                    alias: String::new(),
                    is_relative: false,
                });
            }
            "aliased_import" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let module = node_string(&name_node, source);
                let last = module.rsplit('.').next().unwrap_or(&module).to_string();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|a| node_string(&a, source))
                    .unwrap_or_default();
                output.imports.push(ImportRecord {
                    module,
                    names: vec![last],
                    alias,
                    is_relative: false,
                });
            }
            _ => {}
        }
    }
}

/// `from x import y, z` / `from .sibling import y`.
fn extract_import_from(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput) {
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };
    let is_relative = module_node.kind() == "relative_import";
    let module = node_string(&module_node, source);

    let mut names = Vec::new();
    let mut past_import = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "import" {
            past_import = true;
            continue;
        }
        if !past_import {
            continue;
        }
        match child.kind() {
            "dotted_name" => names.push(node_string(&child, source)),
            "aliased_import" => {
                if let Some(name_node) = child.child_by_field_name("name") {
                    names.push(node_string(&name_node, source));
                }
            }
            _ => {}
        }
    }

    output.imports.push(ImportRecord {
        module,
        names,
        alias: String::new(),
        is_relative,
    });
}

/// Recursively find all call nodes and record them with receivers and
/// bare-identifier arguments.
fn extract_calls(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    types: &HashMap<String, String>,
) {
    if node.kind() == "call" {
        extract_call(node, source, output, types);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        extract_calls(&child, source, output, types);
    }
}

fn extract_call(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    types: &HashMap<String, String>,
) {
    let Some(func_node) = node.child_by_field_name("function") else {
        return;
    };
    let line = start_line(node);
    let arguments = bare_identifier_arguments(node, source);

    match func_node.kind() {
        "identifier" => {
            output.calls.push(CallSite {
                name: node_string(&func_node, source),
                line,
                receiver: String::new(),
                receiver_type: None,
                arguments,
            });
        }
        "attribute" => {
            let name = func_node
                .child_by_field_name("attribute")
                .map(|a| node_string(&a, source))
                .unwrap_or_default();
            if name.is_empty() {
                return;
            }
            let receiver = func_node
                .child_by_field_name("object")
                .map(|o| leftmost_identifier(&o, source))
                .unwrap_or_default();
            let receiver_type = types.get(&receiver).cloned();
            output.calls.push(CallSite {
                name,
                line,
                receiver,
                receiver_type,
                arguments,
            });
        }
        _ => {}
    }
}

/// Bare identifier arguments are callback candidates:
/// `map(transform, items)` yields `["transform", "items"]`.
fn bare_identifier_arguments(call_node: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let Some(args) = call_node.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut identifiers = Vec::new();
    let mut cursor = args.walk();
    for child in args.named_children(&mut cursor) {
        if child.kind() == "identifier" {
            identifiers.push(node_string(&child, source));
        }
    }
    identifiers
}

/// Primary type name from an annotation: `User` stays `User`,
/// `list[User]` → `list`, `Optional[User]` → `Optional`.
fn primary_type_name(type_node: &tree_sitter::Node, source: &[u8]) -> String {
    if type_node.kind() == "identifier" {
        return node_string(type_node, source);
    }
    first_identifier(type_node, source)
}

/// Leftmost identifier of an expression (`self.logger.info` → `self`).
fn leftmost_identifier(node: &tree_sitter::Node, source: &[u8]) -> String {
    let mut current = *node;
    loop {
        if current.kind() == "identifier" {
            return node_string(&current, source);
        }
        match current.child(0) {
            Some(child) => current = child,
            None => return String::new(),
        }
    }
}

/// DFS for the first identifier inside a node.
fn first_identifier(node: &tree_sitter::Node, source: &[u8]) -> String {
    if node.kind() == "identifier" {
        return node_string(node, source);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let found = first_identifier(&child, source);
        if !found.is_empty() {
            return found;
        }
    }
    String::new()
}

/// Last identifier inside a node (`a.b.c` → `c`).
fn last_identifier(node: &tree_sitter::Node, source: &[u8]) -> String {
    if node.kind() == "identifier" {
        return node_string(node, source);
    }
    if node.kind() == "attribute" {
        if let Some(attr) = node.child_by_field_name("attribute") {
            return node_string(&attr, source);
        }
    }
    let mut last = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let found = last_identifier(&child, source);
        if !found.is_empty() {
            last = found;
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::pool::with_parser;
    use crate::ingest::Language;

    fn parse_source(source: &str) -> ParseOutput {
        with_parser(Language::Python, |parser| {
            parse(parser, source.as_bytes()).expect("tree expected")
        })
        .unwrap()
    }

    #[test]
    fn test_extract_simple_function() {
        let output = parse_source("def foo():\n    pass\n");
        assert_eq!(output.symbols.len(), 1);
        assert_eq!(output.symbols[0].name, "foo");
        assert_eq!(output.symbols[0].category, SymbolCategory::Function);
        assert_eq!(output.symbols[0].start_line, 1);
    }

    #[test]
    fn test_method_gets_class_name() {
        let output = parse_source("class User:\n    def save(self):\n        pass\n");
        let methods: Vec<_> = output
            .symbols
            .iter()
            .filter(|s| s.category == SymbolCategory::Method)
            .collect();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "save");
        assert_eq!(methods[0].class_name, "User");
        assert_eq!(methods[0].qualified_name(), "User.save");
    }

    #[test]
    fn test_constructor_flagged() {
        let output = parse_source("class User:\n    def __init__(self, name):\n        pass\n");
        let ctor = output
            .symbols
            .iter()
            .find(|s| s.name == "__init__")
            .unwrap();
        assert!(ctor.is_ctor);
        assert_eq!(ctor.arity, 1, "self excluded from arity");
    }

    #[test]
    fn test_decorators_extracted() {
        let output = parse_source("@app.route(\"/x\")\ndef handler():\n    pass\n");
        assert_eq!(output.symbols.len(), 1);
        assert_eq!(output.symbols[0].decorators, vec!["app.route".to_string()]);
    }

    #[test]
    fn test_property_flag() {
        let output = parse_source("class A:\n    @property\n    def value(self):\n        return 1\n");
        let prop = output.symbols.iter().find(|s| s.name == "value").unwrap();
        assert!(prop.is_property);
    }

    #[test]
    fn test_class_heritage() {
        let output = parse_source("class Admin(User):\n    pass\n");
        assert_eq!(output.heritage.len(), 1);
        assert_eq!(output.heritage[0].child, "Admin");
        assert_eq!(output.heritage[0].parent, "User");
        assert_eq!(output.heritage[0].kind, HeritageKind::Extends);
        let class = &output.symbols[0];
        assert_eq!(class.bases, vec!["User".to_string()]);
    }

    #[test]
    fn test_plain_import() {
        let output = parse_source("import os.path\n");
        assert_eq!(output.imports.len(), 1);
        assert_eq!(output.imports[0].module, "os.path");
        assert_eq!(output.imports[0].names, vec!["path".to_string()]);
        assert!(!output.imports[0].is_relative);
    }

    #[test]
    fn test_from_import() {
        let output = parse_source("from b import g, h\n");
        assert_eq!(output.imports.len(), 1);
        assert_eq!(output.imports[0].module, "b");
        assert_eq!(
            output.imports[0].names,
            vec!["g".to_string(), "h".to_string()]
        );
    }

    #[test]
    fn test_relative_import() {
        let output = parse_source("from .sibling import thing\n");
        assert_eq!(output.imports.len(), 1);
        assert!(output.imports[0].is_relative);
        assert_eq!(output.imports[0].module, ".sibling");
    }

    #[test]
    fn test_simple_call() {
        let output = parse_source("def f():\n    g()\n");
        assert_eq!(output.calls.len(), 1);
        assert_eq!(output.calls[0].name, "g");
        assert_eq!(output.calls[0].line, 2);
        assert!(output.calls[0].receiver.is_empty());
    }

    #[test]
    fn test_method_call_receiver() {
        let output = parse_source("def f():\n    user.save()\n");
        assert_eq!(output.calls.len(), 1);
        assert_eq!(output.calls[0].name, "save");
        assert_eq!(output.calls[0].receiver, "user");
    }

    #[test]
    fn test_receiver_type_from_param_annotation() {
        let output = parse_source("def f(repo: UserRepo):\n    repo.get_all()\n");
        let call = output.calls.iter().find(|c| c.name == "get_all").unwrap();
        assert_eq!(call.receiver, "repo");
        assert_eq!(call.receiver_type.as_deref(), Some("UserRepo"));
    }

    #[test]
    fn test_callback_arguments_recorded() {
        let output = parse_source("def f():\n    run(transform, 1)\n");
        let call = output.calls.iter().find(|c| c.name == "run").unwrap();
        assert_eq!(call.arguments, vec!["transform".to_string()]);
    }

    #[test]
    fn test_param_and_return_type_refs() {
        let output = parse_source("def f(user: User) -> Session:\n    pass\n");
        let roles: Vec<_> = output
            .type_refs
            .iter()
            .map(|t| (t.name.as_str(), t.role))
            .collect();
        assert!(roles.contains(&("User", TypeRole::Param)));
        assert!(roles.contains(&("Session", TypeRole::Return)));
    }

    #[test]
    fn test_builtin_types_skipped() {
        let output = parse_source("def f(x: int) -> str:\n    pass\n");
        assert!(output.type_refs.is_empty());
    }

    #[test]
    fn test_variable_annotation() {
        let output = parse_source("config: Config = load()\n");
        let var_refs: Vec<_> = output
            .type_refs
            .iter()
            .filter(|t| t.role == TypeRole::Variable)
            .collect();
        assert_eq!(var_refs.len(), 1);
        assert_eq!(var_refs[0].name, "Config");
    }

    #[test]
    fn test_nested_function_not_a_method() {
        let output = parse_source("def outer():\n    def inner():\n        pass\n");
        let inner = output.symbols.iter().find(|s| s.name == "inner").unwrap();
        assert_eq!(inner.category, SymbolCategory::Function);
        assert!(inner.class_name.is_empty());
    }

    #[test]
    fn test_empty_file() {
        let output = parse_source("");
        assert!(output.symbols.is_empty());
        assert!(output.calls.is_empty());
    }

    #[test]
    fn test_chained_attribute_receiver_uses_root() {
        let output = parse_source("def f(self):\n    self.logger.info(\"x\")\n");
        let call = output.calls.iter().find(|c| c.name == "info").unwrap();
        assert_eq!(call.receiver, "self");
    }
}
