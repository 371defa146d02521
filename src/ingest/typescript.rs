//! TypeScript / TSX / JavaScript extraction using tree-sitter.
//!
//! One walker covers all three dialects: the JavaScript grammar simply
//! never produces the TypeScript-only node kinds (interfaces, type
//! aliases, annotations). JSX usage is recorded as ordinary calls to the
//! component symbol.

use std::collections::HashMap;

use crate::graph::TypeRole;

use super::{
    end_line, node_string, start_line, CallSite, HeritageKind, HeritageRecord, ImportRecord,
    ParseOutput, SymbolCategory, SymbolRecord, TypeRefRecord,
};

/// Built-in TypeScript types skipped in type references.
const BUILTIN_TYPES: &[&str] = &[
    "string", "number", "boolean", "void", "any", "unknown", "never", "null", "undefined",
    "object",
];

/// Parse TS/TSX/JS source into a `ParseOutput`.
///
/// Returns `None` when tree-sitter cannot produce a tree; the caller marks
/// the file `parse_failed`.
pub fn parse(parser: &mut tree_sitter::Parser, source: &[u8]) -> Option<ParseOutput> {
    let tree = parser.parse(source, None)?;
    let mut output = ParseOutput::default();
    let mut ctx = Context::default();
    walk(&tree.root_node(), source, &mut output, &mut ctx);

    if output.symbols.is_empty() && !source.is_empty() && tree.root_node().has_error() {
        return None;
    }
    Some(output)
}

/// Walk state: enclosing class, export wrapper, locally visible types.
#[derive(Default)]
struct Context {
    class_name: String,
    exported: bool,
    types: HashMap<String, String>,
}

fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name.to_ascii_lowercase().as_str())
}

fn walk(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput, ctx: &mut Context) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "export_statement" => extract_export(&child, source, output, ctx),
            "function_declaration" => extract_function(&child, source, output, ctx),
            "lexical_declaration" | "variable_declaration" => {
                extract_variable_declaration(&child, source, output, ctx)
            }
            "class_declaration" => extract_class(&child, source, output, ctx),
            "interface_declaration" => extract_interface(&child, source, output, ctx),
            "type_alias_declaration" => extract_type_alias(&child, source, output, ctx),
            "enum_declaration" => extract_enum(&child, source, output, ctx),
            "import_statement" => extract_import(&child, source, output),
            "method_definition" => extract_method(&child, source, output, ctx),
            "call_expression" => {
                extract_call(&child, source, output, ctx);
                walk(&child, source, output, ctx);
            }
            "new_expression" => {
                extract_new(&child, source, output, ctx);
                walk(&child, source, output, ctx);
            }
            "jsx_opening_element" | "jsx_self_closing_element" => {
                extract_jsx(&child, source, output);
                walk(&child, source, output, ctx);
            }
            "public_field_definition" => {
                extract_field_type(&child, source, output, ctx);
                walk(&child, source, output, ctx);
            }
            _ => walk(&child, source, output, ctx),
        }
    }
}

/// `export function f ...`, `export default ...`, `export { A, B }`.
fn extract_export(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let is_default = {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).any(|c| c.kind() == "default");
        found
    };

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "export_clause" => {
                // export { A, B as C }
                let mut spec_cursor = child.walk();
                for spec in child.named_children(&mut spec_cursor) {
                    if spec.kind() == "export_specifier" {
                        if let Some(name_node) = spec.child_by_field_name("name") {
                            output.exports.push(node_string(&name_node, source));
                        }
                    }
                }
            }
            "function_declaration"
            | "class_declaration"
            | "interface_declaration"
            | "type_alias_declaration"
            | "enum_declaration"
            | "lexical_declaration"
            | "variable_declaration" => {
                let before = output.symbols.len();
                let was_exported = ctx.exported;
                ctx.exported = true;
                walk_single(&child, source, output, ctx);
                ctx.exported = was_exported;
                for symbol in &output.symbols[before..] {
                    output.exports.push(symbol.name.clone());
                }
            }
            // export default function() {} / export default handler
            "arrow_function" | "function_expression" if is_default => {
                output.exports.push("default".to_string());
            }
            "identifier" if is_default => {
                output.exports.push(node_string(&child, source));
            }
            _ => walk(&child, source, output, ctx),
        }
    }
}

fn walk_single(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    match node.kind() {
        "function_declaration" => extract_function(node, source, output, ctx),
        "class_declaration" => extract_class(node, source, output, ctx),
        "interface_declaration" => extract_interface(node, source, output, ctx),
        "type_alias_declaration" => extract_type_alias(node, source, output, ctx),
        "enum_declaration" => extract_enum(node, source, output, ctx),
        "lexical_declaration" | "variable_declaration" => {
            extract_variable_declaration(node, source, output, ctx)
        }
        _ => {}
    }
}

fn extract_function(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_string(&name_node, source);

    output.symbols.push(SymbolRecord {
        name,
        category: SymbolCategory::Function,
        class_name: String::new(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: build_signature(node, source),
        body: node_string(node, source),
        decorators: Vec::new(),
        is_exported: ctx.exported,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: arity_of(node),
        bases: Vec::new(),
        methods_declared: Vec::new(),
        variants: Vec::new(),
        target_syntactic: String::new(),
    });

    extract_function_types(node, source, output, ctx);
    if let Some(body) = node.child_by_field_name("body") {
        walk(&body, source, output, ctx);
    }
}

fn extract_method(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let raw_name = node_string(&name_node, source);
    // `constructor` members are stored as `Class.ctor`, never under the
    // class's own name.
    let is_ctor = raw_name == "constructor";
    let name = if is_ctor { "ctor".to_string() } else { raw_name };

    output.symbols.push(SymbolRecord {
        name,
        category: SymbolCategory::Method,
        class_name: ctx.class_name.clone(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: build_signature(node, source),
        body: node_string(node, source),
        decorators: Vec::new(),
        is_exported: false,
        is_ctor,
        is_property: false,
        is_stub: false,
        arity: arity_of(node),
        bases: Vec::new(),
        methods_declared: Vec::new(),
        variants: Vec::new(),
        target_syntactic: String::new(),
    });

    extract_function_types(node, source, output, ctx);
    if let Some(body) = node.child_by_field_name("body") {
        walk(&body, source, output, ctx);
    }
}

/// Arrow functions / function expressions bound to `const`, plus
/// `require()` imports and variable type annotations.
fn extract_variable_declaration(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = child.child_by_field_name("name") else {
            continue;
        };
        let var_name = node_string(&name_node, source);

        // const x: Config = ...
        extract_variable_type_annotation(&child, source, output, ctx, &var_name);

        let Some(value_node) = child.child_by_field_name("value") else {
            continue;
        };
        match value_node.kind() {
            "arrow_function" | "function_expression" => {
                output.symbols.push(SymbolRecord {
                    name: var_name,
                    category: SymbolCategory::Function,
                    class_name: String::new(),
                    start_line: start_line(node),
                    end_line: end_line(node),
                    signature: build_signature(&value_node, source),
                    body: node_string(node, source),
                    decorators: Vec::new(),
                    is_exported: ctx.exported,
                    is_ctor: false,
                    is_property: false,
                    is_stub: false,
                    arity: arity_of(&value_node),
                    bases: Vec::new(),
                    methods_declared: Vec::new(),
                    variants: Vec::new(),
                    target_syntactic: String::new(),
                });
                extract_function_types(&value_node, source, output, ctx);
                if let Some(body) = value_node.child_by_field_name("body") {
                    walk(&body, source, output, ctx);
                }
            }
            "call_expression" => {
                extract_require(&value_node, source, output, &var_name);
                extract_call(&value_node, source, output, ctx);
                walk(&value_node, source, output, ctx);
            }
            _ => walk(&value_node, source, output, ctx),
        }
    }
}

/// `const foo = require('./foo')` behaves like an import.
fn extract_require(
    call_node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    var_name: &str,
) {
    let Some(func_node) = call_node.child_by_field_name("function") else {
        return;
    };
    if node_string(&func_node, source) != "require" {
        return;
    }
    let Some(args) = call_node.child_by_field_name("arguments") else {
        return;
    };
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        if arg.kind() == "string" {
            let module = string_value(&arg, source);
            if !module.is_empty() {
                output.imports.push(ImportRecord {
                    is_relative: module.starts_with('.'),
                    module,
                    names: vec![var_name.to_string()],
                    alias: String::new(),
                });
            }
            return;
        }
    }
}

fn extract_class(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let class_name = node_string(&name_node, source);

    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "class_heritage" {
            continue;
        }
        let mut heritage_cursor = child.walk();
        for clause in child.children(&mut heritage_cursor) {
            let kind = match clause.kind() {
                "extends_clause" => HeritageKind::Extends,
                "implements_clause" => HeritageKind::Implements,
                _ => continue,
            };
            let mut clause_cursor = clause.walk();
            for sub in clause.children(&mut clause_cursor) {
                if matches!(sub.kind(), "identifier" | "type_identifier") {
                    let parent = node_string(&sub, source);
                    bases.push(parent.clone());
                    output.heritage.push(HeritageRecord {
                        child: class_name.clone(),
                        kind,
                        parent,
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
        decorators: Vec::new(),
        is_exported: ctx.exported,
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
        let saved = std::mem::replace(&mut ctx.class_name, class_name);
        walk(&body, source, output, ctx);
        ctx.class_name = saved;
    }
}

/// Interfaces produce an Interface node plus one stub Method per declared
/// method (contracts, never dead).
fn extract_interface(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_string(&name_node, source);

    // Interface inheritance is always "extends".
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "extends_type_clause" {
            let mut sub_cursor = child.walk();
            for sub in child.children(&mut sub_cursor) {
                if matches!(sub.kind(), "identifier" | "type_identifier") {
                    output.heritage.push(HeritageRecord {
                        child: name.clone(),
                        kind: HeritageKind::Extends,
                        parent: node_string(&sub, source),
                    });
                }
            }
        }
    }

    let mut methods_declared = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut body_cursor = body.walk();
        for member in body.named_children(&mut body_cursor) {
            if member.kind() != "method_signature" {
                continue;
            }
            let Some(member_name) = member.child_by_field_name("name") else {
                continue;
            };
            let method_name = node_string(&member_name, source);
            methods_declared.push(method_name.clone());
            output.symbols.push(SymbolRecord {
                name: method_name,
                category: SymbolCategory::Method,
                class_name: name.clone(),
                start_line: start_line(&member),
                end_line: end_line(&member),
                signature: node_string(&member, source),
                body: String::new(),
                decorators: Vec::new(),
                is_exported: false,
                is_ctor: false,
                is_property: false,
                is_stub: true,
                arity: arity_of(&member),
                bases: Vec::new(),
                methods_declared: Vec::new(),
                variants: Vec::new(),
                target_syntactic: String::new(),
            });
        }
    }

    output.symbols.push(SymbolRecord {
        name,
        category: SymbolCategory::Interface,
        class_name: String::new(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: String::new(),
        body: node_string(node, source),
        decorators: Vec::new(),
        is_exported: ctx.exported,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: 0,
        bases: Vec::new(),
        methods_declared,
        variants: Vec::new(),
        target_syntactic: String::new(),
    });
}

fn extract_type_alias(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let target = node
        .child_by_field_name("value")
        .map(|v| node_string(&v, source))
        .unwrap_or_default();

    output.symbols.push(SymbolRecord {
        name: node_string(&name_node, source),
        category: SymbolCategory::TypeAlias,
        class_name: String::new(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: String::new(),
        body: node_string(node, source),
        decorators: Vec::new(),
        is_exported: ctx.exported,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: 0,
        bases: Vec::new(),
        methods_declared: Vec::new(),
        variants: Vec::new(),
        target_syntactic: target,
    });
}

fn extract_enum(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let mut variants = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "enum_assignment" => {
                    if let Some(variant_name) = member.child_by_field_name("name") {
                        variants.push(node_string(&variant_name, source));
                    }
                }
                "property_identifier" => variants.push(node_string(&member, source)),
                _ => {}
            }
        }
    }

    output.symbols.push(SymbolRecord {
        name: node_string(&name_node, source),
        category: SymbolCategory::Enum,
        class_name: String::new(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: String::new(),
        body: node_string(node, source),
        decorators: Vec::new(),
        is_exported: ctx.exported,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: 0,
        bases: Vec::new(),
        methods_declared: Vec::new(),
        variants,
        target_syntactic: String::new(),
    });
}

/// ES module import statements.
fn extract_import(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput) {
    let module = node
        .child_by_field_name("source")
        .map(|s| string_value(&s, source))
        .unwrap_or_default();
    if module.is_empty() {
        return;
    }

    let mut names = Vec::new();
    let mut alias = String::new();

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "import_clause" {
            continue;
        }
        let mut clause_cursor = child.walk();
        for clause_child in child.children(&mut clause_cursor) {
            match clause_child.kind() {
                "named_imports" => {
                    let mut spec_cursor = clause_child.walk();
                    for spec in clause_child.named_children(&mut spec_cursor) {
                        if spec.kind() == "import_specifier" {
                            if let Some(spec_name) = spec.child_by_field_name("name") {
                                names.push(node_string(&spec_name, source));
                            }
                        }
                    }
                }
                "namespace_import" => {
                    // import * as utils from '...'
                    let mut ns_cursor = clause_child.walk();
                    for ns_child in clause_child.children(&mut ns_cursor) {
                        if ns_child.kind() == "identifier" {
                            alias = node_string(&ns_child, source);
                            names.push(alias.clone());
                            break;
                        }
                    }
                }
                "identifier" => names.push(node_string(&clause_child, source)),
                _ => {}
            }
        }
    }

    output.imports.push(ImportRecord {
        is_relative: module.starts_with('.'),
        module,
        names,
        alias,
    });
}

fn extract_call(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &Context,
) {
    let Some(func_node) = node.child_by_field_name("function") else {
        return;
    };
    let line = start_line(node);
    let arguments = bare_identifier_arguments(node, source);

    match func_node.kind() {
        "member_expression" => {
            let Some(prop) = func_node.child_by_field_name("property") else {
                return;
            };
            let receiver = func_node
                .child_by_field_name("object")
                .map(|o| leftmost_identifier(&o, source))
                .unwrap_or_default();
            let receiver_type = ctx.types.get(&receiver).cloned();
            output.calls.push(CallSite {
                name: node_string(&prop, source),
                line,
                receiver,
                receiver_type,
                arguments,
            });
        }
        "identifier" => {
            let name = node_string(&func_node, source);
            // require() is handled as an import.
            if name != "require" {
                output.calls.push(CallSite {
                    name,
                    line,
                    receiver: String::new(),
                    receiver_type: None,
                    arguments,
                });
            }
        }
        _ => {}
    }
}

/// `new Foo(...)` is recorded as a call to the `Foo.ctor` candidate name.
/// The tracer binds the declared constructor method, falling back to the
/// class node when the class has no explicit constructor.
fn extract_new(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    _ctx: &Context,
) {
    let Some(ctor) = node.child_by_field_name("constructor") else {
        return;
    };
    if matches!(ctor.kind(), "identifier" | "type_identifier") {
        output.calls.push(CallSite {
            name: format!("{}.ctor", node_string(&ctor, source)),
            line: start_line(node),
            receiver: String::new(),
            receiver_type: None,
            arguments: bare_identifier_arguments(node, source),
        });
    }
}

/// JSX usage counts as a call to the component symbol: `<UserCard />`
/// becomes a call site named `UserCard`.
fn extract_jsx(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    if name_node.kind() != "identifier" {
        return;
    }
    let name = node_string(&name_node, source);
    // Lowercase tags are host elements (div, span), not components.
    if name.chars().next().is_some_and(|c| c.is_uppercase()) {
        output.calls.push(CallSite::plain(name, start_line(node)));
    }
}

/// Typed class fields feed the receiver-type map:
/// `private repo: UserRepository;`
fn extract_field_type(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let field_name = node_string(&name_node, source);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "type_annotation" {
            let type_name = annotation_type_name(&child, source);
            if !type_name.is_empty() {
                ctx.types.insert(field_name.clone(), type_name.clone());
                if !is_builtin_type(&type_name) {
                    output.type_refs.push(TypeRefRecord {
                        name: type_name,
                        role: TypeRole::Variable,
                        line: start_line(&child),
                        param_name: String::new(),
                    });
                }
            }
        }
    }
}

fn extract_function_types(
    func_node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let params = func_node.child_by_field_name("parameters").or_else(|| {
        let mut cursor = func_node.walk();
        let found = func_node
            .children(&mut cursor)
            .find(|c| c.kind() == "formal_parameters");
        found
    });

    if let Some(params) = params {
        let mut cursor = params.walk();
        for param in params.children(&mut cursor) {
            if !matches!(param.kind(), "required_parameter" | "optional_parameter") {
                continue;
            }
            let param_name = param
                .child_by_field_name("pattern")
                .map(|p| node_string(&p, source))
                .unwrap_or_default();
            let mut sub_cursor = param.walk();
            for sub in param.children(&mut sub_cursor) {
                if sub.kind() == "type_annotation" {
                    let type_name = annotation_type_name(&sub, source);
                    if type_name.is_empty() {
                        continue;
                    }
                    if !param_name.is_empty() {
                        ctx.types.insert(param_name.clone(), type_name.clone());
                    }
                    if !is_builtin_type(&type_name) {
                        output.type_refs.push(TypeRefRecord {
                            name: type_name,
                            role: TypeRole::Param,
                            line: start_line(&sub),
                            param_name: param_name.clone(),
                        });
                    }
                }
            }
        }
    }

    // Return type: type_annotation directly on the function node.
    if let Some(return_type) = func_node.child_by_field_name("return_type") {
        let type_name = annotation_type_name(&return_type, source);
        if !type_name.is_empty() && !is_builtin_type(&type_name) {
            output.type_refs.push(TypeRefRecord {
                name: type_name,
                role: TypeRole::Return,
                line: start_line(&return_type),
                param_name: String::new(),
            });
        }
    }
}

/// `const x: Config = ...` on a declarator.
fn extract_variable_type_annotation(
    declarator: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
    var_name: &str,
) {
    let mut cursor = declarator.walk();
    for child in declarator.children(&mut cursor) {
        if child.kind() == "type_annotation" {
            let type_name = annotation_type_name(&child, source);
            if type_name.is_empty() {
                continue;
            }
            ctx.types.insert(var_name.to_string(), type_name.clone());
            if !is_builtin_type(&type_name) {
                output.type_refs.push(TypeRefRecord {
                    name: type_name,
                    role: TypeRole::Variable,
                    line: start_line(&child),
                    param_name: String::new(),
                });
            }
        }
    }
}

/// Simple type name from a `type_annotation` node. Compound types (unions,
/// generics) yield the first recognisable child.
fn annotation_type_name(annotation: &tree_sitter::Node, source: &[u8]) -> String {
    let mut cursor = annotation.walk();
    for child in annotation.children(&mut cursor) {
        match child.kind() {
            "type_identifier" | "predefined_type" | "identifier" => {
                return node_string(&child, source)
            }
            "generic_type" => {
                let mut sub_cursor = child.walk();
                for sub in child.children(&mut sub_cursor) {
                    if sub.kind() == "type_identifier" {
                        return node_string(&sub, source);
                    }
                }
            }
            _ => {}
        }
    }
    String::new()
}

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

fn leftmost_identifier(node: &tree_sitter::Node, source: &[u8]) -> String {
    let mut current = *node;
    loop {
        if matches!(current.kind(), "identifier" | "this") {
            return node_string(&current, source);
        }
        match current.child(0) {
            Some(child) => current = child,
            None => return String::new(),
        }
    }
}

fn string_value(string_node: &tree_sitter::Node, source: &[u8]) -> String {
    let mut cursor = string_node.walk();
    for child in string_node.children(&mut cursor) {
        if child.kind() == "string_fragment" {
            return node_string(&child, source);
        }
    }
    let text = node_string(string_node, source);
    text.trim_matches(|c| c == '\'' || c == '"' || c == '`').to_string()
}

fn build_signature(node: &tree_sitter::Node, source: &[u8]) -> String {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_string(&n, source))
        .unwrap_or_default();
    let mut params_text = String::new();
    let mut return_text = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "formal_parameters" => params_text = node_string(&child, source),
            "type_annotation" => return_text = node_string(&child, source),
            _ => {}
        }
    }
    format!("{name}{params_text}{return_text}")
}

fn arity_of(func_node: &tree_sitter::Node) -> usize {
    let params = func_node.child_by_field_name("parameters").or_else(|| {
        let mut cursor = func_node.walk();
        let found = func_node
            .children(&mut cursor)
            .find(|c| c.kind() == "formal_parameters");
        found
    });
    let Some(params) = params else { return 0 };
    let mut cursor = params.walk();
    params.named_children(&mut cursor).count()
}
