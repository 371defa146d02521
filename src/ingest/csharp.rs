//! C# extraction using tree-sitter-c-sharp.
//!
//! Extracts classes, structs, records, interfaces, enums, methods,
//! constructors, attributes, using directives, call sites, and type
//! references. Attributes (`[HttpGet]`, `[Route("/api")]`) are stored as
//! decorators for schema consistency with the other languages.
//!
//! Constructors are stored under `ClassName.ctor`, never under the class's
//! own name, so a constructor can never collide with its class node.

use std::collections::HashMap;

use crate::graph::TypeRole;

use super::{
    end_line, node_string, start_line, CallSite, HeritageKind, HeritageRecord, ImportRecord,
    ParseOutput, SymbolCategory, SymbolRecord, TypeRefRecord,
};

const BUILTIN_TYPES: &[&str] = &[
    "bool", "byte", "sbyte", "char", "decimal", "double", "float", "int", "uint", "long",
    "ulong", "short", "ushort", "string", "object", "void", "dynamic", "var", "nint", "nuint",
];

/// Parse C# source into a `ParseOutput`.
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

#[derive(Default)]
struct Context {
    class_name: String,
    /// Locally visible `name -> type` from fields, params, and locals.
    types: HashMap<String, String>,
}

fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

fn walk(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput, ctx: &mut Context) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "using_directive" => extract_using(&child, source, output),
            "class_declaration" | "struct_declaration" | "record_declaration" => {
                extract_class(&child, source, output, ctx)
            }
            "interface_declaration" => extract_interface(&child, source, output, ctx),
            "enum_declaration" => extract_enum(&child, source, output),
            "method_declaration" => extract_method(&child, source, output, ctx),
            "constructor_declaration" => extract_constructor(&child, source, output, ctx),
            "field_declaration" => {
                extract_field(&child, source, output, ctx);
            }
            "property_declaration" => {
                extract_property(&child, source, ctx);
            }
            "local_declaration_statement" => {
                extract_local_types(&child, source, output, ctx);
                walk(&child, source, output, ctx);
            }
            "invocation_expression" => {
                extract_call(&child, source, output, ctx);
                walk(&child, source, output, ctx);
            }
            "object_creation_expression" => {
                extract_new(&child, source, output);
                walk(&child, source, output, ctx);
            }
            _ => walk(&child, source, output, ctx),
        }
    }
}

/// `using System.Linq;`: the last segment is the locally visible name.
fn extract_using(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "identifier" | "qualified_name") {
            let module = node_string(&child, source);
            let last = module.rsplit('.').next().unwrap_or(&module).to_string();
            output.imports.push(ImportRecord {
                module,
                names: vec![last],
                alias: String::new(),
                is_relative: false,
            });
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
    let decorators = extract_attributes(node, source);
    let is_exported = has_public_modifier(node, source);

    let bases = extract_base_list(node, source, &class_name, output);

    output.symbols.push(SymbolRecord {
        name: class_name.clone(),
        category: SymbolCategory::Class,
        class_name: String::new(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: String::new(),
        body: node_string(node, source),
        decorators,
        is_exported,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: 0,
        bases,
        methods_declared: Vec::new(),
        variants: Vec::new(),
        target_syntactic: String::new(),
    });
    if is_exported {
        output.exports.push(class_name.clone());
    }

    if let Some(body) = class_body(node) {
        let saved = std::mem::replace(&mut ctx.class_name, class_name);
        walk(&body, source, output, ctx);
        ctx.class_name = saved;
    }
}

/// Interface declarations produce an Interface node plus one stub Method
/// per declared method. Stubs are contracts: they carry `is_stub` so the
/// dead-code phase can keep them alive.
fn extract_interface(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    _ctx: &mut Context,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_string(&name_node, source);
    let is_exported = has_public_modifier(node, source);

    // Interface base list is interface inheritance: always "extends".
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "base_list" {
            continue;
        }
        let mut base_cursor = child.walk();
        for sub in child.children(&mut base_cursor) {
            if matches!(sub.kind(), "identifier" | "generic_name") {
                let parent = type_name_of(&sub, source);
                if !parent.is_empty() {
                    output.heritage.push(HeritageRecord {
                        child: name.clone(),
                        kind: HeritageKind::Extends,
                        parent,
                    });
                }
            }
        }
    }

    let mut methods_declared = Vec::new();
    if let Some(body) = class_body(node) {
        let mut body_cursor = body.walk();
        for member in body.named_children(&mut body_cursor) {
            if member.kind() != "method_declaration" {
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
                signature: build_method_signature(&member, source),
                body: String::new(),
                decorators: extract_attributes(&member, source),
                is_exported: false,
                is_ctor: false,
                is_property: false,
                is_stub: true,
                arity: parameter_count(&member),
                bases: Vec::new(),
                methods_declared: Vec::new(),
                variants: Vec::new(),
                target_syntactic: String::new(),
            });
        }
    }

    output.symbols.push(SymbolRecord {
        name: name.clone(),
        category: SymbolCategory::Interface,
        class_name: String::new(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: String::new(),
        body: node_string(node, source),
        decorators: extract_attributes(node, source),
        is_exported,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: 0,
        bases: Vec::new(),
        methods_declared,
        variants: Vec::new(),
        target_syntactic: String::new(),
    });
    if is_exported {
        output.exports.push(name);
    }
}

fn extract_enum(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_string(&name_node, source);
    let is_exported = has_public_modifier(node, source);

    let mut variants = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() == "enum_member_declaration" {
                if let Some(member_name) = member.child_by_field_name("name") {
                    variants.push(node_string(&member_name, source));
                }
            }
        }
    }

    output.symbols.push(SymbolRecord {
        name: name.clone(),
        category: SymbolCategory::Enum,
        class_name: String::new(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: String::new(),
        body: node_string(node, source),
        decorators: extract_attributes(node, source),
        is_exported,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: 0,
        bases: Vec::new(),
        methods_declared: Vec::new(),
        variants,
        target_syntactic: String::new(),
    });
    if is_exported {
        output.exports.push(name);
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
    let name = node_string(&name_node, source);

    let category = if ctx.class_name.is_empty() {
        SymbolCategory::Function
    } else {
        SymbolCategory::Method
    };

    output.symbols.push(SymbolRecord {
        name,
        category,
        class_name: ctx.class_name.clone(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: build_method_signature(node, source),
        body: node_string(node, source),
        decorators: extract_attributes(node, source),
        is_exported: false,
        is_ctor: false,
        is_property: false,
        is_stub: false,
        arity: parameter_count(node),
        bases: Vec::new(),
        methods_declared: Vec::new(),
        variants: Vec::new(),
        target_syntactic: String::new(),
    });

    extract_param_types(node, source, output, ctx);

    let return_type = return_type_of(node, source);
    if !return_type.is_empty() && !is_builtin_type(&return_type) {
        output.type_refs.push(TypeRefRecord {
            name: return_type,
            role: TypeRole::Return,
            line: start_line(node),
            param_name: String::new(),
        });
    }

    // Method body: locals and calls, with the owning class in scope.
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if matches!(child.kind(), "block" | "arrow_expression_clause") {
            walk(&child, source, output, ctx);
        }
    }
}

/// Constructors get the reserved name `ctor`, so the Method node id is
/// `method:{path}:ClassName.ctor`, never colliding with `class:{path}:ClassName`.
fn extract_constructor(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    if node.child_by_field_name("name").is_none() {
        return;
    }

    output.symbols.push(SymbolRecord {
        name: "ctor".to_string(),
        category: SymbolCategory::Method,
        class_name: ctx.class_name.clone(),
        start_line: start_line(node),
        end_line: end_line(node),
        signature: build_ctor_signature(node, source, &ctx.class_name),
        body: node_string(node, source),
        decorators: extract_attributes(node, source),
        is_exported: false,
        is_ctor: true,
        is_property: false,
        is_stub: false,
        arity: parameter_count(node),
        bases: Vec::new(),
        methods_declared: Vec::new(),
        variants: Vec::new(),
        target_syntactic: String::new(),
    });

    extract_param_types(node, source, output, ctx);

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "block" {
            walk(&child, source, output, ctx);
        }
    }
}

/// `private readonly IUserRepository _repo;` records both a variable
/// type reference and the receiver type for later call resolution.
fn extract_field(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "variable_declaration" {
            continue;
        }
        let mut type_name = String::new();
        let mut names = Vec::new();
        let mut decl_cursor = child.walk();
        for sub in child.children(&mut decl_cursor) {
            match sub.kind() {
                "identifier" | "generic_name" | "nullable_type" | "array_type"
                | "predefined_type"
                    if type_name.is_empty() =>
                {
                    type_name = type_name_of(&sub, source);
                }
                "variable_declarator" => {
                    let declared = first_identifier(&sub, source);
                    if !declared.is_empty() {
                        names.push(declared);
                    }
                }
                _ => {}
            }
        }
        if type_name.is_empty() {
            continue;
        }
        for field_name in &names {
            ctx.types.insert(field_name.clone(), type_name.clone());
        }
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

/// Properties feed the receiver-type map only; axon never counted them as
/// variable references.
fn extract_property(node: &tree_sitter::Node, source: &[u8], ctx: &mut Context) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_string(&name_node, source);
    let Some(type_node) = node.child_by_field_name("type") else {
        return;
    };
    let type_name = type_name_of(&type_node, source);
    if !type_name.is_empty() {
        ctx.types.insert(name, type_name);
    }
}

fn extract_local_types(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "variable_declaration" {
            continue;
        }
        let mut decl_cursor = child.walk();
        let mut type_name = String::new();
        for sub in child.children(&mut decl_cursor) {
            match sub.kind() {
                "identifier" | "generic_name" => {
                    if type_name.is_empty() {
                        type_name = type_name_of(&sub, source);
                    }
                }
                "implicit_type" | "predefined_type" => return,
                "variable_declarator" => {
                    let var = first_identifier(&sub, source);
                    if !var.is_empty() && !type_name.is_empty() {
                        ctx.types.insert(var, type_name.clone());
                    }
                }
                _ => {}
            }
        }
        if !type_name.is_empty() && !is_builtin_type(&type_name) {
            output.type_refs.push(TypeRefRecord {
                name: type_name,
                role: TypeRole::Variable,
                line: start_line(&child),
                param_name: String::new(),
            });
        }
        return;
    }
}

fn extract_call(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &Context,
) {
    let Some(func_node) = node.child(0) else {
        return;
    };
    let line = start_line(node);
    let arguments = bare_identifier_arguments(node, source);

    match func_node.kind() {
        "member_access_expression" => {
            let (name, receiver) = member_access_parts(&func_node, source);
            if name.is_empty() {
                return;
            }
            let receiver_type = ctx.types.get(&receiver).cloned();
            output.calls.push(CallSite {
                name,
                line,
                receiver,
                receiver_type,
                arguments,
            });
        }
        "identifier" => {
            output.calls.push(CallSite {
                name: node_string(&func_node, source),
                line,
                receiver: String::new(),
                receiver_type: None,
                arguments,
            });
        }
        _ => {}
    }
}

/// `new Type(args)` is recorded as a call to the `Type.ctor` candidate
/// name. The tracer binds the declared constructor method, falling back
/// to the class node when the class has no explicit constructor.
fn extract_new(node: &tree_sitter::Node, source: &[u8], output: &mut ParseOutput) {
    let line = start_line(node);
    let arguments = bare_identifier_arguments(node, source);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let type_name = match child.kind() {
            "identifier" | "generic_name" => type_name_of(&child, source),
            "qualified_name" => last_identifier(&child, source),
            _ => continue,
        };
        if !type_name.is_empty() {
            output.calls.push(CallSite {
                name: format!("{type_name}.ctor"),
                line,
                receiver: String::new(),
                receiver_type: None,
                arguments,
            });
        }
        return;
    }
}

// ---------------------------------------------------------------------
// Heritage and attributes
// ---------------------------------------------------------------------

/// Base list with the C# naming convention as a syntactic hint: `I` +
/// uppercase is recorded as implements, everything else as extends. The
/// heritage phase re-types edges from the resolved target's actual kind.
fn extract_base_list(
    node: &tree_sitter::Node,
    source: &[u8],
    class_name: &str,
    output: &mut ParseOutput,
) -> Vec<String> {
    let mut bases = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "base_list" {
            continue;
        }
        let mut base_cursor = child.walk();
        for sub in child.children(&mut base_cursor) {
            if matches!(sub.kind(), "identifier" | "generic_name") {
                let parent = type_name_of(&sub, source);
                if parent.is_empty() {
                    continue;
                }
                let kind = if looks_like_interface(&parent) {
                    HeritageKind::Implements
                } else {
                    HeritageKind::Extends
                };
                bases.push(parent.clone());
                output.heritage.push(HeritageRecord {
                    child: class_name.to_string(),
                    kind,
                    parent,
                });
            }
        }
    }
    bases
}

fn looks_like_interface(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('I') && chars.next().is_some_and(|c| c.is_uppercase())
}

/// Attribute names from `attribute_list` children:
/// `[HttpGet]` → `HttpGet`, `[Route("/api")]` → `Route`.
fn extract_attributes(node: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut attrs = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "attribute_list" {
            continue;
        }
        let mut attr_cursor = child.walk();
        for sub in child.children(&mut attr_cursor) {
            if sub.kind() != "attribute" {
                continue;
            }
            let name_node = sub.child_by_field_name("name").or_else(|| {
                let mut fallback_cursor = sub.walk();
                let found = sub.children(&mut fallback_cursor)
                    .find(|c| c.kind() == "identifier");
                found
            });
            if let Some(name_node) = name_node {
                attrs.push(node_string(&name_node, source));
            }
        }
    }
    attrs
}

fn has_public_modifier(node: &tree_sitter::Node, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "modifier" && node_string(&child, source) == "public" {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------
// Types and signatures
// ---------------------------------------------------------------------

fn extract_param_types(
    node: &tree_sitter::Node,
    source: &[u8],
    output: &mut ParseOutput,
    ctx: &mut Context,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "parameter_list" {
            continue;
        }
        let mut param_cursor = child.walk();
        for param in child.children(&mut param_cursor) {
            if param.kind() != "parameter" {
                continue;
            }
            let (type_name, param_name) = parameter_parts(&param, source);
            if param_name.is_empty() {
                continue;
            }
            if !type_name.is_empty() {
                ctx.types.insert(param_name.clone(), type_name.clone());
                if !is_builtin_type(&type_name) {
                    output.type_refs.push(TypeRefRecord {
                        name: type_name,
                        role: TypeRole::Param,
                        line: start_line(&param),
                        param_name,
                    });
                }
            }
        }
    }
}

/// `(User user)` → ("User", "user"). The type precedes the name; both can
/// be plain identifiers, so the last identifier is the name and an earlier
/// identifier (or a structured type node) is the type.
fn parameter_parts(param: &tree_sitter::Node, source: &[u8]) -> (String, String) {
    let mut type_name = String::new();
    let mut identifiers: Vec<String> = Vec::new();

    let mut cursor = param.walk();
    for child in param.children(&mut cursor) {
        match child.kind() {
            "identifier" => identifiers.push(node_string(&child, source)),
            "predefined_type" | "generic_name" | "nullable_type" | "array_type" => {
                type_name = type_name_of(&child, source);
            }
            _ => {}
        }
    }

    match (type_name.is_empty(), identifiers.len()) {
        (false, n) if n >= 1 => (type_name, identifiers[n - 1].clone()),
        (true, n) if n >= 2 => (identifiers[0].clone(), identifiers[1].clone()),
        (true, 1) => (String::new(), identifiers[0].clone()),
        _ => (String::new(), String::new()),
    }
}

fn parameter_count(node: &tree_sitter::Node) -> usize {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "parameter_list" {
            let mut param_cursor = child.walk();
            return child
                .children(&mut param_cursor)
                .filter(|c| c.kind() == "parameter")
                .count();
        }
    }
    0
}

/// Return type of a method: the type-shaped child before the name.
fn return_type_of(method_node: &tree_sitter::Node, source: &[u8]) -> String {
    let name_id = method_node.child_by_field_name("name").map(|n| n.id());
    let mut cursor = method_node.walk();
    for child in method_node.children(&mut cursor) {
        match child.kind() {
            "predefined_type" => return node_string(&child, source),
            "identifier" | "generic_name" => {
                if Some(child.id()) != name_id {
                    return type_name_of(&child, source);
                }
            }
            "nullable_type" | "array_type" => return type_name_of(&child, source),
            _ => {}
        }
    }
    String::new()
}

/// Primary type name: `List<User>` → `List`, `User?` → `User`,
/// `User[]` → `User`.
fn type_name_of(node: &tree_sitter::Node, source: &[u8]) -> String {
    match node.kind() {
        "identifier" | "predefined_type" => node_string(node, source),
        "generic_name" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "identifier" {
                    return node_string(&child, source);
                }
            }
            String::new()
        }
        "nullable_type" | "array_type" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                let inner = type_name_of(&child, source);
                if !inner.is_empty() {
                    return inner;
                }
            }
            String::new()
        }
        _ => String::new(),
    }
}

fn build_method_signature(node: &tree_sitter::Node, source: &[u8]) -> String {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_string(&n, source))
        .unwrap_or_default();
    let params = parameter_list_text(node, source);
    let return_type = return_type_of(node, source);
    if return_type.is_empty() {
        format!("{name}{params}")
    } else {
        format!("{return_type} {name}{params}")
    }
}

fn build_ctor_signature(node: &tree_sitter::Node, source: &[u8], class_name: &str) -> String {
    let params = parameter_list_text(node, source);
    format!("{class_name}{params}")
}

fn parameter_list_text(node: &tree_sitter::Node, source: &[u8]) -> String {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "parameter_list" {
            return node_string(&child, source);
        }
    }
    String::new()
}

// ---------------------------------------------------------------------
// Call helpers
// ---------------------------------------------------------------------

/// `(method_name, receiver)` from a member access: `_repo.GetAll` →
/// ("GetAll", "_repo"), `this.Save` → ("Save", "this").
fn member_access_parts(node: &tree_sitter::Node, source: &[u8]) -> (String, String) {
    let mut parts: Vec<String> = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "identifier" => parts.push(node_string(&child, source)),
            "this_expression" => parts.push("this".to_string()),
            "member_access_expression" => {
                let (inner_name, inner_receiver) = member_access_parts(&child, source);
                if !inner_receiver.is_empty() {
                    parts.push(inner_receiver);
                }
                if !inner_name.is_empty() {
                    parts.push(inner_name);
                }
            }
            _ => {}
        }
    }
    match parts.len() {
        0 => (String::new(), String::new()),
        1 => (parts[0].clone(), String::new()),
        n => (parts[n - 1].clone(), parts[0].clone()),
    }
}

fn bare_identifier_arguments(node: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut identifiers = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() != "argument_list" {
            continue;
        }
        let mut arg_cursor = child.walk();
        for arg in child.children(&mut arg_cursor) {
            if arg.kind() != "argument" {
                continue;
            }
            let mut sub_cursor = arg.walk();
            for sub in arg.children(&mut sub_cursor) {
                if sub.kind() == "identifier" {
                    identifiers.push(node_string(&sub, source));
                }
            }
        }
    }
    identifiers
}

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

fn last_identifier(node: &tree_sitter::Node, source: &[u8]) -> String {
    let mut last = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "identifier" {
            last = node_string(&child, source);
        } else {
            let found = last_identifier(&child, source);
            if !found.is_empty() {
                last = found;
            }
        }
    }
    last
}

/// `class_body` / `declaration_list` lookup shared by classes and
/// interfaces (the field name differs between grammar versions).
fn class_body<'a>(node: &tree_sitter::Node<'a>) -> Option<tree_sitter::Node<'a>> {
    node.child_by_field_name("body").or_else(|| {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor)
            .find(|c| c.kind() == "declaration_list");
        found
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::pool::with_parser;
    use crate::ingest::Language;

    fn parse_cs(source: &str) -> ParseOutput {
        with_parser(Language::CSharp, |parser| {
            parse(parser, source.as_bytes()).expect("tree expected")
        })
        .unwrap()
    }

    const USER_CLASS: &str = r#"
public class User
{
    public string Name { get; set; }

    public User(string name)
    {
        Name = name;
    }

    public bool Save()
    {
        return true;
    }
}
"#;

    #[test]
    fn test_class_symbol_count() {
        let output = parse_cs(USER_CLASS);
        // 1 class + 1 constructor + 1 method
        assert_eq!(output.symbols.len(), 3);
    }

    #[test]
    fn test_constructor_stored_as_ctor() {
        let output = parse_cs(USER_CLASS);
        let ctor = output.symbols.iter().find(|s| s.is_ctor).unwrap();
        assert_eq!(ctor.name, "ctor");
        assert_eq!(ctor.class_name, "User");
        assert_eq!(ctor.qualified_name(), "User.ctor");
        assert!(ctor.signature.contains("User"));
    }

    #[test]
    fn test_ctor_id_never_collides_with_class() {
        let output = parse_cs(USER_CLASS);
        let class = output
            .symbols
            .iter()
            .find(|s| s.category == SymbolCategory::Class)
            .unwrap();
        let ctor = output.symbols.iter().find(|s| s.is_ctor).unwrap();
        assert_ne!(class.qualified_name(), ctor.qualified_name());
    }

    #[test]
    fn test_method_names() {
        let output = parse_cs(USER_CLASS);
        let methods: Vec<_> = output
            .symbols
            .iter()
            .filter(|s| s.category == SymbolCategory::Method && !s.is_ctor)
            .collect();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "Save");
        assert_eq!(methods[0].class_name, "User");
    }

    #[test]
    fn test_attributes_as_decorators() {
        let output = parse_cs(
            "public class UsersController\n{\n    [HttpGet]\n    [Route(\"/api/users\")]\n    public string GetAll()\n    {\n        return \"\";\n    }\n}\n",
        );
        let method = output.symbols.iter().find(|s| s.name == "GetAll").unwrap();
        assert_eq!(
            method.decorators,
            vec!["HttpGet".to_string(), "Route".to_string()]
        );
    }

    #[test]
    fn test_interface_with_stubs() {
        let output = parse_cs(
            "public interface IUserService\n{\n    User GetUser(int id);\n    void Delete(int id);\n}\n",
        );
        let interface = output
            .symbols
            .iter()
            .find(|s| s.category == SymbolCategory::Interface)
            .unwrap();
        assert_eq!(interface.name, "IUserService");
        assert_eq!(
            interface.methods_declared,
            vec!["GetUser".to_string(), "Delete".to_string()]
        );

        let stubs: Vec<_> = output.symbols.iter().filter(|s| s.is_stub).collect();
        assert_eq!(stubs.len(), 2);
        assert!(stubs.iter().all(|s| s.class_name == "IUserService"));
    }

    #[test]
    fn test_heritage_convention() {
        let output =
            parse_cs("public class UserService : ServiceBase, IUserService\n{\n}\n");
        let kinds: Vec<_> = output
            .heritage
            .iter()
            .map(|h| (h.parent.as_str(), h.kind))
            .collect();
        assert!(kinds.contains(&("ServiceBase", HeritageKind::Extends)));
        assert!(kinds.contains(&("IUserService", HeritageKind::Implements)));
    }

    #[test]
    fn test_field_type_flows_to_receiver() {
        let output = parse_cs(
            "public class UserService\n{\n    private readonly IUserRepository _repo;\n\n    public string GetAll()\n    {\n        return _repo.GetAll();\n    }\n}\n",
        );
        let call = output
            .calls
            .iter()
            .find(|c| c.name == "GetAll" && c.receiver == "_repo")
            .expect("call through field receiver");
        assert_eq!(call.receiver_type.as_deref(), Some("IUserRepository"));
    }

    #[test]
    fn test_using_directive_import() {
        let output = parse_cs("using System.Linq;\n\npublic class A {}\n");
        assert_eq!(output.imports.len(), 1);
        assert_eq!(output.imports[0].module, "System.Linq");
        assert_eq!(output.imports[0].names, vec!["Linq".to_string()]);
    }

    #[test]
    fn test_new_expression_is_ctor_call() {
        let output = parse_cs(
            "public class A\n{\n    public void Run()\n    {\n        var s = new UserService();\n    }\n}\n",
        );
        assert!(output.calls.iter().any(|c| c.name == "UserService.ctor"));
    }

    #[test]
    fn test_enum_variants() {
        let output = parse_cs("public enum Status { Active, Deleted }\n");
        let e = output
            .symbols
            .iter()
            .find(|s| s.category == SymbolCategory::Enum)
            .unwrap();
        assert_eq!(
            e.variants,
            vec!["Active".to_string(), "Deleted".to_string()]
        );
    }

    #[test]
    fn test_param_and_return_type_refs() {
        let output = parse_cs(
            "public class A\n{\n    public Session Login(User user)\n    {\n        return null;\n    }\n}\n",
        );
        let names: Vec<_> = output
            .type_refs
            .iter()
            .map(|t| (t.name.as_str(), t.role))
            .collect();
        assert!(names.contains(&("User", TypeRole::Param)));
        assert!(names.contains(&("Session", TypeRole::Return)));
    }

    #[test]
    fn test_public_class_exported() {
        let output = parse_cs("public class User {}\ninternal class Hidden {}\n");
        let user = output.symbols.iter().find(|s| s.name == "User").unwrap();
        let hidden = output.symbols.iter().find(|s| s.name == "Hidden").unwrap();
        assert!(user.is_exported);
        assert!(!hidden.is_exported);
        assert_eq!(output.exports, vec!["User".to_string()]);
    }

    #[test]
    fn test_namespace_members_found() {
        let output = parse_cs(
            "namespace App.Services\n{\n    public class UserService\n    {\n        public void Run() {}\n    }\n}\n",
        );
        assert!(output.symbols.iter().any(|s| s.name == "UserService"));
        assert!(output.symbols.iter().any(|s| s.name == "Run"));
    }

    #[test]
    fn test_method_call_arguments() {
        let output = parse_cs(
            "public class A\n{\n    public void Run()\n    {\n        Process(callback, 1);\n    }\n}\n",
        );
        let call = output.calls.iter().find(|c| c.name == "Process").unwrap();
        assert_eq!(call.arguments, vec!["callback".to_string()]);
    }
}
