//! Function signature extraction for Python sources.
//!
//! Stub files are parsed with tree-sitter to recover the functions the model
//! declared. Each top-level function yields a [`FunctionSignature`] whose
//! `stub` is what later prompts show the model: the `def` header with an
//! elided body. A lightweight call graph records which functions are called
//! back to back, giving each signature a small usage profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use tree_sitter::{Node, Parser, Tree};

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name as written, including `*`/`**` for variadic parameters.
    pub name: String,
    pub annotation: Option<String>,
    /// Default value expression, verbatim.
    pub default: Option<String>,
    /// Declared after `*` or `*args`.
    pub keyword_only: bool,
}

/// A neighbouring function in the call sequence and how often it appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjacent {
    pub name: String,
    pub count: u32,
}

/// Call adjacency for one function, most frequent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Functions called immediately before this one.
    pub before: Vec<Adjacent>,
    /// Functions called immediately after this one.
    pub after: Vec<Adjacent>,
}

/// A top-level function recovered from source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    /// Header through the colon, followed by an indented `...` body.
    pub stub: String,
    /// SHA-256 of the full function source, hex encoded.
    pub code_hash: String,
    pub usage: Usage,
}

/// Extract top-level function signatures from Python source.
///
/// Returns an empty list when the source does not parse cleanly; the failure
/// is logged rather than raised.
pub fn extract_signatures(source: &str) -> Vec<FunctionSignature> {
    let Some(tree) = parse_clean(source) else {
        return Vec::new();
    };
    let root = tree.root_node();
    let graph = CallGraph::from_root(root, source);

    let mut signatures = Vec::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let function = match child.kind() {
            "function_definition" => child,
            "decorated_definition" => match child.child_by_field_name("definition") {
                Some(def) if def.kind() == "function_definition" => def,
                _ => continue,
            },
            _ => continue,
        };
        if let Some(signature) = signature_of(function, source, &graph) {
            signatures.push(signature);
        }
    }
    debug!(count = signatures.len(), "extracted function signatures");
    signatures
}

/// Sequential call adjacency across a module.
///
/// An edge `(callee, previous)` counts how often `callee` was called right
/// after `previous`. The chain restarts at every function definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    edges: BTreeMap<(String, String), u32>,
}

impl CallGraph {
    /// Build the graph for a source file; empty if it does not parse.
    pub fn from_source(source: &str) -> Self {
        parse_clean(source)
            .map(|tree| Self::from_root(tree.root_node(), source))
            .unwrap_or_default()
    }

    fn from_root(root: Node<'_>, source: &str) -> Self {
        let mut graph = Self::default();
        let mut previous = None;
        graph.visit(root, source, &mut previous);
        graph
    }

    fn visit(&mut self, node: Node<'_>, source: &str, previous: &mut Option<String>) {
        match node.kind() {
            "function_definition" => *previous = None,
            "call" => {
                if let Some(callee) = node
                    .child_by_field_name("function")
                    .filter(|f| f.kind() == "identifier")
                {
                    let callee = node_text(callee, source).to_string();
                    if let Some(prev) = previous.replace(callee.clone()) {
                        *self.edges.entry((callee, prev)).or_insert(0) += 1;
                    }
                }
            }
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, source, previous);
        }
    }

    /// Number of times `callee` directly followed `previous`.
    pub fn count(&self, callee: &str, previous: &str) -> u32 {
        self.edges
            .get(&(callee.to_string(), previous.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn usage(&self, name: &str) -> Usage {
        let mut before = Vec::new();
        let mut after = Vec::new();
        for ((callee, previous), &count) in &self.edges {
            if callee == name {
                before.push(Adjacent {
                    name: previous.clone(),
                    count,
                });
            }
            if previous == name {
                after.push(Adjacent {
                    name: callee.clone(),
                    count,
                });
            }
        }
        sort_adjacent(&mut before);
        sort_adjacent(&mut after);
        Usage { before, after }
    }
}

fn sort_adjacent(list: &mut [Adjacent]) {
    list.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
}

fn parse_clean(source: &str) -> Option<Tree> {
    let lang: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    if let Err(err) = parser.set_language(&lang) {
        warn!(err = %err, "python grammar unavailable");
        return None;
    }
    let tree = parser.parse(source.as_bytes(), None)?;
    let root = tree.root_node();
    if root.has_error() {
        let position = first_error(root).map(|node| node.start_position());
        warn!(
            line = position.map(|p| p.row + 1),
            column = position.map(|p| p.column + 1),
            "failed to parse python source, skipping signature extraction"
        );
        return None;
    }
    Some(tree)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error)
}

fn signature_of(function: Node<'_>, source: &str, graph: &CallGraph) -> Option<FunctionSignature> {
    let name = node_text(function.child_by_field_name("name")?, source).to_string();
    let parameters = function
        .child_by_field_name("parameters")
        .map(|params| parse_parameters(params, source))
        .unwrap_or_default();
    let return_type = function
        .child_by_field_name("return_type")
        .map(|node| node_text(node, source).to_string());
    let body = function.child_by_field_name("body")?;
    let header = source[function.start_byte()..body.start_byte()].trim_end();

    Some(FunctionSignature {
        usage: graph.usage(&name),
        name,
        parameters,
        return_type,
        stub: format!("{header}\n    ..."),
        code_hash: content_hash(node_text(function, source)),
    })
}

fn parse_parameters(params: Node<'_>, source: &str) -> Vec<Parameter> {
    let mut parameters = Vec::new();
    let mut keyword_only = false;
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        if child.kind() == "keyword_separator" {
            keyword_only = true;
            continue;
        }
        let Some(parameter) = parse_parameter(child, source, keyword_only) else {
            continue;
        };
        if parameter.name.starts_with('*') && !parameter.name.starts_with("**") {
            keyword_only = true;
        }
        parameters.push(parameter);
    }
    parameters
}

fn parse_parameter(node: Node<'_>, source: &str, keyword_only: bool) -> Option<Parameter> {
    let field = |name: &str| {
        node.child_by_field_name(name)
            .map(|child| node_text(child, source).to_string())
    };
    let (name, annotation, default) = match node.kind() {
        "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
            (node_text(node, source).to_string(), None, None)
        }
        "typed_parameter" => (
            node_text(node.named_child(0)?, source).to_string(),
            field("type"),
            None,
        ),
        "default_parameter" => (field("name")?, None, field("value")),
        "typed_default_parameter" => (field("name")?, field("type"), field("value")),
        _ => return None,
    };
    Some(Parameter {
        name,
        annotation,
        default,
        keyword_only,
    })
}

fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
