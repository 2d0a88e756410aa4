use tree_sitter::{Node, Parser};

use super::{ExtractedCall, ExtractedImport, ExtractedSymbol, ImportedName, LanguageAdapter, ParsedFile};
use crate::model::{Range, SymbolKind, Visibility};

pub struct RustAdapter;

impl RustAdapter {
    pub fn new() -> Self {
        Self
    }

    fn range_of(node: Node) -> Range {
        let start = node.start_position();
        let end = node.end_position();
        Range::new(start.row as u32, start.column as u32, end.row as u32, end.column as u32)
    }

    fn is_pub(node: Node, source: &[u8]) -> bool {
        let mut cursor = node.walk();
        node.children(&mut cursor)
            .any(|c| c.kind() == "visibility_modifier" && c.utf8_text(source).unwrap_or("").starts_with("pub"))
    }

    fn child_text<'a>(node: Node, field: &str, source: &'a [u8]) -> Option<&'a str> {
        node.child_by_field_name(field).and_then(|n| n.utf8_text(source).ok())
    }
}

impl Default for RustAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for RustAdapter {
    fn language_id(&self) -> &'static str {
        "rust"
    }

    fn parse(&self, source: &[u8]) -> Result<ParsedFile, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| e.to_string())?;
        let tree = parser.parse(source, None).ok_or("tree-sitter failed to produce a tree")?;

        let mut symbols = Vec::new();
        let mut imports = Vec::new();
        let mut calls = Vec::new();
        let mut cursor = tree.root_node().walk();

        // Only a flat scan of the top two levels (module items, and impl
        // block members) is attempted — deeply nested local functions aren't
        // extracted as symbols, matching the "small reference adapter" scope.
        for child in tree.root_node().children(&mut cursor) {
            walk_item(child, source, None, &mut symbols, &mut imports);
        }

        collect_calls(tree.root_node(), source, None, &mut calls);

        Ok(ParsedFile { symbols, imports, calls })
    }

    fn supports_cross_file_resolution(&self) -> bool {
        false
    }
}

fn walk_item(
    node: Node,
    source: &[u8],
    enclosing: Option<&str>,
    symbols: &mut Vec<ExtractedSymbol>,
    imports: &mut Vec<ExtractedImport>,
) {
    match node.kind() {
        "function_item" => {
            if let Some(name) = RustAdapter::child_text(node, "name", source) {
                let exported = RustAdapter::is_pub(node, source);
                symbols.push(ExtractedSymbol {
                    kind: SymbolKind::Function,
                    name: name.to_string(),
                    exported,
                    visibility: Some(if exported { Visibility::Public } else { Visibility::Private }),
                    range: RustAdapter::range_of(node),
                    shape: shape_of(node),
                    signature_json: None,
                });
            }
        }
        "struct_item" | "enum_item" => {
            if let Some(name) = RustAdapter::child_text(node, "name", source) {
                let exported = RustAdapter::is_pub(node, source);
                let kind = if node.kind() == "enum_item" { SymbolKind::Enum } else { SymbolKind::Class };
                symbols.push(ExtractedSymbol {
                    kind,
                    name: name.to_string(),
                    exported,
                    visibility: Some(if exported { Visibility::Public } else { Visibility::Private }),
                    range: RustAdapter::range_of(node),
                    shape: shape_of(node),
                    signature_json: None,
                });
            }
        }
        "impl_item" => {
            let type_name = RustAdapter::child_text(node, "type", source).map(str::to_string);
            let mut cursor = node.walk();
            if let Some(body) = node.child_by_field_name("body") {
                for member in body.children(&mut cursor) {
                    walk_item(member, source, type_name.as_deref(), symbols, imports);
                }
            }
        }
        "use_declaration" => {
            if let Some(arg) = node.child(1) {
                let text = arg.utf8_text(source).unwrap_or("").to_string();
                imports.push(ExtractedImport {
                    imported_names: vec![ImportedName {
                        name: text.split("::").last().unwrap_or(&text).trim_end_matches(';').to_string(),
                        alias: None,
                        is_namespace: false,
                    }],
                    source: text,
                    range: RustAdapter::range_of(node),
                });
            }
        }
        "mod_item" => {
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.children(&mut cursor) {
                    walk_item(child, source, None, symbols, imports);
                }
            }
        }
        _ => {}
    }

    // Methods inside an impl block become SymbolKind::Method rather than Function.
    if enclosing.is_some() && node.kind() == "function_item" {
        if let Some(last) = symbols.last_mut() {
            last.kind = SymbolKind::Method;
        }
    }
}

fn collect_calls(node: Node, source: &[u8], caller: Option<&str>, calls: &mut Vec<ExtractedCall>) {
    let mut current_caller = caller.map(str::to_string);
    if node.kind() == "function_item" {
        current_caller = RustAdapter::child_text(node, "name", source).map(str::to_string);
    }

    if node.kind() == "call_expression" {
        if let Some(func) = node.child_by_field_name("function") {
            let callee = func.utf8_text(source).unwrap_or("").to_string();
            calls.push(ExtractedCall {
                callee,
                range: RustAdapter::range_of(node),
                is_dynamic: false,
                caller_name: current_caller.clone(),
            });
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, source, current_caller.as_deref(), calls);
    }
}

fn shape_of(node: Node) -> String {
    // Structural shape for ast_fingerprint: node kind + child kind sequence,
    // stable under reformatting since whitespace/comments aren't named nodes.
    let mut shape = String::from(node.kind());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        shape.push(':');
        shape.push_str(child.kind());
    }
    shape
}
