use tree_sitter::{Node, Parser};

use super::{ExtractedCall, ExtractedImport, ExtractedSymbol, ImportedName, LanguageAdapter, ParsedFile};
use crate::model::{Range, SymbolKind, Visibility};

pub struct TypeScriptAdapter;

impl TypeScriptAdapter {
    pub fn new() -> Self {
        Self
    }

    fn range_of(node: Node) -> Range {
        let start = node.start_position();
        let end = node.end_position();
        Range::new(start.row as u32, start.column as u32, end.row as u32, end.column as u32)
    }

    fn has_export_keyword(node: Node) -> bool {
        // `export function foo() {}` wraps the declaration in an
        // `export_statement`; `export default` similarly.
        node.parent().is_some_and(|p| p.kind() == "export_statement")
    }

    fn shape_of(node: Node) -> String {
        let mut shape = String::from(node.kind());
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            shape.push(':');
            shape.push_str(child.kind());
        }
        shape
    }
}

impl Default for TypeScriptAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAdapter for TypeScriptAdapter {
    fn language_id(&self) -> &'static str {
        "typescript"
    }

    fn parse(&self, source: &[u8]) -> Result<ParsedFile, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .map_err(|e| e.to_string())?;
        let tree = parser.parse(source, None).ok_or("tree-sitter failed to produce a tree")?;

        let mut symbols = Vec::new();
        let mut imports = Vec::new();
        let mut calls = Vec::new();

        walk(tree.root_node(), source, None, &mut symbols, &mut imports, &mut calls);

        Ok(ParsedFile { symbols, imports, calls })
    }

    fn supports_cross_file_resolution(&self) -> bool {
        true
    }
}

fn walk(
    node: Node,
    source: &[u8],
    current_caller: Option<&str>,
    symbols: &mut Vec<ExtractedSymbol>,
    imports: &mut Vec<ExtractedImport>,
    calls: &mut Vec<ExtractedCall>,
) {
    let mut next_caller = current_caller.map(str::to_string);

    match node.kind() {
        "function_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = name_node.utf8_text(source).unwrap_or("").to_string();
                let exported = TypeScriptAdapter::has_export_keyword(node);
                symbols.push(ExtractedSymbol {
                    kind: SymbolKind::Function,
                    name: name.clone(),
                    exported,
                    visibility: Some(if exported { Visibility::Public } else { Visibility::Private }),
                    range: TypeScriptAdapter::range_of(node),
                    shape: TypeScriptAdapter::shape_of(node),
                    signature_json: None,
                });
                next_caller = Some(name);
            }
        }
        "class_declaration" | "interface_declaration" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = name_node.utf8_text(source).unwrap_or("").to_string();
                let exported = TypeScriptAdapter::has_export_keyword(node);
                let kind = if node.kind() == "interface_declaration" {
                    SymbolKind::Interface
                } else {
                    SymbolKind::Class
                };
                symbols.push(ExtractedSymbol {
                    kind,
                    name,
                    exported,
                    visibility: Some(if exported { Visibility::Public } else { Visibility::Private }),
                    range: TypeScriptAdapter::range_of(node),
                    shape: TypeScriptAdapter::shape_of(node),
                    signature_json: None,
                });
            }
        }
        "method_definition" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = name_node.utf8_text(source).unwrap_or("").to_string();
                symbols.push(ExtractedSymbol {
                    kind: SymbolKind::Method,
                    name: name.clone(),
                    exported: false,
                    visibility: None,
                    range: TypeScriptAdapter::range_of(node),
                    shape: TypeScriptAdapter::shape_of(node),
                    signature_json: None,
                });
                next_caller = Some(name);
            }
        }
        "import_statement" => {
            if let Some(import) = extract_import(node, source) {
                imports.push(import);
            }
        }
        "call_expression" => {
            if let Some(func) = node.child_by_field_name("function") {
                let callee = func.utf8_text(source).unwrap_or("").to_string();
                let is_dynamic = func.kind() == "subscript_expression";
                calls.push(ExtractedCall {
                    callee,
                    range: TypeScriptAdapter::range_of(node),
                    is_dynamic,
                    caller_name: current_caller.map(str::to_string),
                });
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, source, next_caller.as_deref(), symbols, imports, calls);
    }
}

fn extract_import(node: Node, source: &[u8]) -> Option<ExtractedImport> {
    let source_node = node.child_by_field_name("source")?;
    let raw_source = source_node.utf8_text(source).ok()?;
    let module_path = raw_source.trim_matches(|c| c == '\'' || c == '"').to_string();

    let clause = node.child(1).filter(|c| c.kind() == "import_clause");
    let mut imported_names = Vec::new();

    if let Some(clause) = clause {
        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "named_imports" => {
                    let mut inner = child.walk();
                    for spec in child.children(&mut inner) {
                        if spec.kind() == "import_specifier" {
                            if let Some(name_node) = spec.child_by_field_name("name") {
                                let name = name_node.utf8_text(source).ok()?.to_string();
                                let alias = spec
                                    .child_by_field_name("alias")
                                    .and_then(|a| a.utf8_text(source).ok())
                                    .map(str::to_string);
                                imported_names.push(ImportedName {
                                    name,
                                    alias,
                                    is_namespace: false,
                                });
                            }
                        }
                    }
                }
                "namespace_import" => {
                    if let Some(ident) = child.child(2) {
                        let alias = ident.utf8_text(source).ok()?.to_string();
                        imported_names.push(ImportedName {
                            name: "*".to_string(),
                            alias: Some(alias),
                            is_namespace: true,
                        });
                    }
                }
                "identifier" => {
                    // default import
                    let name = child.utf8_text(source).ok()?.to_string();
                    imported_names.push(ImportedName {
                        name: "default".to_string(),
                        alias: Some(name),
                        is_namespace: false,
                    });
                }
                _ => {}
            }
        }
    }

    Some(ExtractedImport {
        imported_names,
        source: module_path,
        range: TypeScriptAdapter::range_of(node),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_exported_function_and_named_import() {
        let adapter = TypeScriptAdapter::new();
        let source = br#"import {b} from './b'; export function a(){ return b(); }"#;
        let parsed = adapter.parse(source).unwrap();

        assert!(parsed.symbols.iter().any(|s| s.name == "a" && s.exported));
        assert_eq!(parsed.imports.len(), 1);
        assert_eq!(parsed.imports[0].source, "./b");
        assert_eq!(parsed.imports[0].imported_names[0].name, "b");
        assert!(parsed.calls.iter().any(|c| c.callee == "b" && c.caller_name.as_deref() == Some("a")));
    }

    #[test]
    fn extracts_namespace_import() {
        let adapter = TypeScriptAdapter::new();
        let source = br#"import * as ns from './ns'; function a(){ ns.member(); }"#;
        let parsed = adapter.parse(source).unwrap();
        assert!(parsed.imports[0].imported_names[0].is_namespace);
        assert!(parsed.calls.iter().any(|c| c.callee == "ns.member"));
    }
}
