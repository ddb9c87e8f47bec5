use anyhow::{Result, bail};
use log::{debug, trace};
use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::{Parser as OxcParser, ParserReturn};
use oxc_span::SourceType;
use std::path::Path;

use crate::types::{DeclKind, ImportDecl};

/// Lists the top-level import and re-export declarations of `source`.
///
/// Recoverable syntax errors are tolerated (the declarations that were parsed
/// keep valid spans); a parser that gives up is an error, since no span from
/// it can be trusted for editing.
pub fn parse_imports(file: &Path, source: &str) -> Result<Vec<ImportDecl>> {
    trace!("Parsing file for imports: {}", file.display());
    let st = source_type_for(file);
    let allocator = Allocator::default();
    let ParserReturn { program, errors, panicked, .. } =
        OxcParser::new(&allocator, source, st).parse();

    if panicked {
        bail!("Failed to parse {} ({} errors)", file.display(), errors.len());
    }
    if !errors.is_empty() {
        debug!("{} recoverable parse errors in {}", errors.len(), file.display());
    }

    let mut decls: Vec<ImportDecl> = Vec::new();

    for stmt in &program.body {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                let mut default_name = None;
                let mut named_names = Vec::new();
                if let Some(specifiers) = &decl.specifiers {
                    for spec in specifiers {
                        match spec {
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                default_name = Some(s.local.name.to_string());
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                named_names.push(format!("* as {}", s.local.name));
                            }
                            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                named_names.push(s.imported.name().to_string());
                            }
                        }
                    }
                }

                let req = decl.source.value.to_string();
                trace!("Found import: '{}' in {}", req, file.display());
                decls.push(ImportDecl {
                    request: req,
                    kind: DeclKind::Import,
                    type_only: decl.import_kind.is_type(),
                    default_name,
                    named_names,
                    start: decl.span.start,
                    end: decl.span.end,
                });
            }
            Statement::ExportNamedDeclaration(decl) => {
                // Only `export { .. } from '..'` refers to another module
                if let Some(source) = &decl.source {
                    let req = source.value.to_string();
                    trace!("Found re-export: '{}' in {}", req, file.display());
                    decls.push(ImportDecl {
                        request: req,
                        kind: DeclKind::ReExport,
                        type_only: decl.export_kind.is_type(),
                        default_name: None,
                        named_names: decl
                            .specifiers
                            .iter()
                            .map(|s| s.local.name().to_string())
                            .collect(),
                        start: decl.span.start,
                        end: decl.span.end,
                    });
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                let req = decl.source.value.to_string();
                trace!("Found re-export: '{}' in {}", req, file.display());
                let name = match &decl.exported {
                    Some(exported) => format!("* as {}", exported.name()),
                    None => "*".to_string(),
                };
                decls.push(ImportDecl {
                    request: req,
                    kind: DeclKind::ReExport,
                    type_only: decl.export_kind.is_type(),
                    default_name: None,
                    named_names: vec![name],
                    start: decl.span.start,
                    end: decl.span.end,
                });
            }
            _ => {}
        }
    }

    debug!("Found {} module declarations in {}", decls.len(), file.display());
    Ok(decls)
}

fn source_type_for(path: &Path) -> SourceType {
    let ext = path.extension().and_then(|e| e.to_str());

    // Import declarations only exist in modules, whatever the extension says
    SourceType::default()
        .with_module(true)
        .with_jsx(matches!(ext, Some("tsx") | Some("jsx")))
        .with_typescript(matches!(ext, Some("ts") | Some("tsx") | Some("mts") | Some("cts")))
}
