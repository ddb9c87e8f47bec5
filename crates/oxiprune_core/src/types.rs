#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// `import ... from './x'` or `import './x'`
    Import,
    /// `export { a } from './x'` or `export * from './x'`
    ReExport,
}

/// One module declaration of a source file, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Specifier text as written, e.g. `./utils/helper`
    pub request: String,
    pub kind: DeclKind,
    pub type_only: bool,
    pub default_name: Option<String>,
    pub named_names: Vec<String>,
    /// Byte span of the whole declaration in the file
    pub start: u32,
    pub end: u32,
}

impl ImportDecl {
    /// Default name first, then named names, as written.
    pub fn imported_names(&self) -> Vec<String> {
        self.default_name.iter().chain(self.named_names.iter()).cloned().collect()
    }
}
