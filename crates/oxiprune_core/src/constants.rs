//! Constants for file extensions and resolution order.
//!
//! This module centralizes extension handling so that project loading, module
//! resolution and basename matching agree on what counts as a source file.
//!
//! ## Resolution order
//!
//! Extensionless specifiers are probed with `RESOLVE_EXTENSIONS` in order:
//! `.ts`, `.tsx`, `.js`, `.jsx`, followed by the ES module / CommonJS variants.
//! The first existing file wins, so `foo.ts` always shadows `foo.tsx`.

/// TypeScript extensions loaded into the project index by default
pub const TS_EXTENSIONS: &[&str] = &[
    "ts",  // TypeScript
    "tsx", // TypeScript with JSX
    "mts", // TypeScript module
    "cts", // TypeScript CommonJS
];

/// JavaScript extensions, loaded only when JavaScript scanning is enabled
pub const JS_EXTENSIONS: &[&str] = &[
    "js",  // JavaScript
    "jsx", // JavaScript with JSX
    "mjs", // JavaScript module
    "cjs", // JavaScript CommonJS
];

/// Extensions to try when resolving module imports (in priority order)
pub const RESOLVE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mts", "cts", "mjs", "cjs"];

/// File stem that makes a directory importable by its own name
pub const INDEX_STEM: &str = "index";

/// Directories never loaded into the project index
pub const SKIPPED_DIRS: &[&str] = &["node_modules"];

/// Returns `name` without a trailing known source extension.
///
/// Only extensions from `RESOLVE_EXTENSIONS` are stripped, so `user.service`
/// stays `user.service` while `user.service.ts` becomes `user.service`.
pub fn strip_source_extension(name: &str) -> &str {
    if let Some((stem, ext)) = name.rsplit_once('.')
        && !stem.is_empty()
        && RESOLVE_EXTENSIONS.contains(&ext)
    {
        return stem;
    }
    name
}
