//! Language detection from file extensions.

use std::path::Path;

/// Languages with a registered parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    TypeScript,
    Tsx,
    JavaScript,
    CSharp,
}

impl Language {
    /// Lowercase language name stored on File nodes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::TypeScript | Language::Tsx => "typescript",
            Language::JavaScript => "javascript",
            Language::CSharp => "csharp",
        }
    }
}

/// Detect the language for a path by extension.
///
/// Returns `None` for files with no registered parser; the walker keeps
/// those as `language = "unknown"` File nodes.
pub fn detect_language(path: &Path) -> Option<Language> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    match ext {
        "py" => Some(Language::Python),
        "ts" => Some(Language::TypeScript),
        "tsx" => Some(Language::Tsx),
        "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
        "cs" => Some(Language::CSharp),
        _ => None,
    }
}

/// Language name for a path, `"unknown"` when no parser is registered.
pub fn language_name(path: &Path) -> &'static str {
    detect_language(path).map(|l| l.as_str()).unwrap_or("unknown")
}
