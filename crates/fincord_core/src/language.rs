//! Language detection from file extensions.
//!
//! The identifiers match the editor widget's language ids (`"typescript"`,
//! `"python"`, ...). They are advisory: entries store them as a hint and the
//! execution subsystem re-detects from the extension.

use crate::path_utils;

/// Language id used when nothing better is known.
pub const PLAINTEXT: &str = "plaintext";

const EXTENSIONS: &[(&[&str], &str)] = &[
    (&["ts", "tsx"], "typescript"),
    (&["js", "jsx", "mjs", "cjs"], "javascript"),
    (&["json"], "json"),
    (&["css"], "css"),
    (&["html", "htm"], "html"),
    (&["md", "markdown"], "markdown"),
    (&["txt"], PLAINTEXT),
    (&["c", "h"], "c"),
    (&["cpp", "cc", "hpp"], "cpp"),
    (&["java"], "java"),
    (&["py"], "python"),
    (&["go"], "go"),
    (&["rs"], "rust"),
    (&["php"], "php"),
    (&["rb"], "ruby"),
    (&["sh", "bash"], "shell"),
    (&["yaml", "yml"], "yaml"),
    (&["xml"], "xml"),
];

/// Guess the language id for a workspace path.
pub fn guess_language(path: &str) -> &'static str {
    let Some(ext) = path_utils::extension(path) else {
        return PLAINTEXT;
    };
    EXTENSIONS
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .map(|(_, lang)| *lang)
        .unwrap_or(PLAINTEXT)
}

/// Human-readable label for a language id ("typescript" -> "Typescript").
pub fn display_name(language: Option<&str>) -> String {
    match language {
        None | Some("") | Some(PLAINTEXT) => "Plain Text".to_string(),
        Some(id) => {
            let mut chars = id.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Plain Text".to_string(),
            }
        }
    }
}
