//! Identifier and type naming for generated code

use promptkit::placeholder::NameMapError;
use promptkit::{ItemKind, MajorVersion, NameMap, PromptError, PromptManifest, to_snake_case};
use serde_json::Value;

/// Prefix for type names that would start with a digit
pub const TYPE_DIGIT_PREFIX: &str = "Prompt";

/// Rust keywords, strict and reserved
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate", "do", "dyn", "else",
    "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "macro", "match", "mod",
    "move", "mut", "override", "priv", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
    "true", "try", "type", "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers
const NON_RAW_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// TitleCase form of a prompt, template or tool id
///
/// Non-alphanumeric runs collapse; a leading digit gets the `Prompt` prefix.
/// Returns an empty string when the id has no alphanumeric characters.
pub fn to_title_case(name: &str) -> String {
    let snake = to_snake_case(name);
    let leading_digit = name
        .chars()
        .find(|c| c.is_alphanumeric())
        .is_some_and(|c| c.is_ascii_digit());
    let words = if leading_digit {
        snake.strip_prefix("p_").unwrap_or(&snake)
    } else {
        snake.as_str()
    };

    let title: String = words
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    if title.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", TYPE_DIGIT_PREFIX, title)
    } else {
        title
    }
}

/// Identifier for a struct field, method or argument
pub fn field_ident(mapped: &str) -> String {
    if NON_RAW_KEYWORDS.contains(&mapped) {
        format!("{}_", mapped)
    } else if is_keyword(mapped) {
        format!("r#{}", mapped)
    } else {
        mapped.to_string()
    }
}

/// File and module name for a prompt id; empty when unusable
pub fn module_name(prompt_id: &str) -> String {
    let snake = to_snake_case(prompt_id);
    if is_keyword(&snake) { format!("{}_", snake) } else { snake }
}

/// `V1`, `V2`, ... or `Undeployed`
pub fn version_tag(major: &MajorVersion) -> String {
    match major.number() {
        Some(n) => format!("V{}", n),
        None => "Undeployed".to_string(),
    }
}

/// Rust type for a params value; `None` for null
pub fn rust_type(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some("bool".to_string()),
        Value::Number(_) => Some("f64".to_string()),
        Value::String(_) => Some("String".to_string()),
        Value::Array(items) => {
            let mut element: Option<String> = None;
            for item in items {
                match (rust_type(item), &element) {
                    (Some(ty), None) => element = Some(ty),
                    (Some(ty), Some(seen)) if &ty == seen => {}
                    _ => return Some("Vec<promptkit::serde_json::Value>".to_string()),
                }
            }
            let element = element.unwrap_or_else(|| "promptkit::serde_json::Value".to_string());
            Some(format!("Vec<{}>", element))
        }
        Value::Object(_) => {
            Some("promptkit::serde_json::Map<String, promptkit::serde_json::Value>".to_string())
        }
    }
}

/// Snake case map of item names, reporting the offending item on failure
///
/// Used for params keys and for template/tool method names, where the
/// collision is between items rather than inside one.
pub fn item_names(manifest: &PromptManifest, kind: ItemKind, names: &[&str]) -> Result<NameMap, PromptError> {
    NameMap::snake(names).map_err(|e| match e {
        NameMapError::Collision { first, second, mapped } => PromptError::NameMappingCollision {
            prompt_id: manifest.prompt_id.to_string(),
            version: manifest.version_label(),
            kind,
            item_id: second.clone(),
            first,
            second,
            mapped,
        },
        NameMapError::Empty { source } => PromptError::InvalidIdentifier {
            prompt_id: manifest.prompt_id.to_string(),
            kind,
            item_id: source.clone(),
            name: source,
        },
    })
}

/// Rust string literal for `text`
pub fn literal(text: &str) -> String {
    format!("{:?}", text)
}

/// `text` made safe for a one-line doc comment
pub fn doc_text(text: &str) -> String {
    text.escape_debug().to_string()
}
