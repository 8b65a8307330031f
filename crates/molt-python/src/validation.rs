//! Python name validation utilities.
//!
//! Provides validation functions for identifiers that refactorings introduce,
//! plus the naming helpers used to derive generated names.

use thiserror::Error;

use molt_core::error::MoltError;

/// A generated or user-supplied name that Python would reject.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

impl From<ValidationError> for MoltError {
    fn from(err: ValidationError) -> Self {
        MoltError::invalid_args(err.to_string())
    }
}

/// Hard keywords as of Python 3.12; soft keywords like `match` stay legal names.
pub const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

pub fn is_python_keyword(name: &str) -> bool {
    PYTHON_KEYWORDS.contains(&name)
}

/// Validate that a string is a usable Python identifier.
///
/// ```
/// use molt_python::validation::validate_python_identifier;
///
/// assert!(validate_python_identifier("calculate_sum").is_ok());
/// assert!(validate_python_identifier("2fast").is_err());
/// assert!(validate_python_identifier("lambda").is_err());
/// ```
pub fn validate_python_identifier(name: &str) -> ValidationResult<()> {
    let invalid = |reason: String| ValidationError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| invalid("name cannot be empty".to_string()))?;
    if !first.is_alphabetic() && first != '_' {
        return Err(invalid("must start with letter or underscore".to_string()));
    }
    if let Some(ch) = chars.find(|ch| !ch.is_alphanumeric() && *ch != '_') {
        return Err(invalid(format!("invalid character: '{}'", ch)));
    }
    if is_python_keyword(name) {
        return Err(invalid("cannot use Python keyword as identifier".to_string()));
    }
    Ok(())
}

/// Upper-case the first character, leaving the rest untouched.
///
/// `calculate` becomes `Calculate`; used to name generated method objects.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `CamelCase` to `snake_case`: `OrderLine` becomes `order_line`,
/// `HTTPServer` becomes `http_server`.
pub fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);
    for (i, ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                result.push('_');
            }
        }
        result.extend(ch.to_lowercase());
    }
    result
}

/// Strip leading underscores: `_owner` becomes `owner`.
pub fn public_name(name: &str) -> &str {
    name.trim_start_matches('_')
}

/// Prefix a name with one underscore unless it already has one.
pub fn private_name(name: &str) -> String {
    if name.starts_with('_') {
        name.to_string()
    } else {
        format!("_{}", name)
    }
}

// ============================================================================
// Tests
// ============================================================================
