use serde_json::Value;
use thiserror::Error;

/// Why seek box text could not be turned into a key.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SeekParseError {
    #[error("seek input is empty")]
    Empty,
    #[error("invalid seek value `{input}`: {reason}")]
    Invalid { input: String, reason: String },
}

/// Parses seek box text as a JSON value.
///
/// Text that does not start like a JSON string, array or object and fails to parse is taken
/// as a bare word: `alice` seeks the string `"alice"`, while `{"a":` is an error.
pub fn parse_seek_input(text: &str) -> Result<Value, SeekParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SeekParseError::Empty);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(value),
        Err(_) if !trimmed.starts_with(['"', '[', '{']) => Ok(Value::String(trimmed.to_owned())),
        Err(err) => Err(SeekParseError::Invalid {
            input: trimmed.to_owned(),
            reason: err.to_string(),
        }),
    }
}
