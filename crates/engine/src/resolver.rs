//! Reference resolution and text splitting
//!
//! All resolution is textual. `$Name` tokens expand to the raw text of
//! the named variable or constant, and expansion repeats while the
//! substituted text introduces further references. Splitting into list
//! elements or call arguments happens on the text level too, so a
//! reference whose value contains commas still binds as one argument.

use gridflow_foundation::ScriptLocation;

use crate::error::{Error, Result};
use crate::variables::Environment;

/// Expansion rounds before a reference chain is declared circular
pub const MAX_REFERENCE_DEPTH: usize = 32;

/// If the whole text is one `$Name` token, yield the name.
pub fn bare_reference(text: &str) -> Option<&str> {
    let name = text.trim().strip_prefix('$')?;
    if !name.is_empty() && ident_len(name) == name.len() {
        Some(name)
    } else {
        None
    }
}

/// True if the text contains at least one `$Name` token.
pub fn has_reference(text: &str) -> bool {
    first_reference(text).is_some()
}

/// Expand every `$Name` token against the environment.
pub fn resolve_text(text: &str, env: &Environment, location: &ScriptLocation) -> Result<String> {
    let mut current = text.to_string();
    for _ in 0..MAX_REFERENCE_DEPTH {
        let (expanded, replaced) = expand_once(&current, env, location)?;
        if !replaced {
            return Ok(expanded);
        }
        current = expanded;
    }
    let name = first_reference(&current).unwrap_or_default().to_string();
    Err(Error::CircularReference {
        name,
        location: location.clone(),
    })
}

/// Split a resolved list value on `|`. Empty text is an empty list;
/// empty elements between separators are preserved.
pub fn split_list(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split('|').map(str::to_string).collect()
}

/// Split the text between call parentheses on top-level commas.
///
/// Double quotes protect commas and are dropped after splitting, which
/// is how an extent literal travels as a single argument. Elements are
/// trimmed; empty text means no arguments.
pub fn split_arguments(text: &str, location: &ScriptLocation) -> Result<Vec<String>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in trimmed.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => args.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if in_quotes {
        return Err(Error::MalformedScript {
            message: "unterminated quote in argument list".into(),
            location: location.clone(),
        });
    }
    args.push(current);
    Ok(args.into_iter().map(|arg| arg.trim().to_string()).collect())
}

/// Byte length of the identifier prefix of `text`
pub(crate) fn ident_len(text: &str) -> usize {
    let mut len = 0;
    for (offset, ch) in text.char_indices() {
        let valid = if offset == 0 {
            ch.is_ascii_alphabetic() || ch == '_'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        if !valid {
            break;
        }
        len = offset + ch.len_utf8();
    }
    len
}

pub(crate) fn is_ident(text: &str) -> bool {
    !text.is_empty() && ident_len(text) == text.len()
}

fn expand_once(
    text: &str,
    env: &Environment,
    location: &ScriptLocation,
) -> Result<(String, bool)> {
    let mut out = String::with_capacity(text.len());
    let mut replaced = false;
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = ident_len(after);
        if len == 0 {
            // A lone `$` is literal text.
            out.push('$');
            rest = after;
            continue;
        }
        let name = &after[..len];
        let binding = env.find(name).ok_or_else(|| Error::UnresolvedReference {
            name: name.to_string(),
            location: location.clone(),
        })?;
        out.push_str(binding.raw());
        replaced = true;
        rest = &after[len..];
    }
    out.push_str(rest);
    Ok((out, replaced))
}

fn first_reference(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        let after = &rest[pos + 1..];
        let len = ident_len(after);
        if len > 0 {
            return Some(&after[..len]);
        }
        rest = after;
    }
    None
}
