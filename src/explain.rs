//! Plain-English descriptions of simple CSS selectors.
//!
//! Classification looks only at the leading character and bracket presence,
//! so compound selectors are described by their first recognizable shape.

use crate::error::{Result, SelkitError};

/// Describes in plain English what a simple selector selects.
///
/// Only the leading character is inspected: `#` is an id, `.` a class, a
/// bracketed `[attr=value]` an attribute test and anything else a tag name.
/// An attribute selector without `=` is a [`SelkitError::MalformedSelector`].
pub fn explain(selector: &str) -> Result<String> {
    if let Some(id) = selector.strip_prefix('#') {
        return Ok(format!("Selects the element with the id '{}'.", id));
    }
    if let Some(class) = selector.strip_prefix('.') {
        return Ok(format!("Selects all elements with the class '{}'.", class));
    }
    if selector.contains('[') && selector.contains(']') {
        return explain_attribute(selector);
    }
    Ok(format!("Selects all '{}' elements.", selector))
}

fn explain_attribute(selector: &str) -> Result<String> {
    let (tag, rest) = selector
        .split_once('[')
        .ok_or_else(|| SelkitError::MalformedSelector(selector.to_string()))?;
    let bracket = rest.split('[').next().unwrap_or(rest).replace(']', "");
    let (attr, value) = bracket
        .split_once('=')
        .ok_or_else(|| SelkitError::MalformedSelector(selector.to_string()))?;
    let value = value.trim_matches(|c| c == '\'' || c == '"');

    let subject = if tag.is_empty() {
        "Selects all elements".to_string()
    } else {
        format!("Selects all '{}' elements", tag)
    };
    Ok(format!(
        "{} with the attribute '{}' equal to '{}'.",
        subject, attr, value
    ))
}
