//! Boundary validation: numeric ranges and non-empty-string
//! checks shared by every tool function.

use crate::error::ToolError;

pub fn range_u32(name: &str, value: u32, min: u32, max: u32) -> Result<u32, ToolError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ToolError::invalid_input(format!(
            "{name} must be between {min} and {max}, got {value}"
        )))
    }
}

pub fn similarity(name: &str, value: f32) -> Result<f32, ToolError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ToolError::invalid_input(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )))
    }
}

pub fn non_empty<'a>(name: &str, value: &'a str) -> Result<&'a str, ToolError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ToolError::invalid_input(format!("{name} must not be empty")))
    } else {
        Ok(trimmed)
    }
}

pub fn non_empty_list<'a, T>(name: &str, value: &'a [T]) -> Result<&'a [T], ToolError> {
    if value.is_empty() {
        Err(ToolError::invalid_input(format!("{name} must not be empty")))
    } else {
        Ok(value)
    }
}
