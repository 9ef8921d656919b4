//! Registry names for remote operations
//!
//! Remote operation names are arbitrary strings; registry names must match
//! `^[A-Za-z][A-Za-z0-9_]{0,63}$`.

/// Longest registry name
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Name used when sanitizing leaves nothing
pub const UNNAMED_TOOL: &str = "unnamed_tool";

const DIGIT_PREFIX: &str = "tool_";

/// Pick the unsanitized candidate for an operation
///
/// `connected` counts the connections live once this one is added. With a
/// single provider the operation keeps its own name; otherwise it is
/// prefixed with the server id.
pub fn candidate_name(server_id: &str, original_name: &str, connected: usize) -> String {
    if connected == 1 {
        original_name.to_string()
    } else {
        format!("{}_{}", server_id, original_name)
    }
}

/// Candidate name, sanitized
pub fn registry_name(server_id: &str, original_name: &str, connected: usize) -> String {
    sanitize_tool_name(&candidate_name(server_id, original_name, connected))
}

/// Whether `name` can be used as a registry name without changes
pub fn is_valid_tool_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= MAX_TOOL_NAME_LEN
}

/// Normalize `name` into a valid registry name
///
/// Valid names pass through untouched. Anything else has each run of
/// characters outside `[A-Za-z0-9_]` folded into a single underscore,
/// repeated underscores collapsed, outer underscores stripped, `tool_`
/// prepended when it does not start with a letter, and is cut to 64
/// characters without a trailing underscore.
pub fn sanitize_tool_name(name: &str) -> String {
    if is_valid_tool_name(name) {
        return name.to_string();
    }

    let mut folded = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
        if c == '_' && folded.ends_with('_') {
            continue;
        }
        folded.push(c);
    }

    let trimmed = folded.trim_matches('_');
    if trimmed.is_empty() {
        return UNNAMED_TOOL.to_string();
    }

    let mut sanitized = if trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
        trimmed.to_string()
    } else {
        format!("{}{}", DIGIT_PREFIX, trimmed)
    };

    // Only ASCII is left, so byte length is character length.
    if sanitized.len() > MAX_TOOL_NAME_LEN {
        sanitized.truncate(MAX_TOOL_NAME_LEN);
        let kept = sanitized.trim_end_matches('_').len();
        sanitized.truncate(kept);
    }

    if sanitized.is_empty() {
        UNNAMED_TOOL.to_string()
    } else {
        sanitized
    }
}
