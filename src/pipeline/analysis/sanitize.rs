// Clean free-text context values before they are placed in a prompt.
// Strips invisible Unicode, drops prompt-injection lines, collapses whitespace.

/// Longest value kept for a single context field (characters).
pub const MAX_FIELD_LENGTH: usize = 2_000;

/// Sanitize one context value. Returns an empty string when nothing survives.
pub fn sanitize_field(raw: &str) -> String {
    let visible = remove_invisible_chars(raw);
    let kept: Vec<&str> = visible
        .lines()
        .filter(|line| !is_injection_line(line))
        .collect();
    let collapsed = collapse_whitespace(&kept.join(" "));
    truncate_chars(&collapsed, MAX_FIELD_LENGTH)
}

/// Remove zero-width, bidi and control characters. Newlines and tabs survive
/// so injection lines can still be detected one by one.
fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t') {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

/// Role markers and override phrases that have no place in patient context.
fn is_injection_line(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    const ROLE_MARKERS: &[&str] = &[
        "system:",
        "assistant:",
        "user:",
        "[system]",
        "[inst]",
        "[/inst]",
        "<<sys>>",
        "<system",
        "</system",
        "<instruction",
    ];
    const OVERRIDES: &[&str] = &[
        "ignore previous instructions",
        "ignore all instructions",
        "ignore the above instructions",
        "disregard your instructions",
        "disregard all instructions",
        "forget your instructions",
        "new instructions:",
        "ignore as instruções anteriores",
        "ignore todas as instruções",
        "desconsidere as instruções",
    ];
    ROLE_MARKERS.iter().any(|m| lower.starts_with(m))
        || OVERRIDES.iter().any(|o| lower.contains(o))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to `max` characters, breaking at the last word boundary.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    match cut.rfind(' ') {
        Some(pos) if pos > 0 => cut[..pos].to_string(),
        _ => cut,
    }
}
