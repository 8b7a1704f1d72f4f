//! What's a project without a util module.

/// Escape a string literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Numeric suffix of an actual target name, e.g. `t_order_1` -> 1.
pub fn numeric_suffix(name: &str) -> Option<usize> {
    let digits = name
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    name[name.len() - digits..].parse().ok()
}
