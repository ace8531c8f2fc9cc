//! Utility functions

/// Convert snake_case to PascalCase
pub fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(f) => f.to_uppercase().collect::<String>() + chars.as_str(),
            }
        })
        .collect()
}

/// Last segment of a dotted name (`shared.User` -> `User`).
pub fn base_name(s: &str) -> &str {
    s.rsplit('.').next().unwrap_or(s)
}
