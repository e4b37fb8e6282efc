//! String utility functions.
//!
//! Attribute keys are stored snake cased (`first_name`) while member and
//! hook names are studly cased (`FirstName`); these helpers convert between
//! the two and strip table qualifiers from column keys.

use once_cell::sync::Lazy;
use regex::Regex;

/// Converts a string to `snake_case`.
///
/// # Examples
///
/// ```
/// use modelkit_core::utils::text::snake_case;
///
/// assert_eq!(snake_case("firstName"), "first_name");
/// assert_eq!(snake_case("HTTPStatus"), "h_t_t_p_status");
/// assert_eq!(snake_case("already_snake"), "already_snake");
/// ```
pub fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, ch) in s.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else if ch == ' ' || ch == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Converts a string to `StudlyCase`.
///
/// # Examples
///
/// ```
/// use modelkit_core::utils::text::studly_case;
///
/// assert_eq!(studly_case("first_name"), "FirstName");
/// assert_eq!(studly_case("soft-deletes"), "SoftDeletes");
/// ```
pub fn studly_case(s: &str) -> String {
    s.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect()
}

/// Removes a table qualifier from a column key (`users.name` becomes `name`).
///
/// # Examples
///
/// ```
/// use modelkit_core::utils::text::remove_table_prefix;
///
/// assert_eq!(remove_table_prefix("users.name"), "name");
/// assert_eq!(remove_table_prefix("db.users.name"), "name");
/// assert_eq!(remove_table_prefix("name"), "name");
/// ```
pub fn remove_table_prefix(key: &str) -> String {
    QUALIFIED.replace(key, "$1").into_owned()
}

static QUALIFIED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+\.([^.]+)$").expect("valid qualified column pattern"));
