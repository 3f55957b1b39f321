pub mod attendance;
pub mod auth;
pub mod classes;
pub mod reports;
pub mod students;

/// Blank query values mean "no filter".
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
