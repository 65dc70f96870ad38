//! Every expression the engine sends to the inspected Python runtime.

/// Types rendered as plain values instead of being expanded into objects.
pub const PRIMITIVE_TYPES: [&str; 8] = ["int", "float", "str", "bool", "list", "dict", "tuple", "set"];

/// Member names reserved by the `abc` machinery.
const ABC_INTERNALS: [&str; 1] = ["_abc_impl"];

const CALLABLE_TYPES: [&str; 3] = ["method", "function", "builtin_function_or_method"];

pub fn identity(target: &str) -> String {
    format!("id({target})")
}

/// Used when the inspected object shadows the `id` builtin.
pub fn identity_fallback(target: &str) -> String {
    format!("__builtins__.id({target})")
}

pub fn members(target: &str) -> String {
    format!("dir({target})")
}

pub fn member(target: &str, name: &str) -> String {
    format!("{target}.{name}")
}

pub fn is_user_instance(target: &str) -> String {
    format!(
        "isinstance({target}, object) and not isinstance({target}, ({}))",
        PRIMITIVE_TYPES.join(", ")
    )
}

pub fn is_local(name: &str) -> String {
    format!("locals().get('{name}', None) is not None")
}

pub fn is_global(name: &str) -> String {
    format!("globals().get('{name}', None) is not None")
}

pub fn is_class_attribute(target: &str, name: &str) -> String {
    format!("{target}.__class__.__dict__.get('{name}', None) is not None")
}

/// The identity query failed because `id` was rebound to a non-callable.
pub fn identity_shadowed(rendering: &str) -> bool {
    rendering.contains("not callable")
}

/// Parses the list literal printed for `dir(x)`, e.g. `['a', '_b', '__init__']`.
pub fn parse_member_listing(rendering: &str) -> Vec<String> {
    let trimmed = rendering.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);

    inner
        .split(',')
        .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Dunder names (`__x__`) and `abc` bookkeeping never become attributes.
pub fn is_hidden_member(name: &str) -> bool {
    (name.len() > 4 && name.starts_with("__") && name.ends_with("__")) || ABC_INTERNALS.contains(&name)
}

pub fn is_callable_type(type_name: &str) -> bool {
    CALLABLE_TYPES.contains(&type_name) || type_name.starts_with("<bound method")
}

pub fn is_primitive_type(type_name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&type_name)
}

/// A member rendering that denotes another object, e.g. `<Node object at 0x7f..>`.
pub fn renders_as_object(type_name: &str, rendering: &str) -> bool {
    !is_primitive_type(type_name) && rendering.contains("object")
}

/// `abc` bookkeeping values look like objects but are never expanded.
pub fn is_abc_bookkeeping(type_name: &str) -> bool {
    type_name.contains("_abc_data")
}
