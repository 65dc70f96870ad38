use crate::model::Visibility;

/// Visibility implied by the member name alone.
///
/// `None` means the name is public by convention and the caller still has to
/// ask the runtime whether it lives in the class dictionary (static).
pub fn visibility_from_name(name: &str) -> Option<Visibility> {
    if name.starts_with("__") && !name.ends_with("__") {
        Some(Visibility::Private)
    } else if name.starts_with('_') {
        Some(Visibility::Protected)
    } else {
        None
    }
}

/// Reverts Python's private name mangling: `_Node__secret` on a `Node` becomes `__secret`.
pub fn unmangle<'a>(name: &'a str, owner_type: &str) -> &'a str {
    if owner_type.is_empty() {
        return name;
    }
    match name
        .strip_prefix('_')
        .and_then(|rest| rest.strip_prefix(owner_type))
    {
        Some(rest) if rest.starts_with("__") && rest.len() > 2 => rest,
        _ => name,
    }
}

/// Cuts `value` to at most `limit` characters and appends `ellipsis` when anything was dropped.
///
/// A value that is already a preview (at most `limit` characters followed by
/// `ellipsis`) is returned unchanged.
pub fn truncate_preview(value: &str, limit: usize, ellipsis: &str) -> String {
    if let Some(stem) = value.strip_suffix(ellipsis).filter(|_| !ellipsis.is_empty()) {
        if stem.chars().count() <= limit {
            return value.to_owned();
        }
    }
    match value.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{ellipsis}", &value[..cut]),
        None => value.to_owned(),
    }
}
