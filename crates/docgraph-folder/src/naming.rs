//! File and folder names derived from entities.

use std::collections::HashSet;

use docgraph_model::{ContentHint, EntityId, Graph};

/// Characters that cannot appear in a file name on common file systems.
const RESERVED: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace characters that are not allowed in file names with `_`.
///
/// Trailing dots and spaces are replaced as well, since some file systems drop them.
pub fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let kept = out.trim_end_matches(['.', ' ']).len();
    let trailing = out.len() - kept;
    out.truncate(kept);
    out.extend(std::iter::repeat_n('_', trailing));
    out
}

/// File stem of an entity's own document.
pub fn document_stem(graph: &Graph, entity: EntityId) -> String {
    let name = graph
        .natural_key(entity)
        .filter(|key| !key.is_empty())
        .or_else(|| graph.display_name(entity).filter(|name| !name.is_empty()))
        .unwrap_or_else(|| graph.type_name(entity));
    sanitize(name)
}

/// Names for the members of a collection, one per member in order.
///
/// Natural keys are used when every member has a distinct one, display names otherwise.
/// `None` when neither gives every member a name that stays distinct after sanitizing,
/// compared without case.
pub fn member_names(graph: &Graph, members: &[EntityId]) -> Option<Vec<String>> {
    distinct(members.iter().map(|&m| graph.natural_key(m)))
        .or_else(|| distinct(members.iter().map(|&m| graph.display_name(m))))
}

fn distinct<'a>(names: impl Iterator<Item = Option<&'a str>>) -> Option<Vec<String>> {
    let mut raw = Vec::new();
    let mut seen = HashSet::new();
    for name in names {
        let name = name.filter(|n| !n.is_empty())?;
        if !seen.insert(sanitize(name).to_lowercase()) {
            return None;
        }
        raw.push(name.to_string());
    }
    Some(raw)
}

/// Group folder of a member: the lower-cased first character of its name once `prefix`
/// is stripped.
pub fn group_name(name: &str, prefix: Option<&str>) -> String {
    let rest = prefix
        .and_then(|p| name.strip_prefix(p))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(name);
    rest.chars()
        .next()
        .map(|c| sanitize(&c.to_lowercase().to_string()))
        .unwrap_or_else(|| "_".to_string())
}

/// Extension of the sibling file an externalized field is stored in.
pub const fn leaf_extension(content: ContentHint) -> Option<&'static str> {
    match content {
        ContentHint::Plain => None,
        ContentHint::LongText => Some("txt"),
        ContentHint::Markup => Some("html"),
        ContentHint::Blob => Some("bin"),
    }
}
