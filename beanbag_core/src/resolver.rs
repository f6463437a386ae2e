//! Maps a required type, with an optional qualifier or name, to definitions.

use crate::{BeanId, IocError, Registry, Result, TypeKey};

/// Single candidate for `type_key`.
///
/// With a qualifier only candidates whose qualifier or name equals it are kept.
/// Without one, several candidates are narrowed to the primary bean of the type.
pub fn resolve(registry: &Registry, type_key: TypeKey, qualifier: Option<&str>) -> Result<BeanId> {
    let candidates = registry.find_all_by_type(type_key);

    if let Some(qualifier) = qualifier {
        let matched: Vec<BeanId> = candidates
            .into_iter()
            .filter(|id| registry.definition(*id).matches_qualifier(qualifier))
            .collect();
        return match matched.as_slice() {
            [] => Err(IocError::no_qualified(type_key, qualifier)),
            [id] => Ok(*id),
            _ => Err(too_many(registry, type_key, &matched)),
        };
    }

    match candidates.as_slice() {
        [] => Err(IocError::no_type(type_key)),
        [id] => Ok(*id),
        _ => registry
            .primary_of(type_key)
            .ok_or_else(|| too_many(registry, type_key, &candidates)),
    }
}

/// Every candidate for `type_key`, ordered. May be empty.
pub fn resolve_all(registry: &Registry, type_key: TypeKey) -> Vec<BeanId> {
    registry.find_all_by_type(type_key)
}

/// Same-named candidate of `type_key` if any, otherwise [`resolve`] without qualifier.
pub fn resolve_named(registry: &Registry, type_key: TypeKey, name: &str) -> Result<BeanId> {
    match registry.find_id(name) {
        Some(id) if registry.definition(id).type_key == type_key => Ok(id),
        _ => resolve(registry, type_key, None),
    }
}

pub fn resolve_name(registry: &Registry, name: &str) -> Result<BeanId> {
    registry.find_id(name).ok_or_else(|| IocError::no_name(name))
}

fn too_many(registry: &Registry, type_key: TypeKey, ids: &[BeanId]) -> IocError {
    let candidates: Vec<String> = ids
        .iter()
        .map(|id| registry.definition(*id).name.clone())
        .collect();
    IocError::AmbiguousMatch {
        type_name: type_key.name(),
        candidates: candidates.into_boxed_slice(),
    }
}
