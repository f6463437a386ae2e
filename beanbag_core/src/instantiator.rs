use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    bean::{AnyBean, Published},
    lifecycle::LifecycleManager,
    resolver, BeanDefinition, BeanId, Config, Context, IocError, LifecycleState, Registry, Result,
};

/// Mutable state of a container: live singletons, beans being built, lifecycle.
#[derive(Default)]
pub(crate) struct Wiring {
    pub(crate) instances: HashMap<BeanId, AnyBean>,
    pub(crate) in_progress: Vec<BeanId>,
    pub(crate) lifecycle: LifecycleManager,
}

impl Wiring {
    pub(crate) fn is_instantiated(&self, id: BeanId) -> bool {
        self.instances.contains_key(&id)
    }
}

/// Instance of bean `id`: the cached singleton, or a freshly built one.
pub(crate) fn get_instance(
    registry: &Registry,
    config: &Config,
    wiring: &mut Wiring,
    id: BeanId,
) -> Result<AnyBean> {
    if let Some(bean) = wiring.instances.get(&id) {
        return Ok(Arc::clone(bean));
    }

    let definition = registry.definition(id);

    if let Some(pos) = wiring.in_progress.iter().position(|i| *i == id) {
        let mut chain: Vec<String> = wiring.in_progress[pos..]
            .iter()
            .map(|i| registry.definition(*i).name.clone())
            .collect();
        chain.push(definition.name.clone());
        return Err(IocError::CircularDependency { chain });
    }

    wiring.in_progress.push(id);
    let result = create(registry, config, wiring, id, definition);
    wiring.in_progress.pop();

    if result.is_err() && definition.is_singleton() {
        wiring.lifecycle.forget(id);
    }
    result
}

fn create(
    registry: &Registry,
    config: &Config,
    wiring: &mut Wiring,
    id: BeanId,
    definition: &BeanDefinition,
) -> Result<AnyBean> {
    for name in definition.depends_on.iter() {
        let depend_id = resolver::resolve_name(registry, name)?;
        get_instance(registry, config, wiring, depend_id)?;
    }

    let name = definition.name.as_str();
    let singleton = definition.is_singleton();
    let recipe = &definition.recipe;

    debug!(
        "create {} bean {} of type {}",
        definition.scope,
        name,
        definition.concrete_type
    );

    let mut raw = recipe.construct(&mut Context::new(registry, config, wiring, name))?;
    if singleton {
        wiring.lifecycle.advance(id, name, LifecycleState::Constructed)?;
    }

    recipe.wire(&mut raw, &mut Context::new(registry, config, wiring, name))?;
    if singleton {
        wiring.lifecycle.advance(id, name, LifecycleState::Wired)?;
    }

    recipe.post_construct(&mut raw)?;
    if singleton {
        wiring
            .lifecycle
            .advance(id, name, LifecycleState::PostConstructed)?;
    }

    let Published { bean, teardown } = recipe.publish(raw)?;
    if singleton {
        wiring.instances.insert(id, Arc::clone(&bean));
        wiring.lifecycle.register_for_teardown(id, name, teardown);
    }

    Ok(bean)
}
