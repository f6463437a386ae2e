use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
};

use log::debug;

use crate::{BeanDefinition, IocError, Result, TypeKey};

/// Index of a definition in its [`Registry`], in registration order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BeanId {
    id: usize,
}

impl BeanId {
    pub(crate) fn new(value: usize) -> Self {
        Self { id: value }
    }

    pub fn index(&self) -> usize {
        self.id
    }
}

type TypeBeanIdMap = HashMap<TypeId, Vec<BeanId>>;
type NameBeanIdMap = HashMap<String, BeanId>;

/// Bean definitions by name and by declared type. Holds no instances.
#[derive(Debug, Default)]
pub struct Registry {
    definitions: Vec<BeanDefinition>,
    type_bean_id_map: TypeBeanIdMap,
    name_bean_id_map: NameBeanIdMap,
    primary_map: HashMap<TypeId, BeanId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: BeanDefinition) -> Result<BeanId> {
        // duplicate name of bean definition
        if let Some(id) = self.name_bean_id_map.get(&definition.name) {
            return Err(IocError::DuplicateName {
                name: definition.name,
                type_name: self.definition(*id).type_key.name(),
                duplicate_type_name: definition.type_key.name(),
            });
        }

        let type_id = definition.type_key.type_id();
        let bean_id = BeanId::new(self.definitions.len());

        if definition.primary {
            if let Some(id) = self.primary_map.get(&type_id) {
                return Err(IocError::AmbiguousPrimary {
                    type_name: definition.type_key.name(),
                    existing: self.definition(*id).name.clone(),
                    name: definition.name,
                });
            }
            self.primary_map.insert(type_id, bean_id);
        }

        debug!(
            "register bean {} of type {} as {:?}",
            definition.name,
            definition.type_key.name(),
            bean_id
        );

        self.type_bean_id_map
            .entry(type_id)
            .or_default()
            .push(bean_id);
        self.name_bean_id_map
            .insert(definition.name.clone(), bean_id);
        self.definitions.push(definition);

        Ok(bean_id)
    }

    pub fn definition(&self, id: BeanId) -> &BeanDefinition {
        &self.definitions[id.id]
    }

    pub fn find(&self, name: &str) -> Option<&BeanDefinition> {
        self.find_id(name).map(|id| self.definition(id))
    }

    pub fn find_id(&self, name: &str) -> Option<BeanId> {
        self.name_bean_id_map.get(name).copied()
    }

    /// Ids of every definition declared as `type_key`, by `order` ascending.
    /// Unordered definitions come last; ties keep registration order.
    pub fn find_all_by_type(&self, type_key: TypeKey) -> Vec<BeanId> {
        let mut ids = self
            .type_bean_id_map
            .get(&type_key.type_id())
            .cloned()
            .unwrap_or_default();

        ids.sort_by_key(|id| {
            let order = self.definition(*id).order;
            (order.is_none(), order, *id)
        });
        ids
    }

    pub(crate) fn primary_of(&self, type_key: TypeKey) -> Option<BeanId> {
        self.primary_map.get(&type_key.type_id()).copied()
    }

    /// Bean names in registration order.
    pub fn all_names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = BeanId> {
        (0..self.definitions.len()).map(BeanId::new)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Checks every `depends_on` name exists and that they form no cycle.
    pub fn validate_depends_on(&self) -> Result<()> {
        let mut depends_on = Vec::with_capacity(self.definitions.len());
        for definition in self.definitions.iter() {
            let mut ids = Vec::with_capacity(definition.depends_on.len());
            for name in definition.depends_on.iter() {
                let id = self.find_id(name).ok_or_else(|| {
                    IocError::Configuration(format!(
                        "bean [{}] depends on unknown bean [{name}]",
                        definition.name
                    ))
                })?;
                ids.push(id);
            }
            depends_on.push(ids);
        }

        let mut scan_ids: Vec<BeanId> = self.ids().collect();
        let mut ready_ids = HashSet::with_capacity(scan_ids.len());
        let mut tail = scan_ids.len();
        while tail > 0 {
            let mut some_ready = false;
            let mut head = 0;
            while head < tail {
                let id = scan_ids[head];
                if depends_on[id.id].iter().all(|d| ready_ids.contains(d)) {
                    some_ready = true;
                    ready_ids.insert(id);
                    tail -= 1;
                    scan_ids.swap(head, tail);
                } else {
                    head += 1;
                }
            }
            if !some_ready {
                let chain = self.cycle_path(&depends_on, &ready_ids, scan_ids[0]);
                return Err(IocError::Configuration(format!(
                    "circular depends_on: {}",
                    chain.join(" -> ")
                )));
            }
        }
        Ok(())
    }

    /// Walks unresolved `depends_on` edges from `start` until a bean repeats.
    fn cycle_path(
        &self,
        depends_on: &[Vec<BeanId>],
        ready_ids: &HashSet<BeanId>,
        start: BeanId,
    ) -> Vec<String> {
        let mut path = vec![start];
        let mut current = start;
        loop {
            let next = depends_on[current.id]
                .iter()
                .find(|id| !ready_ids.contains(*id))
                .copied();
            let Some(next) = next else {
                break;
            };
            if let Some(pos) = path.iter().position(|id| *id == next) {
                path.drain(..pos);
                path.push(next);
                break;
            }
            path.push(next);
            current = next;
        }
        path.into_iter()
            .map(|id| self.definition(id).name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    trait Task: Send + Sync {}

    struct TaskA;
    struct TaskB;

    impl Task for TaskA {}
    impl Task for TaskB {}

    fn task(name: &str) -> crate::BeanDefinitionBuilder<TaskA, dyn Task> {
        BeanDefinition::builder(name, |_| Ok(TaskA)).provides(|b| b as Arc<dyn Task>)
    }

    #[test]
    fn duplicate_name() {
        let mut registry = Registry::new();
        registry.register(task("a").build()).unwrap();

        let result = registry.register(BeanDefinition::builder("a", |_| Ok(TaskB)).build());
        assert!(matches!(result, Err(IocError::DuplicateName { name, .. }) if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_primary_is_rejected() {
        let mut registry = Registry::new();
        registry.register(task("a").primary().build()).unwrap();
        registry.register(task("b").build()).unwrap();

        let result = registry.register(task("c").primary().build());
        assert!(matches!(
            result,
            Err(IocError::AmbiguousPrimary { existing, name, .. }) if existing == "a" && name == "c"
        ));
    }

    #[test]
    fn find_all_by_type_is_ordered() {
        let mut registry = Registry::new();
        registry.register(task("none_1").build()).unwrap();
        registry.register(task("two").order(2).build()).unwrap();
        registry.register(task("one").order(1).build()).unwrap();
        registry.register(task("none_2").build()).unwrap();
        registry.register(task("also_two").order(2).build()).unwrap();
        registry
            .register(BeanDefinition::builder("other", |_| Ok(TaskB)).build())
            .unwrap();

        let names: Vec<&str> = registry
            .find_all_by_type(TypeKey::of::<dyn Task>())
            .into_iter()
            .map(|id| registry.definition(id).name())
            .collect();

        assert_eq!(names, vec!["one", "two", "also_two", "none_1", "none_2"]);
        assert!(registry.find_all_by_type(TypeKey::of::<String>()).is_empty());
        assert_eq!(
            registry.all_names(),
            vec!["none_1", "two", "one", "none_2", "also_two", "other"]
        );
    }

    #[test]
    fn depends_on_unknown() {
        let mut registry = Registry::new();
        registry.register(task("a").depends_on("ghost").build()).unwrap();

        let result = registry.validate_depends_on();
        assert!(matches!(result, Err(IocError::Configuration(msg)) if msg.contains("ghost")));
    }

    #[test]
    fn depends_on_cycle() {
        let mut registry = Registry::new();
        registry.register(task("free").build()).unwrap();
        registry.register(task("a").depends_on("b").build()).unwrap();
        registry.register(task("b").depends_on("c").build()).unwrap();
        registry.register(task("c").depends_on("a").build()).unwrap();

        match registry.validate_depends_on() {
            Err(IocError::Configuration(msg)) => {
                assert!(msg.contains("a"), "{msg}");
                assert!(msg.contains("b"), "{msg}");
                assert!(msg.contains("c"), "{msg}");
                assert!(!msg.contains("free"), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn depends_on_chain_is_valid() {
        let mut registry = Registry::new();
        registry.register(task("a").depends_on("b").build()).unwrap();
        registry.register(task("b").depends_on("c").build()).unwrap();
        registry.register(task("c").build()).unwrap();

        assert!(registry.validate_depends_on().is_ok());
    }
}
