use std::{any::type_name, sync::Arc};

use cfg_rs::{FromConfig, FromConfigWithPrefix};

use crate::{
    bean::AnyBean, instantiator, instantiator::Wiring, resolver, BeanDefinition, BeanId, Config,
    IocError, Registry, Result, TypeKey,
};

/// Handed to constructors and setters to pull in dependencies and properties
/// while a bean is being built.
pub struct Context<'c> {
    registry: &'c Registry,
    config: &'c Config,
    wiring: &'c mut Wiring,
    bean_name: &'c str,
}

impl<'c> Context<'c> {
    pub(crate) fn new(
        registry: &'c Registry,
        config: &'c Config,
        wiring: &'c mut Wiring,
        bean_name: &'c str,
    ) -> Self {
        Self {
            registry,
            config,
            wiring,
            bean_name,
        }
    }

    /// The bean of type `T`, primary one if there are several.
    pub fn get<T>(&mut self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let id = resolver::resolve(self.registry, TypeKey::of::<T>(), None)?;
        self.instance(id)
    }

    pub fn get_qualified<T>(&mut self, qualifier: &str) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let id = resolver::resolve(self.registry, TypeKey::of::<T>(), Some(qualifier))?;
        self.instance(id)
    }

    /// The bean of type `T` named `name`, or the one [`Context::get`] would return.
    pub fn get_named<T>(&mut self, name: &str) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let id = resolver::resolve_named(self.registry, TypeKey::of::<T>(), name)?;
        self.instance(id)
    }

    /// Every bean of type `T` by ascending order.
    pub fn get_all<T>(&mut self) -> Result<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        resolver::resolve_all(self.registry, TypeKey::of::<T>())
            .into_iter()
            .map(|id| self.instance(id))
            .collect()
    }

    pub fn get_config<V: FromConfig>(&self, key: &str) -> Result<V> {
        self.config.get(key)
    }

    pub fn get_predefined<V: FromConfigWithPrefix>(&self) -> Result<V> {
        self.config.get_predefined()
    }

    /// Name of the bean being built.
    pub fn bean_name(&self) -> &str {
        self.bean_name
    }

    pub(crate) fn instance<T>(&mut self, id: BeanId) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let bean = self.instance_any(id)?;
        downcast(&bean, self.registry.definition(id))
    }

    pub(crate) fn instance_any(&mut self, id: BeanId) -> Result<AnyBean> {
        instantiator::get_instance(self.registry, self.config, self.wiring, id)
    }
}

pub(crate) fn downcast<T>(bean: &AnyBean, definition: &BeanDefinition) -> Result<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    bean.downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| IocError::TypeMismatch {
            name: definition.name.clone(),
            required: type_name::<T>(),
            actual: definition.type_key.name(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Message(String);

    struct Greeter {
        message: Arc<Message>,
        name: String,
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                BeanDefinition::builder("message", |_| Ok(Message("Hello".to_string()))).build(),
            )
            .unwrap();
        registry
            .register(
                BeanDefinition::builder("greeter", |ctx| {
                    Ok(Greeter {
                        message: ctx.get::<Message>()?,
                        name: ctx.bean_name().to_string(),
                    })
                })
                .build(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn it_works() {
        let registry = registry();
        let config = Config::empty();
        let mut wiring = Wiring::default();
        let mut ctx = Context::new(&registry, &config, &mut wiring, "");

        let greeter = ctx.get::<Greeter>().unwrap();
        assert_eq!(greeter.message.0, "Hello");
        assert_eq!(greeter.name, "greeter");

        let message = ctx.get_named::<Message>("message").unwrap();
        assert!(Arc::ptr_eq(&message, &greeter.message));
        assert_eq!(ctx.get_all::<Message>().unwrap().len(), 1);
        assert!(ctx.get_all::<String>().unwrap().is_empty());
    }

    #[test]
    fn downcast_mismatch() {
        let registry = registry();
        let config = Config::empty();
        let mut wiring = Wiring::default();
        let mut ctx = Context::new(&registry, &config, &mut wiring, "");

        let id = registry.find_id("message").unwrap();
        let result = ctx.instance::<Greeter>(id);
        assert!(matches!(
            result,
            Err(IocError::TypeMismatch { name, .. }) if name == "message"
        ));
    }

    #[test]
    fn missing_config_value() {
        let registry = Registry::new();
        let config = Config::empty();
        let mut wiring = Wiring::default();
        let ctx = Context::new(&registry, &config, &mut wiring, "");

        assert!(ctx.get_config::<String>("greeting.text").is_err());
    }
}
