use std::{fmt, sync::Arc};

use log::{info, warn};
use parking_lot::Mutex;

use crate::{
    bean::AnyBean,
    context::Context,
    instantiator::Wiring,
    resolver, Bean, BeanDefinition, Config, IocError, LifecycleState, Registry, Result, TypeKey,
};

struct ContainerState {
    config: Config,
    wiring: Wiring,
    closed: bool,
}

/// Composition root: owns the definitions, the live singletons and their teardown.
///
/// Every top-level lookup holds one lock for its whole duration, nested
/// construction included, so a lazy singleton requested from several threads
/// is still built once.
pub struct Container {
    registry: Registry,
    state: Mutex<ContainerState>,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    /// Registers `definitions`, validates `depends_on`, then builds every non-lazy singleton
    /// in registration order.
    ///
    /// Nothing is constructed when registration fails. When an eager construction fails the
    /// singletons already built are torn down before the error is returned.
    pub fn initialize<I>(definitions: I, config: Config) -> Result<Container>
    where
        I: IntoIterator<Item = BeanDefinition>,
    {
        let mut registry = Registry::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        registry.validate_depends_on()?;

        let container = Container {
            registry,
            state: Mutex::new(ContainerState {
                config,
                wiring: Wiring::default(),
                closed: false,
            }),
        };

        if let Err(err) = container.pre_instantiate() {
            warn!("container start failed: {err}");
            container.shutdown();
            return Err(err);
        }

        Ok(container)
    }

    fn pre_instantiate(&self) -> Result<()> {
        let mut count = 0;
        self.with_context(|ctx| {
            for id in self.registry.ids() {
                let definition = self.registry.definition(id);
                if definition.is_singleton() && !definition.is_lazy() {
                    ctx.instance_any(id)?;
                    count += 1;
                }
            }
            Ok(())
        })?;

        info!(
            "container started, {} beans registered, {count} eager singletons",
            self.registry.len()
        );
        Ok(())
    }

    fn with_context<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Context<'_>) -> Result<R>,
    {
        let mut state = self.state.lock();
        if state.closed {
            return Err(IocError::ContainerClosed);
        }
        let ContainerState { config, wiring, .. } = &mut *state;
        let mut ctx = Context::new(&self.registry, config, wiring, "");
        f(&mut ctx)
    }

    pub fn get_bean<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.with_context(|ctx| ctx.get::<T>())
    }

    pub fn get_bean_qualified<T>(&self, qualifier: &str) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.with_context(|ctx| ctx.get_qualified::<T>(qualifier))
    }

    /// Bean named `name`, which must be declared as `T`.
    pub fn get_bean_named<T>(&self, name: &str) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.with_context(|ctx| {
            let id = resolver::resolve_name(&self.registry, name)?;
            let definition = self.registry.definition(id);
            if definition.type_key != TypeKey::of::<T>() {
                return Err(IocError::TypeMismatch {
                    name: name.to_string(),
                    required: std::any::type_name::<T>(),
                    actual: definition.type_key.name(),
                });
            }
            ctx.instance::<T>(id)
        })
    }

    pub fn get_bean_by_name(&self, name: &str) -> Result<BeanHandle> {
        self.with_context(|ctx| {
            let id = resolver::resolve_name(&self.registry, name)?;
            let bean = ctx.instance_any(id)?;
            let definition = self.registry.definition(id);
            Ok(BeanHandle {
                name: definition.name.clone(),
                type_key: definition.type_key,
                bean,
            })
        })
    }

    /// Every bean declared as `T`, by ascending order.
    pub fn get_beans_of_type<T>(&self) -> Result<Vec<Arc<T>>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.with_context(|ctx| ctx.get_all::<T>())
    }

    pub fn get_bean_definition_names(&self) -> Vec<&str> {
        self.registry.all_names()
    }

    pub fn get_bean_definition(&self, name: &str) -> Option<&BeanDefinition> {
        self.registry.find(name)
    }

    pub fn contains_bean(&self, name: &str) -> bool {
        self.registry.find_id(name).is_some()
    }

    pub fn is_instantiated(&self, name: &str) -> bool {
        match self.registry.find_id(name) {
            Some(id) => self.state.lock().wiring.is_instantiated(id),
            None => false,
        }
    }

    pub fn lifecycle_state(&self, name: &str) -> Option<LifecycleState> {
        let id = self.registry.find_id(name)?;
        self.state.lock().wiring.lifecycle.state(id)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Runs pre-destroy hooks in reverse construction order and closes the container.
    /// Later calls do nothing.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let count = state.wiring.lifecycle.teardown_all();
        state.wiring.instances.clear();
        info!("container shutdown, {count} beans destroyed");
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registry", &self.registry)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Default)]
pub struct ContainerBuilder {
    definitions: Vec<BeanDefinition>,
    config: Option<Config>,
}

impl ContainerBuilder {
    pub fn bean<B: Bean>(self) -> Self {
        self.register(B::definition())
    }

    pub fn register(mut self, definition: BeanDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn definitions<I>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = BeanDefinition>,
    {
        self.definitions.extend(definitions);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Container> {
        Container::initialize(self.definitions, self.config.unwrap_or_default())
    }
}

/// Untyped bean returned by [`Container::get_bean_by_name`].
#[derive(Clone)]
pub struct BeanHandle {
    name: String,
    type_key: TypeKey,
    bean: AnyBean,
}

impl BeanHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn downcast<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.bean
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| IocError::TypeMismatch {
                name: self.name.clone(),
                required: std::any::type_name::<T>(),
                actual: self.type_key.name(),
            })
    }
}

impl fmt::Debug for BeanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanHandle")
            .field("name", &self.name)
            .field("type_key", &self.type_key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex as StdMutex,
        },
        thread,
        time::Duration,
    };

    use super::*;

    trait Notifier: Send + Sync {
        fn send(&self) -> &'static str;
    }

    struct ServiceA;
    struct ServiceB;

    impl Notifier for ServiceA {
        fn send(&self) -> &'static str {
            "a"
        }
    }

    impl Notifier for ServiceB {
        fn send(&self) -> &'static str {
            "b"
        }
    }

    #[derive(Default)]
    struct Greeter {
        greeting: StdMutex<String>,
    }

    fn notifiers() -> Vec<BeanDefinition> {
        vec![
            BeanDefinition::builder("service_a", |_| Ok(ServiceA))
                .provides(|b| b as Arc<dyn Notifier>)
                .primary()
                .build(),
            BeanDefinition::builder("service_b", |_| Ok(ServiceB))
                .provides(|b| b as Arc<dyn Notifier>)
                .qualifier("alt")
                .build(),
        ]
    }

    #[test]
    fn primary_and_qualifier() {
        let container = Container::initialize(notifiers(), Config::empty()).unwrap();

        assert_eq!(container.get_bean::<dyn Notifier>().unwrap().send(), "a");
        assert_eq!(
            container
                .get_bean_qualified::<dyn Notifier>("alt")
                .unwrap()
                .send(),
            "b"
        );
        assert!(matches!(
            container.get_bean_qualified::<dyn Notifier>("fax"),
            Err(IocError::NoMatch { .. })
        ));
        let all: Vec<&str> = container
            .get_beans_of_type::<dyn Notifier>()
            .unwrap()
            .iter()
            .map(|n| n.send())
            .collect();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[test]
    fn singleton_and_prototype_identity() {
        let container = Container::builder()
            .register(BeanDefinition::builder("single", |_| Ok(Greeter::default())).build())
            .register(
                BeanDefinition::builder("proto", |_| Ok(Greeter::default()))
                    .prototype()
                    .build(),
            )
            .build()
            .unwrap();

        let a = container.get_bean_named::<Greeter>("single").unwrap();
        let b = container.get_bean_named::<Greeter>("single").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = container.get_bean_named::<Greeter>("proto").unwrap();
        let d = container.get_bean_named::<Greeter>("proto").unwrap();
        assert!(!Arc::ptr_eq(&c, &d));
        *c.greeting.lock().unwrap() = "Hi".to_string();
        assert_eq!(*d.greeting.lock().unwrap(), "");
        assert!(!container.is_instantiated("proto"));
        assert_eq!(container.lifecycle_state("proto"), None);
    }

    #[test]
    fn lazy_is_built_on_first_request() {
        static POST_CONSTRUCT: AtomicUsize = AtomicUsize::new(0);

        let container = Container::builder()
            .register(
                BeanDefinition::builder("lazy", |_| Ok(Greeter::default()))
                    .lazy()
                    .post_construct(|_| {
                        POST_CONSTRUCT.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .build(),
            )
            .build()
            .unwrap();

        assert!(!container.is_instantiated("lazy"));
        assert_eq!(POST_CONSTRUCT.load(Ordering::SeqCst), 0);

        container.get_bean::<Greeter>().unwrap();
        container.get_bean::<Greeter>().unwrap();
        assert!(container.is_instantiated("lazy"));
        assert_eq!(POST_CONSTRUCT.load(Ordering::SeqCst), 1);
        assert_eq!(
            container.lifecycle_state("lazy"),
            Some(LifecycleState::PostConstructed)
        );
    }

    #[test]
    fn concurrent_lazy_lookup_builds_once() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let container = Container::builder()
            .register(
                BeanDefinition::builder("slow", |_| {
                    BUILT.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok(Greeter::default())
                })
                .lazy()
                .build(),
            )
            .build()
            .unwrap();

        let beans: Vec<Arc<Greeter>> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| container.get_bean::<Greeter>().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(beans.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn depends_on_cycle_fails_before_construction() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let definitions = vec![
            BeanDefinition::builder("a", |_| {
                BUILT.fetch_add(1, Ordering::SeqCst);
                Ok(ServiceA)
            })
            .depends_on("b")
            .build(),
            BeanDefinition::builder("b", |_| {
                BUILT.fetch_add(1, Ordering::SeqCst);
                Ok(ServiceB)
            })
            .depends_on("a")
            .build(),
        ];

        let result = Container::initialize(definitions, Config::empty());
        assert!(matches!(result, Err(IocError::Configuration(_))));
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn setter_runs_before_post_construct() {
        struct Holder {
            notifier: Option<Arc<dyn Notifier>>,
            seen: &'static str,
        }

        let mut definitions = notifiers();
        definitions.push(
            BeanDefinition::builder("holder", |_| {
                Ok(Holder {
                    notifier: None,
                    seen: "",
                })
            })
            .setter(|holder, ctx| {
                holder.notifier = Some(ctx.get_qualified::<dyn Notifier>("alt")?);
                Ok(())
            })
            .post_construct(|holder| {
                holder.seen = holder
                    .notifier
                    .as_ref()
                    .map(|n| n.send())
                    .unwrap_or("none");
                Ok(())
            })
            .build(),
        );

        let container = Container::initialize(definitions, Config::empty()).unwrap();
        assert_eq!(container.get_bean::<Holder>().unwrap().seen, "b");
    }

    #[test]
    fn shutdown_reverse_once_then_closed() {
        let log = Arc::new(StdMutex::new(Vec::new()));

        let first_log = Arc::clone(&log);
        let second_log = Arc::clone(&log);
        let proto_log = Arc::clone(&log);
        let container = Container::builder()
            .register(
                BeanDefinition::builder("first", |_| Ok(ServiceA))
                    .pre_destroy(move |_| first_log.lock().unwrap().push("first"))
                    .build(),
            )
            .register(
                BeanDefinition::builder("second", |ctx| {
                    ctx.get_named::<ServiceA>("first")?;
                    Ok(ServiceB)
                })
                .pre_destroy(move |_| second_log.lock().unwrap().push("second"))
                .build(),
            )
            .register(
                BeanDefinition::builder("proto", |_| Ok(Greeter::default()))
                    .prototype()
                    .pre_destroy(move |_| proto_log.lock().unwrap().push("proto"))
                    .build(),
            )
            .build()
            .unwrap();

        container.get_bean::<Greeter>().unwrap();

        container.shutdown();
        container.shutdown();
        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
        assert!(container.is_closed());
        assert!(matches!(
            container.get_bean::<ServiceA>(),
            Err(IocError::ContainerClosed)
        ));
        assert!(matches!(
            container.get_bean_by_name("first"),
            Err(IocError::ContainerClosed)
        ));

        drop(container);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn drop_runs_pre_destroy() {
        static DESTROYED: AtomicUsize = AtomicUsize::new(0);

        let container = Container::builder()
            .register(
                BeanDefinition::builder("a", |_| Ok(ServiceA))
                    .pre_destroy(|_| {
                        DESTROYED.fetch_add(1, Ordering::SeqCst);
                    })
                    .build(),
            )
            .build()
            .unwrap();

        assert_eq!(DESTROYED.load(Ordering::SeqCst), 0);
        drop(container);
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_start_tears_down_built_singletons() {
        static DESTROYED: AtomicUsize = AtomicUsize::new(0);

        let definitions = vec![
            BeanDefinition::builder("ok", |_| Ok(ServiceA))
                .pre_destroy(|_| {
                    DESTROYED.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
            BeanDefinition::builder("broken", |ctx| {
                let _: String = ctx.get_config("missing.key")?;
                Ok(ServiceB)
            })
            .build(),
        ];

        let result = Container::initialize(definitions, Config::empty());
        assert!(matches!(result, Err(IocError::ConfigError(_))));
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn named_lookup_checks_type() {
        let container = Container::initialize(notifiers(), Config::empty()).unwrap();

        assert!(container.get_bean_named::<dyn Notifier>("service_b").is_ok());
        assert!(matches!(
            container.get_bean_named::<ServiceB>("service_b"),
            Err(IocError::TypeMismatch { .. })
        ));
        assert!(matches!(
            container.get_bean_named::<dyn Notifier>("ghost"),
            Err(IocError::NoMatch { .. })
        ));

        let handle = container.get_bean_by_name("service_b").unwrap();
        assert_eq!(handle.name(), "service_b");
        assert_eq!(handle.type_key(), TypeKey::of::<dyn Notifier>());
        assert_eq!(handle.downcast::<dyn Notifier>().unwrap().send(), "b");
        assert!(handle.downcast::<ServiceB>().is_err());
    }

    #[test]
    fn introspection() {
        let container = Container::initialize(notifiers(), Config::empty()).unwrap();

        assert_eq!(
            container.get_bean_definition_names(),
            vec!["service_a", "service_b"]
        );
        assert!(container.contains_bean("service_a"));
        assert!(!container.contains_bean("service_c"));
        let definition = container.get_bean_definition("service_b").unwrap();
        assert_eq!(definition.qualifier(), Some("alt"));
        assert!(container.is_instantiated("service_b"));
    }

    #[test]
    fn duplicate_registration_builds_nothing() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let result = Container::builder()
            .register(
                BeanDefinition::builder("a", |_| {
                    BUILT.fetch_add(1, Ordering::SeqCst);
                    Ok(ServiceA)
                })
                .build(),
            )
            .register(BeanDefinition::builder("a", |_| Ok(ServiceB)).build())
            .build();

        assert!(matches!(result, Err(IocError::DuplicateName { .. })));
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);
    }
}
