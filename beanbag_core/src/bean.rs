use std::{
    any::{type_name, Any, TypeId},
    fmt,
    sync::Arc,
};

use anyhow::anyhow;
use log::debug;

use crate::{Context, Result};

/// A live bean as stored in the instance table: an `Arc<T>` of the declared type, erased.
pub(crate) type AnyBean = Arc<dyn Any + Send + Sync>;

/// A bean that was constructed but not yet published, still owned by the instantiator.
pub(crate) type RawBean = Box<dyn Any + Send + Sync>;

pub(crate) type TeardownHook = Box<dyn FnOnce() + Send>;

/// Explicit type tag of a bean. Works for concrete types as well as `dyn Trait`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TypeKey {
    type_id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Scope {
    /// One shared instance per container.
    #[default]
    Singleton,
    /// A fresh instance for every lookup, never tracked after creation.
    Prototype,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Singleton => f.write_str("singleton"),
            Scope::Prototype => f.write_str("prototype"),
        }
    }
}

/// How an injection point picks its bean.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Selector {
    Type,
    Qualified(String),
    Named(String),
    All,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InjectionPhase {
    Constructor,
    Setter,
}

/// Declared injection point of a bean. Only used for introspection, the
/// actual wiring is done by the bean's constructor and setters.
#[derive(Clone, Debug)]
pub struct Dependency {
    pub selector: Selector,
    pub type_key: TypeKey,
    pub phase: InjectionPhase,
}

impl Dependency {
    pub fn of<T>() -> Dependency
    where
        T: ?Sized + 'static,
    {
        Dependency {
            selector: Selector::Type,
            type_key: TypeKey::of::<T>(),
            phase: InjectionPhase::Constructor,
        }
    }

    pub fn qualified<T>(qualifier: impl Into<String>) -> Dependency
    where
        T: ?Sized + 'static,
    {
        Dependency {
            selector: Selector::Qualified(qualifier.into()),
            ..Self::of::<T>()
        }
    }

    pub fn named<T>(name: impl Into<String>) -> Dependency
    where
        T: ?Sized + 'static,
    {
        Dependency {
            selector: Selector::Named(name.into()),
            ..Self::of::<T>()
        }
    }

    pub fn all<T>() -> Dependency
    where
        T: ?Sized + 'static,
    {
        Dependency {
            selector: Selector::All,
            ..Self::of::<T>()
        }
    }

    pub fn by_setter(mut self) -> Dependency {
        self.phase = InjectionPhase::Setter;
        self
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            Selector::Type => write!(f, "{}", self.type_key)?,
            Selector::Qualified(qualifier) => write!(f, "{} @{qualifier}", self.type_key)?,
            Selector::Named(name) => write!(f, "{} '{name}'", self.type_key)?,
            Selector::All => write!(f, "[{}]", self.type_key)?,
        }
        if self.phase == InjectionPhase::Setter {
            f.write_str(" (setter)")?;
        }
        Ok(())
    }
}

/// Output of [`Recipe::publish`].
pub(crate) struct Published {
    pub(crate) bean: AnyBean,
    pub(crate) teardown: Option<TeardownHook>,
}

/// The type-erased factory of a definition, driven phase by phase by the instantiator.
pub(crate) trait Recipe: Send + Sync {
    fn construct(&self, ctx: &mut Context<'_>) -> Result<RawBean>;

    fn wire(&self, raw: &mut RawBean, ctx: &mut Context<'_>) -> Result<()>;

    fn post_construct(&self, raw: &mut RawBean) -> Result<()>;

    fn publish(&self, raw: RawBean) -> Result<Published>;

    fn has_post_construct(&self) -> bool;

    fn has_pre_destroy(&self) -> bool;
}

type Constructor<C> = Box<dyn Fn(&mut Context<'_>) -> Result<C> + Send + Sync>;
type Setter<C> = Box<dyn Fn(&mut C, &mut Context<'_>) -> Result<()> + Send + Sync>;
type PostConstruct<C> = Box<dyn Fn(&mut C) -> Result<()> + Send + Sync>;
type PreDestroy<C> = Arc<dyn Fn(&C) + Send + Sync>;
type Upcast<C, T> = Box<dyn Fn(Arc<C>) -> Arc<T> + Send + Sync>;

struct TypedRecipe<C, T: ?Sized> {
    constructor: Constructor<C>,
    setters: Vec<Setter<C>>,
    post_construct: Option<PostConstruct<C>>,
    pre_destroy: Option<PreDestroy<C>>,
    upcast: Upcast<C, T>,
}

fn raw_mut<C: 'static>(raw: &mut RawBean) -> Result<&mut C> {
    raw.downcast_mut::<C>()
        .ok_or_else(|| anyhow!("raw bean is not a {}", type_name::<C>()).into())
}

impl<C, T> Recipe for TypedRecipe<C, T>
where
    C: Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    fn construct(&self, ctx: &mut Context<'_>) -> Result<RawBean> {
        let bean = (self.constructor)(ctx)?;
        Ok(Box::new(bean))
    }

    fn wire(&self, raw: &mut RawBean, ctx: &mut Context<'_>) -> Result<()> {
        let bean = raw_mut::<C>(raw)?;
        for setter in self.setters.iter() {
            setter(bean, ctx)?;
        }
        Ok(())
    }

    fn post_construct(&self, raw: &mut RawBean) -> Result<()> {
        if let Some(post_construct) = &self.post_construct {
            post_construct(raw_mut::<C>(raw)?)?;
        }
        Ok(())
    }

    fn publish(&self, raw: RawBean) -> Result<Published> {
        let bean = raw
            .downcast::<C>()
            .map_err(|_| anyhow!("raw bean is not a {}", type_name::<C>()))?;
        let bean: Arc<C> = Arc::from(bean);

        let teardown = self.pre_destroy.as_ref().map(|pre_destroy| {
            let pre_destroy = Arc::clone(pre_destroy);
            let target = Arc::clone(&bean);
            Box::new(move || pre_destroy(&target)) as TeardownHook
        });

        let declared: Arc<T> = (self.upcast)(bean);
        Ok(Published {
            bean: Arc::new(declared),
            teardown,
        })
    }

    fn has_post_construct(&self) -> bool {
        self.post_construct.is_some()
    }

    fn has_pre_destroy(&self) -> bool {
        self.pre_destroy.is_some()
    }
}

/// Metadata and recipe of one bean. Created once at registration, never mutated after.
pub struct BeanDefinition {
    pub(crate) name: String,
    pub(crate) type_key: TypeKey,
    pub(crate) concrete_type: &'static str,
    pub(crate) scope: Scope,
    pub(crate) lazy: bool,
    pub(crate) order: Option<i32>,
    pub(crate) qualifier: Option<String>,
    pub(crate) primary: bool,
    pub(crate) depends_on: Vec<String>,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) recipe: Arc<dyn Recipe>,
}

impl BeanDefinition {
    /// Starts a definition of a bean named `name`, built by `constructor`.
    ///
    /// The bean is declared under its own type `C` unless [`BeanDefinitionBuilder::provides`]
    /// says otherwise.
    pub fn builder<C, F>(name: impl Into<String>, constructor: F) -> BeanDefinitionBuilder<C>
    where
        C: Send + Sync + 'static,
        F: Fn(&mut Context<'_>) -> Result<C> + Send + Sync + 'static,
    {
        BeanDefinitionBuilder {
            name: name.into(),
            scope: Scope::Singleton,
            lazy: false,
            order: None,
            qualifier: None,
            primary: false,
            depends_on: Vec::new(),
            dependencies: Vec::new(),
            recipe: TypedRecipe {
                constructor: Box::new(constructor),
                setters: Vec::new(),
                post_construct: None,
                pre_destroy: None,
                upcast: Box::new(|bean: Arc<C>| bean),
            },
        }
    }

    /// Singleton definition handing out clones of an existing value.
    pub fn from_instance<C>(name: impl Into<String>, value: C) -> BeanDefinitionBuilder<C>
    where
        C: Clone + Send + Sync + 'static,
    {
        Self::builder(name, move |_| Ok(value.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn concrete_type_name(&self) -> &'static str {
        self.concrete_type
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == Scope::Singleton
    }

    pub fn is_prototype(&self) -> bool {
        self.scope == Scope::Prototype
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn has_post_construct(&self) -> bool {
        self.recipe.has_post_construct()
    }

    pub fn has_pre_destroy(&self) -> bool {
        self.recipe.has_pre_destroy()
    }

    /// True when a qualifier lookup for `qualifier` may pick this bean.
    pub(crate) fn matches_qualifier(&self, qualifier: &str) -> bool {
        self.qualifier.as_deref() == Some(qualifier) || self.name == qualifier
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("type_key", &self.type_key)
            .field("concrete_type", &self.concrete_type)
            .field("scope", &self.scope)
            .field("lazy", &self.lazy)
            .field("order", &self.order)
            .field("qualifier", &self.qualifier)
            .field("primary", &self.primary)
            .field("depends_on", &self.depends_on)
            .field("dependencies", &self.dependencies)
            .field("recipe", &"Recipe")
            .finish()
    }
}

impl fmt::Display for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bean [{}]", self.concrete_type)?;
        if self.type_key.name() != self.concrete_type {
            write!(f, " as [{}]", self.type_key)?;
        }
        write!(
            f,
            "; scope={}; lazy={}; primary={}",
            self.scope, self.lazy, self.primary
        )?;
        if let Some(order) = self.order {
            write!(f, "; order={order}")?;
        }
        if let Some(qualifier) = &self.qualifier {
            write!(f, "; qualifier={qualifier}")?;
        }
        if !self.depends_on.is_empty() {
            write!(f, "; depends_on={:?}", self.depends_on)?;
        }
        if !self.dependencies.is_empty() {
            let dependencies: Vec<String> =
                self.dependencies.iter().map(ToString::to_string).collect();
            write!(f, "; dependencies=[{}]", dependencies.join(", "))?;
        }
        if self.has_post_construct() {
            f.write_str("; post_construct")?;
        }
        if self.has_pre_destroy() {
            f.write_str("; pre_destroy")?;
        }
        Ok(())
    }
}

/// Typed builder for [`BeanDefinition`]. `C` is the constructed type, `T` the declared one.
pub struct BeanDefinitionBuilder<C, T: ?Sized = C> {
    name: String,
    scope: Scope,
    lazy: bool,
    order: Option<i32>,
    qualifier: Option<String>,
    primary: bool,
    depends_on: Vec<String>,
    dependencies: Vec<Dependency>,
    recipe: TypedRecipe<C, T>,
}

impl<C, T> BeanDefinitionBuilder<C, T>
where
    C: Send + Sync + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    pub fn lazy(self) -> Self {
        self.lazy_init(true)
    }

    pub fn lazy_init(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Position in ordered collections, lower first.
    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Forces bean `name` to be fully initialized before this one, without injecting it.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Injection step run right after construction, before post-construct.
    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut C, &mut Context<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.recipe.setters.push(Box::new(setter));
        self
    }

    pub fn post_construct<F>(mut self, post_construct: F) -> Self
    where
        F: Fn(&mut C) -> Result<()> + Send + Sync + 'static,
    {
        self.recipe.post_construct = Some(Box::new(post_construct));
        self
    }

    pub fn pre_destroy<F>(mut self, pre_destroy: F) -> Self
    where
        F: Fn(&C) + Send + Sync + 'static,
    {
        self.recipe.pre_destroy = Some(Arc::new(pre_destroy));
        self
    }

    /// Declares the bean under type `U`, usually a trait object:
    /// `.provides(|bean| bean as Arc<dyn Task>)`.
    pub fn provides<U, F>(self, upcast: F) -> BeanDefinitionBuilder<C, U>
    where
        U: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<C>) -> Arc<U> + Send + Sync + 'static,
    {
        let Self {
            name,
            scope,
            lazy,
            order,
            qualifier,
            primary,
            depends_on,
            dependencies,
            recipe,
        } = self;

        BeanDefinitionBuilder {
            name,
            scope,
            lazy,
            order,
            qualifier,
            primary,
            depends_on,
            dependencies,
            recipe: TypedRecipe {
                constructor: recipe.constructor,
                setters: recipe.setters,
                post_construct: recipe.post_construct,
                pre_destroy: recipe.pre_destroy,
                upcast: Box::new(upcast),
            },
        }
    }

    pub fn build(self) -> BeanDefinition {
        let type_key = TypeKey::of::<T>();
        let concrete_type = type_name::<C>();

        debug!(
            "definition of bean {} type name:{} id:{:?}",
            self.name,
            type_key.name(),
            type_key.type_id()
        );

        BeanDefinition {
            name: self.name,
            type_key,
            concrete_type,
            scope: self.scope,
            lazy: self.lazy,
            order: self.order,
            qualifier: self.qualifier,
            primary: self.primary,
            depends_on: self.depends_on,
            dependencies: self.dependencies,
            recipe: Arc::new(self.recipe),
        }
    }
}

/// A type that knows how to describe itself as a bean, usually through `#[derive(Bean)]`.
pub trait Bean: Sized + Send + Sync + 'static {
    fn name() -> &'static str {
        type_name::<Self>()
    }

    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn definition() -> BeanDefinition;
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {
        fn sides(&self) -> usize;
    }

    struct Square;

    impl Shape for Square {
        fn sides(&self) -> usize {
            4
        }
    }

    struct A(usize);

    impl Bean for A {
        fn definition() -> BeanDefinition {
            BeanDefinition::builder(Self::name(), |_| Ok(A(1))).build()
        }
    }

    #[test]
    fn it_works() {
        let definition = A::definition();
        assert_eq!(definition.name(), "beanbag_core::bean::tests::A");
        assert_eq!(definition.type_key(), TypeKey::of::<A>());
        assert_eq!(definition.concrete_type_name(), type_name::<A>());
        assert_eq!(definition.scope(), Scope::Singleton);
        assert!(!definition.is_lazy());
        assert!(!definition.has_post_construct());
    }

    #[test]
    fn provides_changes_declared_type() {
        let definition = BeanDefinition::builder("square", |_| Ok(Square))
            .provides(|bean| bean as Arc<dyn Shape>)
            .build();

        assert_eq!(definition.type_key(), TypeKey::of::<dyn Shape>());
        assert_eq!(definition.concrete_type_name(), type_name::<Square>());

        let published = definition
            .recipe
            .publish(Box::new(Square))
            .expect("publish");
        let shape = published
            .bean
            .downcast_ref::<Arc<dyn Shape>>()
            .expect("declared type");
        assert_eq!(shape.sides(), 4);
        assert!(published.teardown.is_none());
    }

    #[test]
    fn pre_destroy_becomes_teardown_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DESTROYED: AtomicUsize = AtomicUsize::new(0);

        let definition = BeanDefinition::builder("a", |_| Ok(A(7)))
            .pre_destroy(|a: &A| {
                DESTROYED.fetch_add(a.0, Ordering::SeqCst);
            })
            .build();

        let published = definition.recipe.publish(Box::new(A(7))).expect("publish");
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 0);
        (published.teardown.expect("hook"))();
        assert_eq!(DESTROYED.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn display_lists_metadata() {
        let definition = BeanDefinition::builder("task_a", |_| Ok(Square))
            .provides(|bean| bean as Arc<dyn Shape>)
            .lazy()
            .order(2)
            .qualifier("four")
            .depends_on("task_b")
            .dependency(Dependency::all::<dyn Shape>())
            .pre_destroy(|_| {})
            .build();

        let text = definition.to_string();
        assert!(text.contains("scope=singleton"));
        assert!(text.contains("lazy=true"));
        assert!(text.contains("order=2"));
        assert!(text.contains("qualifier=four"));
        assert!(text.contains("depends_on=[\"task_b\"]"));
        assert!(text.contains("pre_destroy"));
        assert!(!text.contains("post_construct"));
    }

    #[test]
    fn dependency_display() {
        assert_eq!(Dependency::of::<String>().to_string(), "alloc::string::String");
        assert_eq!(
            Dependency::named::<String>("message").by_setter().to_string(),
            "alloc::string::String 'message' (setter)"
        );
    }
}
