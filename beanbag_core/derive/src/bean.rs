use darling::{
    ast::{Data, Style},
    util::{Flag, Override},
    Error,
    FromDeriveInput,
    FromField,
    Result,
};
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote, ToTokens};
use syn::{GenericArgument, Index, Member, Path, PathArguments, Type};

pub(crate) fn resolve_bean_crate(bean_crate: &Option<Path>) -> Result<TokenStream> {
    if let Some(bean_crate) = bean_crate {
        return Ok(quote! { #bean_crate });
    }

    use proc_macro_crate::{crate_name, FoundCrate};
    match crate_name("beanbag").or_else(|_| crate_name("beanbag_core")) {
        Ok(FoundCrate::Itself) => Ok(quote! { ::beanbag }),
        Ok(FoundCrate::Name(name)) => {
            let ident = format_ident!("{}", name);
            Ok(quote! { ::#ident })
        }
        Err(err) => Err(Error::custom(err)),
    }
}

/// `GreetingService` -> `greeting_service`
pub(crate) fn snake_case(ident: &str) -> String {
    let mut name = String::with_capacity(ident.len() + 4);
    let mut prev_lower = false;
    for c in ident.chars() {
        if c.is_uppercase() {
            if prev_lower {
                name.push('_');
            }
            name.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            name.push(c);
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    name
}

/// Inner type of `Wrapper<T>`, matched on the last path segment.
fn unwrap_type<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn unwrap_types<'a>(ty: &'a Type, wrappers: &[&str]) -> Result<&'a Type> {
    let mut current = ty;
    for wrapper in wrappers {
        current = unwrap_type(current, wrapper).ok_or_else(|| {
            let expected = wrappers
                .iter()
                .rev()
                .fold("T".to_string(), |inner, w| format!("{w}<{inner}>"));
            Error::custom(format!("injected field must be of type `{expected}`")).with_span(ty)
        })?;
    }
    Ok(current)
}

#[derive(Debug, Clone, PartialEq)]
enum Lookup {
    Type,
    Qualified(String),
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Inject {
    Bean(Lookup),
    All,
    Config(String),
    BeanName,
    Default,
    Setter(Lookup),
}

#[derive(Debug, FromField)]
#[darling(attributes(inject))]
pub struct BeanField {
    ty: Type,
    ident: Option<Ident>,
    #[darling(default)]
    bean: Flag,
    #[darling(default)]
    qualifier: Option<String>,
    #[darling(default)]
    named: Option<Override<String>>,
    #[darling(default)]
    all: Flag,
    #[darling(default)]
    config: Option<String>,
    #[darling(default)]
    bean_name: Flag,
    #[darling(default)]
    default: Flag,
    #[darling(default)]
    setter: Flag,
}

impl BeanField {
    fn inject(&self) -> Result<Inject> {
        let lookup = match (&self.qualifier, &self.named) {
            (Some(_), Some(_)) => {
                return Err(Error::custom("`qualifier` and `named` can not be used together")
                    .with_span(&self.ty));
            }
            (Some(qualifier), None) => Some(Lookup::Qualified(qualifier.clone())),
            (None, Some(Override::Explicit(name))) => Some(Lookup::Named(name.clone())),
            (None, Some(Override::Inherit)) => match &self.ident {
                Some(ident) => Some(Lookup::Named(ident.to_string())),
                None => {
                    return Err(Error::custom("`named` of a tuple field needs a value")
                        .with_span(&self.ty));
                }
            },
            (None, None) if self.bean.is_present() || self.setter.is_present() => {
                Some(Lookup::Type)
            }
            (None, None) => None,
        };

        let others = [
            self.all.is_present(),
            self.config.is_some(),
            self.bean_name.is_present(),
            self.default.is_present(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        if others > 1 || (others == 1 && lookup.is_some()) {
            return Err(Error::custom("conflicting inject attributes").with_span(&self.ty));
        }

        let inject = match lookup {
            Some(lookup) if self.setter.is_present() => Inject::Setter(lookup),
            Some(lookup) => Inject::Bean(lookup),
            None if self.all.is_present() => Inject::All,
            None if self.bean_name.is_present() => Inject::BeanName,
            None => match &self.config {
                Some(key) => Inject::Config(key.clone()),
                None => Inject::Default,
            },
        };
        Ok(inject)
    }
}

fn lookup_call(lookup: &Lookup, ty: &Type) -> TokenStream {
    match lookup {
        Lookup::Type => quote! { ctx.get::<#ty>()? },
        Lookup::Qualified(qualifier) => quote! { ctx.get_qualified::<#ty>(#qualifier)? },
        Lookup::Named(name) => quote! { ctx.get_named::<#ty>(#name)? },
    }
}

fn lookup_dependency(lookup: &Lookup, ty: &Type, ioc: &TokenStream) -> TokenStream {
    match lookup {
        Lookup::Type => quote! { #ioc::Dependency::of::<#ty>() },
        Lookup::Qualified(qualifier) => quote! { #ioc::Dependency::qualified::<#ty>(#qualifier) },
        Lookup::Named(name) => quote! { #ioc::Dependency::named::<#ty>(#name) },
    }
}

/// Everything generated for one field.
struct FieldInjection {
    initializer: TokenStream,
    setter: Option<TokenStream>,
    dependency: Option<TokenStream>,
}

fn field_injection(field: &BeanField, member: Member, ioc: &TokenStream) -> Result<FieldInjection> {
    let ty = &field.ty;
    let injection = match field.inject()? {
        Inject::Bean(lookup) => {
            let bean_ty = unwrap_types(ty, &["Arc"])?;
            FieldInjection {
                initializer: lookup_call(&lookup, bean_ty),
                setter: None,
                dependency: Some(lookup_dependency(&lookup, bean_ty, ioc)),
            }
        }
        Inject::All => {
            let bean_ty = unwrap_types(ty, &["Vec", "Arc"])?;
            FieldInjection {
                initializer: quote! { ctx.get_all::<#bean_ty>()? },
                setter: None,
                dependency: Some(quote! { #ioc::Dependency::all::<#bean_ty>() }),
            }
        }
        Inject::Config(key) => FieldInjection {
            initializer: quote! { ctx.get_config::<_>(#key)? },
            setter: None,
            dependency: None,
        },
        Inject::BeanName => FieldInjection {
            initializer: quote! { ::std::string::ToString::to_string(ctx.bean_name()) },
            setter: None,
            dependency: None,
        },
        Inject::Default => FieldInjection {
            initializer: quote! { ::std::default::Default::default() },
            setter: None,
            dependency: None,
        },
        Inject::Setter(lookup) => {
            let bean_ty = unwrap_types(ty, &["Option", "Arc"])?;
            let call = lookup_call(&lookup, bean_ty);
            let dependency = lookup_dependency(&lookup, bean_ty, ioc);
            FieldInjection {
                initializer: quote! { ::std::option::Option::None },
                setter: Some(quote! {
                    .setter(|bean, ctx| {
                        bean.#member = ::std::option::Option::Some(#call);
                        Ok(())
                    })
                }),
                dependency: Some(quote! { #dependency.by_setter() }),
            }
        }
    };
    Ok(injection)
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(bean), supports(struct_any))]
pub(crate) struct BeanSpecStruct {
    /// The struct ident.
    ident: Ident,

    /// Receives the body of the struct. Enums are rejected by `supports`.
    data: Data<(), BeanField>,

    #[darling(default)]
    name: Option<String>,
    #[darling(default)]
    prototype: Flag,
    #[darling(default)]
    lazy: Flag,
    #[darling(default)]
    primary: Flag,
    #[darling(default)]
    order: Option<i32>,
    #[darling(default)]
    qualifier: Option<String>,
    #[darling(multiple)]
    depends_on: Vec<String>,
    #[darling(default)]
    provides: Option<Type>,
    #[darling(default)]
    post_construct: Option<Ident>,
    #[darling(default)]
    pre_destroy: Option<Ident>,
    #[darling(default)]
    bean_crate: Option<Path>,
}

impl BeanSpecStruct {
    pub(crate) fn bean_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => snake_case(&self.ident.to_string()),
        }
    }

    pub(crate) fn generate(&self) -> Result<TokenStream> {
        let ident = &self.ident;
        let ioc = resolve_bean_crate(&self.bean_crate)?;
        let name = self.bean_name();

        let fields = self
            .data
            .as_ref()
            .take_struct()
            .ok_or_else(|| Error::unsupported_shape("only struct is supported").with_span(ident))?;

        let mut initializers = Vec::with_capacity(fields.len());
        let mut uses_ctx = false;
        let mut setters = Vec::new();
        let mut dependencies = Vec::new();
        for (idx, field) in fields.iter().enumerate() {
            let member = match &field.ident {
                Some(field_name) => Member::Named(field_name.clone()),
                None => Member::Unnamed(Index::from(idx)),
            };
            let FieldInjection {
                initializer,
                setter,
                dependency,
            } = field_injection(field, member, &ioc)?;
            uses_ctx |= setter.is_none() && field.inject()? != Inject::Default;

            match &field.ident {
                Some(field_name) => initializers.push(quote! { #field_name: #initializer }),
                None => initializers.push(initializer),
            }
            setters.extend(setter);
            dependencies.extend(dependency);
        }

        let ctx = if uses_ctx {
            format_ident!("ctx")
        } else {
            format_ident!("_ctx")
        };

        let construct = match fields.style {
            Style::Tuple => quote! { Self( #(#initializers),* ) },
            Style::Struct => quote! { Self { #(#initializers),* } },
            Style::Unit => quote! { Self },
        };

        let mut options = TokenStream::new();
        options.extend(setters);
        for dependency in dependencies.iter() {
            options.extend(quote! { .dependency(#dependency) });
        }
        if self.prototype.is_present() {
            options.extend(quote! { .prototype() });
        }
        if self.lazy.is_present() {
            options.extend(quote! { .lazy() });
        }
        if self.primary.is_present() {
            options.extend(quote! { .primary() });
        }
        if let Some(order) = self.order {
            options.extend(quote! { .order(#order) });
        }
        if let Some(qualifier) = &self.qualifier {
            options.extend(quote! { .qualifier(#qualifier) });
        }
        for depends_on in self.depends_on.iter() {
            options.extend(quote! { .depends_on(#depends_on) });
        }
        if let Some(method) = &self.post_construct {
            options.extend(quote! {
                .post_construct(|bean| {
                    bean.#method()?;
                    Ok(())
                })
            });
        }
        if let Some(method) = &self.pre_destroy {
            options.extend(quote! { .pre_destroy(|bean| bean.#method()) });
        }
        if let Some(provides) = &self.provides {
            options.extend(quote! {
                .provides(|bean| bean as ::std::sync::Arc<#provides>)
            });
        }

        Ok(quote! {
            impl #ioc::Bean for #ident {
                fn name() -> &'static str {
                    #name
                }

                fn dependencies() -> ::std::vec::Vec<#ioc::Dependency> {
                    ::std::vec![#(#dependencies),*]
                }

                fn definition() -> #ioc::BeanDefinition {
                    #ioc::BeanDefinition::builder(<Self as #ioc::Bean>::name(), |#ctx| {
                        Ok(#construct)
                    })
                    #options
                    .build()
                }
            }
        })
    }
}

impl ToTokens for BeanSpecStruct {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        match self.generate() {
            Ok(tt) => {
                tokens.extend(tt);
            }
            Err(err) => {
                tokens.extend(err.write_errors());
            }
        }
    }
}
