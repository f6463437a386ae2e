use proc_macro::TokenStream;

use darling::FromDeriveInput;
use quote::ToTokens;
use syn::{parse_macro_input, DeriveInput};

use bean::BeanSpecStruct;

mod bean;

/// Implements `beanbag::Bean` for a struct.
///
/// Struct attributes go in `#[bean(..)]`: `name`, `prototype`, `lazy`, `primary`, `order`,
/// `qualifier`, `depends_on` (repeatable), `provides = "dyn Trait"`,
/// `post_construct = "method"`, `pre_destroy = "method"` and `bean_crate = "path"`.
///
/// Field attributes go in `#[inject(..)]`: `bean`, `qualifier = ".."`, `named` or
/// `named = ".."`, `all`, `config = "key"`, `bean_name`, `default` and `setter`.
/// Fields without one are `Default::default()`.
#[proc_macro_derive(Bean, attributes(inject, bean))]
pub fn bean_definition(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match BeanSpecStruct::from_derive_input(&input) {
        Ok(bean_struct) => bean_struct.into_token_stream().into(),
        Err(err) => err.write_errors().into(),
    }
}
