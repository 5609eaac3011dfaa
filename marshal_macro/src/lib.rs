#![recursion_limit = "128"]

extern crate proc_macro;
extern crate proc_macro2;

/// Support for enum auto-derive.
mod enum_impl;
/// Support for struct auto-derive.
mod struct_impl;

use proc_macro::TokenStream;
use syn::*;

/// Derives `marshal::Describe`.
///
/// - Structs with named fields become records. They must implement `Default`, which
///   parsing starts from.
/// - Tuple structs with one field are transparent: they are written as their field.
/// - Unit structs and enums whose variants are all units are written as their name.
///
/// Fields and variants take `#[marshal(rename = "name")]`. Fields also take
/// `#[marshal(ignore)]`, `#[marshal(required)]` and `#[marshal(id)]`.
#[proc_macro_derive(Describe, attributes(marshal))]
pub fn describe_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    impl_describe(&ast).unwrap_or_else(Error::into_compile_error).into()
}

fn impl_describe(ast: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    match &ast.data {
        Data::Struct(sd) => struct_impl::describe(ast, sd),
        Data::Enum(ed) => enum_impl::describe(ast, ed),
        Data::Union(_) => Err(Error::new_spanned(&ast.ident, "unions cannot derive `Describe`")),
    }
}

#[derive(Default)]
/// What `#[marshal(...)]` says about a field or variant.
pub(crate) struct Options {
    pub rename: Option<String>,
    pub ignore: bool,
    pub required: bool,
    pub id: bool,
}

pub(crate) fn options(attrs: &[Attribute]) -> Result<Options> {
    let mut opts = Options::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("marshal")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let name: LitStr = meta.value()?.parse()?;
                opts.rename = Some(name.value());
            } else if meta.path.is_ident("ignore") {
                opts.ignore = true;
            } else if meta.path.is_ident("required") {
                opts.required = true;
            } else if meta.path.is_ident("id") {
                opts.id = true;
            } else {
                return Err(meta.error("expected `rename`, `ignore`, `required` or `id`"));
            }
            Ok(())
        })?;
    }
    Ok(opts)
}

/// Adds a `Describe` bound to every type parameter.
pub(crate) fn bounded(generics: &Generics) -> Generics {
    let mut generics = generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::marshal::Describe));
    }
    generics
}
