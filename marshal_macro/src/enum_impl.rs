use crate::{bounded, options};
use quote::quote;
use syn::*;

/// Enums whose variants are all units are written as the variant name.
pub fn describe(ast: &DeriveInput, data: &DataEnum) -> Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let generics = bounded(&ast.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let this = quote! { #name #ty_generics };

    if data.variants.is_empty() {
        return Err(Error::new_spanned(name, "enums without variants cannot derive `Describe`"));
    }

    let mut variants = Vec::new();
    let mut texts = Vec::new();
    for variant in data.variants.iter() {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(Error::new_spanned(
                variant,
                "only enums whose variants have no fields can derive `Describe`",
            ));
        }
        let text = options(&variant.attrs)?
            .rename
            .unwrap_or_else(|| variant.ident.to_string());
        variants.push(&variant.ident);
        texts.push(text);
    }

    let expected = texts.join("`, `");
    Ok(quote! {
        impl #impl_generics ::marshal::Describe for #this #where_clause {
            fn describe() -> ::marshal::descriptor::TypeDescriptor {
                ::marshal::descriptor::DescriptorBuilder::<#this>::new()
                    .text(
                        |v| match v {
                            #(#name::#variants => #texts,)*
                        }
                        .to_owned(),
                        |s| match s {
                            #(#texts => Ok(#name::#variants),)*
                            unknown => Err(format!("`{}` is not one of `{}`", unknown, #expected)),
                        },
                    )
                    .finish()
            }
        }
    })
}
