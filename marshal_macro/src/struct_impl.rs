use crate::{bounded, options};
use quote::quote;
use syn::{ext::IdentExt, *};

pub fn describe(ast: &DeriveInput, data: &DataStruct) -> Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let ident_string = name.to_string();
    let generics = bounded(&ast.generics);
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let this = quote! { #name #ty_generics };

    let body = match &data.fields {
        // C-style structs
        Fields::Named(fields) => {
            let mut props = Vec::new();
            for field in fields.named.iter() {
                let opts = options(&field.attrs)?;
                if opts.ignore {
                    continue;
                }
                let ident = field.ident.as_ref().ok_or_else(|| Error::new_spanned(field, "unnamed field"))?;
                let ty = &field.ty;
                let key = opts.rename.unwrap_or_else(|| ident.unraw().to_string());
                let required = if opts.required {
                    quote! { .required() }
                } else {
                    quote! {}
                };
                let id = if opts.id {
                    quote! { .identity() }
                } else {
                    quote! {}
                };
                props.push(quote! {
                    .property::<#ty>(#key, |v| &v.#ident, |v, x| v.#ident = x) #required #id
                });
            }
            quote! {
                #(#props)*
                .constructor(<#this as ::std::default::Default>::default)
            }
        }
        // Tuple structs
        Fields::Unnamed(fields) => {
            if fields.unnamed.len() != 1 {
                return Err(Error::new_spanned(
                    name,
                    "only tuple structs with exactly one field can derive `Describe`",
                ));
            }
            let ty = &fields.unnamed[0].ty;
            quote! {
                .pointer::<#ty>(|v| &v.0, #name)
            }
        }
        // Unit-like structs
        Fields::Unit => {
            let text = options(&ast.attrs)?.rename.unwrap_or_else(|| ident_string.clone());
            quote! {
                .text(
                    |_| #text.to_owned(),
                    |s| if s == #text {
                        Ok(#name)
                    } else {
                        Err(format!("`{}` is not `{}`", s, #text))
                    },
                )
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::marshal::Describe for #this #where_clause {
            fn describe() -> ::marshal::descriptor::TypeDescriptor {
                ::marshal::descriptor::DescriptorBuilder::<#this>::new()
                    #body
                    .finish()
            }
        }
    })
}
