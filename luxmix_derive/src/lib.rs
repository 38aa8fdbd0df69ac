extern crate quote;
extern crate syn;

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use syn::{
    parse::Parser, punctuated::Punctuated, spanned::Spanned, Attribute, Field, FieldsNamed, LitStr,
    Token,
};
use syn::{Data, DeriveInput, Fields};

/// Derives the `Params` trait for a struct of `f64` parameter fields.
///
/// Every field tagged `#[param("name", "description")]` becomes addressable
/// by name through `set`/`state`, and contributes an entry to the static
/// schema. Untagged fields are ignored.
#[proc_macro_derive(Params, attributes(param))]
pub fn params_macro_derive(input: TokenStream) -> TokenStream {
    let ast: DeriveInput = syn::parse(input).unwrap();

    impl_params_macro(&ast)
}

fn unwrap_attr(attrs: &[Attribute], ident: &str) -> Option<TokenStream2> {
    attrs
        .iter()
        .find(|attr| attr.path.is_ident(ident))
        .map(|attr| {
            attr.tokens
                .clone()
                .into_iter()
                .map(|token| match token {
                    proc_macro2::TokenTree::Group(group) => group.stream(),
                    _ => unimplemented!(),
                })
                .next()
                .unwrap()
        })
}

fn unwrap_name_description(attrs: &[Attribute], ident: &str) -> (Option<LitStr>, Option<LitStr>) {
    let attr = unwrap_attr(attrs, ident)
        .map(|tokens| {
            Punctuated::<LitStr, Token![,]>::parse_terminated
                .parse2(tokens)
                .unwrap()
        })
        .unwrap_or_default();
    let mut iter = attr.iter();
    let name = iter.next().cloned();
    let description = iter.next().cloned();
    (name, description)
}

fn map_name_description<F, B>(fields: &FieldsNamed, ident: &str, mut closure: F) -> Vec<B>
where
    F: FnMut(&Field, Option<syn::Ident>, Option<LitStr>, Option<LitStr>) -> B,
{
    fields
        .named
        .iter()
        .filter(|f| f.attrs.iter().any(|attr| attr.path.is_ident(ident)))
        .map(|f| {
            let f_name = &f.ident;
            let (name, description) = unwrap_name_description(&f.attrs, ident);
            closure(f, f_name.clone(), name, description)
        })
        .collect()
}

fn impl_params_macro(ast: &DeriveInput) -> TokenStream {
    let struct_name = &ast.ident;
    let (states, setters, schemas) = match ast.data {
        Data::Struct(ref data) => match data.fields {
            Fields::Named(ref fields) => {
                let v = map_name_description(fields, "param", |f, f_name, name, description| {
                    (
                        quote_spanned! {f.span()=>
                            (#name, self.#f_name),
                        },
                        quote_spanned! {f.span()=>
                            #name => {
                                self.#f_name = value;
                                Ok(())
                            }
                        },
                        quote_spanned! {f.span()=>
                            crate::types::ParamSchema {
                                name: #name,
                                description: #description,
                            },
                        },
                    )
                });
                let state_iter = v.iter().map(|(state, _, _)| state);
                let setter_iter = v.iter().map(|(_, setter, _)| setter);
                let schema_iter = v.iter().map(|(_, _, schema)| schema);
                (
                    quote! { #(#state_iter)* },
                    quote! { #(#setter_iter)* },
                    quote! { #(#schema_iter)* },
                )
            }
            Fields::Unnamed(_) | Fields::Unit => unimplemented!(),
        },
        Data::Enum(_) | Data::Union(_) => unimplemented!(),
    };

    let gen = quote! {
        impl crate::types::Params for #struct_name {
            fn state(&self) -> Vec<(&'static str, f64)> {
                vec![
                    #states
                ]
            }
            fn set(&mut self, param_name: &str, value: f64, source_name: &str) -> anyhow::Result<()> {
                match param_name {
                    #setters
                    _ => Err(anyhow::anyhow!(
                        "{} is not a valid param name for {}",
                        param_name,
                        source_name
                    )),
                }
            }
            fn schema() -> &'static [crate::types::ParamSchema] {
                &[
                    #schemas
                ]
            }
        }
    };
    gen.into()
}
