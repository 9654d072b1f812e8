//! Derive macro for `secretfill::Secrets`.
//!
//! ```ignore
//! #[derive(Secrets)]
//! struct Config {
//!     #[secret("awssm://prod/db#password")]
//!     db_password: String,
//!     #[secret(nested)]
//!     redis: RedisConfig,
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{
    parse_macro_input, Data, DeriveInput, Fields, GenericArgument, LitStr, PathArguments, Type,
};

#[proc_macro_derive(Secrets, attributes(secret))]
pub fn derive_secrets(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

enum SecretAttr {
    /// `#[secret("tag")]` — a resolvable field.
    Tag(LitStr),
    /// `#[secret(nested)]` — a subrecord to traverse.
    Nested,
}

impl Parse for SecretAttr {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.peek(LitStr) {
            return Ok(SecretAttr::Tag(input.parse()?));
        }
        let ident: syn::Ident = input.parse()?;
        if ident == "nested" {
            Ok(SecretAttr::Nested)
        } else {
            Err(syn::Error::new_spanned(
                ident,
                "expected a tag string literal or `nested`",
            ))
        }
    }
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Secrets requires named struct fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Secrets can only be derived for structs",
            ))
        }
    };

    let mut binding_stmts = Vec::new();
    let mut spec_stmts = Vec::new();

    for field in fields {
        let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("secret")) else {
            continue;
        };
        let ident = field
            .ident
            .as_ref()
            .expect("named fields always have an ident");
        let field_name = ident.to_string();

        match attr.parse_args::<SecretAttr>()? {
            SecretAttr::Tag(tag) => {
                let ty = &field.ty;
                binding_stmts.push(quote! {
                    fields.push(::secretfill::FieldBinding::new(
                        #field_name,
                        #tag,
                        &mut self.#ident,
                    ));
                });
                spec_stmts.push(quote! {
                    specs.push(::secretfill::FieldSpec {
                        name: ::secretfill::record::join_path(prefix, #field_name),
                        tag: #tag,
                        versioned: <#ty as ::secretfill::record::SlotInfo>::VERSIONED,
                    });
                });
            }
            SecretAttr::Nested => {
                let (child_ty, child_expr) = match option_inner(&field.ty) {
                    Some(inner) => (
                        inner.clone(),
                        quote! {
                            self.#ident.get_or_insert_with(::core::default::Default::default)
                        },
                    ),
                    None => (field.ty.clone(), quote! { &mut self.#ident }),
                };
                binding_stmts.push(quote! {
                    {
                        let child = #child_expr;
                        for mut binding in ::secretfill::Secrets::secret_fields(child) {
                            binding.name =
                                ::secretfill::record::join_path(#field_name, &binding.name);
                            fields.push(binding);
                        }
                    }
                });
                spec_stmts.push(quote! {
                    {
                        let child_prefix = ::secretfill::record::join_path(prefix, #field_name);
                        specs.extend(
                            <#child_ty as ::secretfill::Secrets>::field_specs(&child_prefix),
                        );
                    }
                });
            }
        }
    }

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::secretfill::Secrets for #name #ty_generics #where_clause {
            #[allow(unused_mut)]
            fn secret_fields(&mut self) -> ::std::vec::Vec<::secretfill::FieldBinding<'_>> {
                let mut fields = ::std::vec::Vec::new();
                #(#binding_stmts)*
                fields
            }

            #[allow(unused_mut, unused_variables)]
            fn field_specs(prefix: &str) -> ::std::vec::Vec<::secretfill::FieldSpec> {
                let mut specs = ::std::vec::Vec::new();
                #(#spec_stmts)*
                specs
            }
        }
    })
}

/// For `Option<T>`, the inner type `T`.
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
