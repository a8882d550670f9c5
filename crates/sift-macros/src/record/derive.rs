//! Code generation for `#[derive(Record)]`.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    spanned::Spanned, Data, DeriveInput, Error, Fields, GenericArgument, PathArguments, Result,
    Type,
};

use super::attrs::{parse_sift_attrs, MemberKind};

pub fn record_derive_impl(input: DeriveInput) -> Result<TokenStream> {
    let struct_name = &input.ident;
    let type_name = struct_name.to_string();

    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new(
                    input.span(),
                    "Record can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                input.span(),
                "Record can only be derived for structs",
            ))
        }
    };

    let mut field_matches: Vec<TokenStream> = Vec::new();
    let mut field_constants: Vec<TokenStream> = Vec::new();
    let mut field_defs: Vec<TokenStream> = Vec::new();

    for field in fields.iter() {
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "expected named field"))?;

        let attrs = parse_sift_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let kind = match attrs.kind {
            Some(k) => k,
            None => continue,
        };

        let member = attrs.rename.unwrap_or_else(|| field_name.to_string());
        let const_name = format_ident!("{}", to_screaming_snake_case(&member));

        field_constants.push(quote! {
            /// Member name for filter expressions.
            pub const #const_name: &'static str = #member;
        });

        // Type the member's schema is looked up on, for nested records.
        let value_ty = if attrs.nullable {
            option_inner(&field.ty).ok_or_else(|| {
                Error::new(field.ty.span(), "nullable fields must be declared as Option<_>")
            })?
        } else {
            &field.ty
        };

        let read = convert(kind, quote! { value });
        let value_expr = if attrs.nullable {
            quote! {
                match &self.#field_name {
                    ::std::option::Option::Some(value) => #read,
                    ::std::option::Option::None => ::sift::Value::Null,
                }
            }
        } else {
            quote! {
                {
                    let value = &self.#field_name;
                    #read
                }
            }
        };

        field_matches.push(quote! {
            #member => ::std::option::Option::Some(#value_expr),
        });

        let kind_expr = match kind {
            MemberKind::String => quote! { ::sift::FieldKind::String },
            MemberKind::Number => quote! { ::sift::FieldKind::Number },
            MemberKind::Bool => quote! { ::sift::FieldKind::Bool },
            MemberKind::Record => {
                quote! { ::sift::FieldKind::Record(<#value_ty as ::sift::Described>::schema) }
            }
        };
        field_defs.push(quote! {
            ::sift::FieldDef { name: #member, kind: #kind_expr },
        });
    }

    let expanded = quote! {
        impl #struct_name {
            #(#field_constants)*
        }

        impl ::sift::Record for #struct_name {
            fn value(&self) -> ::sift::Value<'_> {
                ::sift::Value::Record(self)
            }

            fn field_value(&self, name: &str) -> ::std::option::Option<::sift::Value<'_>> {
                match name {
                    #(#field_matches)*
                    _ => ::std::option::Option::None,
                }
            }

            fn type_label(&self) -> &'static str {
                #type_name
            }
        }

        impl ::sift::Described for #struct_name {
            fn schema() -> &'static ::sift::Schema {
                static SCHEMA: ::sift::Schema = ::sift::Schema {
                    name: #type_name,
                    fields: &[#(#field_defs)*],
                };
                &SCHEMA
            }
        }
    };

    Ok(expanded)
}

/// Converts a reference to the field (`value`) into a `sift::Value`.
fn convert(kind: MemberKind, value: TokenStream) -> TokenStream {
    match kind {
        MemberKind::String => quote! {
            ::sift::Value::Str(::std::borrow::Cow::Borrowed(
                ::std::convert::AsRef::<str>::as_ref(#value)
            ))
        },
        MemberKind::Number => quote! {
            ::sift::Value::Number(::sift::Number::from(*#value))
        },
        MemberKind::Bool => quote! { ::sift::Value::Bool(*#value) },
        MemberKind::Record => quote! { ::sift::Value::Record(#value) },
    }
}

/// Returns `T` for a field declared as `Option<T>`.
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
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// Convert a string to SCREAMING_SNAKE_CASE.
fn to_screaming_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_was_lower = false;

    for c in s.chars() {
        if c.is_uppercase() {
            if prev_was_lower {
                result.push('_');
            }
            result.push(c);
            prev_was_lower = false;
        } else if c == '_' || c == '-' || c == '.' {
            result.push('_');
            prev_was_lower = false;
        } else {
            result.push(c.to_ascii_uppercase());
            prev_was_lower = true;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screaming_snake_case() {
        assert_eq!(to_screaming_snake_case("name"), "NAME");
        assert_eq!(to_screaming_snake_case("created_at"), "CREATED_AT");
        assert_eq!(to_screaming_snake_case("dueDate"), "DUE_DATE");
        assert_eq!(to_screaming_snake_case("my-field"), "MY_FIELD");
    }

    #[test]
    fn test_option_inner() {
        let ty: Type = syn::parse_str("Option<String>").unwrap();
        let inner = option_inner(&ty).unwrap();
        assert_eq!(quote!(#inner).to_string(), "String");

        let plain: Type = syn::parse_str("String").unwrap();
        assert!(option_inner(&plain).is_none());
    }

    #[test]
    fn test_rejects_enums() {
        let input: DeriveInput = syn::parse_str("enum Status { Open, Closed }").unwrap();
        assert!(record_derive_impl(input).is_err());
    }

    #[test]
    fn test_rejects_generics() {
        let input: DeriveInput = syn::parse_str("struct Wrapper<T> { inner: T }").unwrap();
        assert!(record_derive_impl(input).is_err());
    }

    #[test]
    fn test_unannotated_fields_are_hidden() {
        let input: DeriveInput = syn::parse_str(
            r#"struct Task { #[sift(String)] name: String, secret: u64 }"#,
        )
        .unwrap();
        let out = record_derive_impl(input).unwrap().to_string();
        assert!(out.contains("NAME"));
        assert!(!out.contains("SECRET"));
    }

    #[test]
    fn test_nullable_requires_option() {
        let input: DeriveInput = syn::parse_str(
            r#"struct Task { #[sift(String, nullable)] owner: String }"#,
        )
        .unwrap();
        assert!(record_derive_impl(input).is_err());
    }
}
