//! Parsing of `#[sift(...)]` field attributes.

use proc_macro2::Span;
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    spanned::Spanned,
    Attribute, Error, Ident, Lit, Meta, Result, Token,
};

/// The member kind of an annotated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    String,
    Number,
    Bool,
    Record,
}

impl MemberKind {
    pub fn from_ident(ident: &Ident) -> Result<Self> {
        match ident.to_string().as_str() {
            "String" | "string" => Ok(MemberKind::String),
            "Number" | "number" => Ok(MemberKind::Number),
            "Bool" | "boolean" => Ok(MemberKind::Bool),
            "Record" | "record" => Ok(MemberKind::Record),
            other => Err(Error::new(
                ident.span(),
                format!(
                    "unknown sift kind: '{}'. Expected one of: String, Number, Bool, Record",
                    other
                ),
            )),
        }
    }
}

/// Field-level attributes from `#[sift(...)]`.
#[derive(Debug, Clone)]
pub struct SiftAttr {
    pub kind: Option<MemberKind>,
    pub nullable: bool,
    pub skip: bool,
    /// Member name used in expressions (default: field name).
    pub rename: Option<String>,
    pub span: Span,
}

impl Default for SiftAttr {
    fn default() -> Self {
        SiftAttr {
            kind: None,
            nullable: false,
            skip: false,
            rename: None,
            span: Span::call_site(),
        }
    }
}

impl Parse for SiftAttr {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut attr = SiftAttr::default();

        let content: Punctuated<Meta, Token![,]> = Punctuated::parse_terminated(input)?;

        for meta in content {
            match &meta {
                Meta::Path(p) => {
                    if p.is_ident("skip") {
                        attr.skip = true;
                    } else if p.is_ident("nullable") {
                        attr.nullable = true;
                    } else if let Some(ident) = p.get_ident() {
                        if attr.kind.is_some() {
                            return Err(Error::new(ident.span(), "duplicate sift kind"));
                        }
                        attr.kind = Some(MemberKind::from_ident(ident)?);
                        attr.span = ident.span();
                    } else {
                        return Err(Error::new(
                            p.span(),
                            "expected sift kind: String, Number, Bool, Record, nullable, or skip",
                        ));
                    }
                }

                Meta::NameValue(nv) if nv.path.is_ident("rename") => {
                    if let syn::Expr::Lit(syn::ExprLit {
                        lit: Lit::Str(s), ..
                    }) = &nv.value
                    {
                        attr.rename = Some(s.value());
                    } else {
                        return Err(Error::new(
                            nv.value.span(),
                            "rename must be a string literal",
                        ));
                    }
                }

                _ => {
                    return Err(Error::new(
                        meta.span(),
                        "unknown sift attribute. Expected: String, Number, Bool, Record, nullable, skip, or rename = \"...\"",
                    ));
                }
            }
        }

        if attr.nullable && attr.kind.is_none() && !attr.skip {
            return Err(Error::new(
                input.span(),
                "nullable needs a kind, e.g. #[sift(String, nullable)]",
            ));
        }

        Ok(attr)
    }
}

/// Extracts `#[sift(...)]` from a field's attributes.
pub fn parse_sift_attrs(attrs: &[Attribute]) -> Result<SiftAttr> {
    for attr in attrs {
        if attr.path().is_ident("sift") {
            return attr.parse_args::<SiftAttr>();
        }
    }
    Ok(SiftAttr::default())
}
