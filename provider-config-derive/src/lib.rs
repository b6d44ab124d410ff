use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, ExprLit, Field, Fields, Lit, LitStr, Meta, Result,
    parse_macro_input,
};

/// Derives `provider_core::config::AuthConfig` for a struct with named fields.
///
/// Field attributes, all optional:
/// `#[auth(description = "...", hint = "...", sensitive, default = "...")]`.
/// Without a `description` the field's doc comment is used.
#[proc_macro_derive(AuthConfig, attributes(auth))]
pub fn derive_auth_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_auth_config(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_auth_config(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let fields = named_fields(input)?;

    let mut schema = Vec::with_capacity(fields.len());
    let mut extractors = Vec::with_capacity(fields.len());
    for field in fields {
        let def = AuthFieldDef::from_field(field)?;
        schema.push(def.schema_tokens());
        extractors.push(def.extract_tokens());
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::provider_core::config::AuthConfig for #name #ty_generics #where_clause {
            fn fields() -> ::std::vec::Vec<::provider_core::config::AuthField> {
                ::std::vec![#(#schema),*]
            }

            fn from_raw(
                raw: &::provider_core::config::RawConfig,
            ) -> ::core::result::Result<Self, ::provider_core::ConfigError> {
                ::core::result::Result::Ok(Self {
                    #(#extractors),*
                })
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> Result<Vec<&Field>> {
    let Data::Struct(data) = &input.data else {
        return Err(Error::new(
            Span::call_site(),
            "AuthConfig can only be derived for structs",
        ));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(Error::new_spanned(
            &input.ident,
            "AuthConfig requires a struct with named fields",
        ));
    };
    Ok(named.named.iter().collect())
}

struct AuthFieldDef<'a> {
    field: &'a Field,
    key: String,
    description: String,
    hint: Option<LitStr>,
    default: Option<LitStr>,
    sensitive: bool,
}

impl<'a> AuthFieldDef<'a> {
    fn from_field(field: &'a Field) -> Result<Self> {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new_spanned(field, "expected a named field"))?;

        let mut def = AuthFieldDef {
            field,
            key: ident.to_string(),
            description: String::new(),
            hint: None,
            default: None,
            sensitive: false,
        };

        for attr in field.attrs.iter().filter(|a| a.path().is_ident("auth")) {
            def.parse_auth_attr(attr)?;
        }
        if def.description.is_empty() {
            def.description = doc_comment(&field.attrs).unwrap_or_else(|| def.key.clone());
        }
        Ok(def)
    }

    fn parse_auth_attr(&mut self, attr: &Attribute) -> Result<()> {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("description") {
                let lit: LitStr = meta.value()?.parse()?;
                self.description = lit.value();
            } else if meta.path.is_ident("hint") {
                self.hint = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("default") {
                self.default = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("sensitive") {
                self.sensitive = true;
            } else {
                return Err(meta.error(
                    "unsupported auth attribute; expected description, hint, default, or sensitive",
                ));
            }
            Ok(())
        })
    }

    fn schema_tokens(&self) -> proc_macro2::TokenStream {
        let ty = &self.field.ty;
        let key = &self.key;
        let description = &self.description;
        let sensitive = self.sensitive;
        let hint = option_tokens(self.hint.as_ref());
        let default = option_tokens(self.default.as_ref());
        let required = if self.default.is_some() {
            quote! { false }
        } else {
            quote! { <#ty as ::provider_core::config::ConfigValue>::REQUIRED }
        };

        quote! {
            ::provider_core::config::AuthField {
                name: #key,
                description: #description,
                hint: #hint,
                required: #required,
                sensitive: #sensitive,
                kind: <#ty as ::provider_core::config::ConfigValue>::KIND,
                default: #default,
            }
        }
    }

    fn extract_tokens(&self) -> proc_macro2::TokenStream {
        let ident = &self.field.ident;
        let ty = &self.field.ty;
        let key = &self.key;
        let default = option_tokens(self.default.as_ref());

        quote! {
            #ident: ::provider_core::config::extract::<#ty>(raw, #key, #default)?
        }
    }
}

fn option_tokens(lit: Option<&LitStr>) -> proc_macro2::TokenStream {
    match lit {
        Some(lit) => quote! { ::core::option::Option::Some(#lit) },
        None => quote! { ::core::option::Option::None },
    }
}

fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines = attrs
        .iter()
        .filter(|a| a.path().is_ident("doc"))
        .filter_map(|a| match &a.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join(" "))
    }
}
