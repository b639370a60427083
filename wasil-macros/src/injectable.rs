//! Implementation of #[derive(Injectable)] proc-macro.

use darling::ast::{Data, Style};
use darling::util::Override;
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, GenericArgument, Ident, Lit, PathArguments, Type, parse_macro_input};

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), supports(struct_named, struct_unit))]
struct InjectableInput {
    ident: Ident,
    generics: syn::Generics,
    data: Data<(), InjectField>,
    #[darling(default)]
    id: Option<String>,
    #[darling(default)]
    custom_service: bool,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<Ident>,
    ty: Type,
    vis: syn::Visibility,
    #[darling(default)]
    service: Option<Override<String>>,
    #[darling(default)]
    default: Option<Lit>,
    #[darling(default)]
    config: bool,
    #[darling(default)]
    property: bool,
}

pub fn derive_injectable_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.write_errors().into(),
    }
}

fn expand(input: &DeriveInput) -> darling::Result<TokenStream2> {
    let parsed = InjectableInput::from_derive_input(input)?;
    let name = &parsed.ident;

    if !parsed.generics.params.is_empty() {
        return Err(
            darling::Error::custom("Injectable cannot be derived for generic structs")
                .with_span(&parsed.generics),
        );
    }

    let fields = match &parsed.data {
        Data::Struct(fields) => fields,
        Data::Enum(_) => {
            return Err(darling::Error::custom("Injectable can only be derived for structs")
                .with_span(name));
        }
    };

    let mut errors = darling::Error::accumulator();
    let mut params = Vec::new();
    let mut inits = Vec::new();
    let mut slots = Vec::new();
    let mut config_index = None;

    for field in fields.iter() {
        let Some(ident) = &field.ident else { continue };
        let label = ident.to_string().trim_start_matches("r#").to_string();

        if field.property {
            if field.config {
                errors.push(
                    darling::Error::custom("`config` cannot be combined with `property`")
                        .with_span(ident),
                );
                continue;
            }
            if let Some(slot) = errors.handle(property_slot(field, ident, &label)) {
                slots.push(slot);
            }
            inits.push(quote! { #ident: ::core::default::Default::default() });
            continue;
        }

        let index = params.len();
        let ty = &field.ty;
        let (param, value) = match (&field.service, &field.default, field.config) {
            (Some(_), Some(_), _) | (Some(_), _, true) | (_, Some(_), true) => {
                errors.push(
                    darling::Error::custom("use only one of `service`, `default` or `config`")
                        .with_span(ident),
                );
                continue;
            }
            (Some(service), None, false) => {
                let Some(inner) = wrapped(ty, "Arc") else {
                    errors.push(not_shared(ident));
                    continue;
                };
                let identifier = service_identifier(service, inner);
                (
                    quote! { ::wasil::Param::service(#label, #identifier) },
                    quote! { args.shared(#index)? },
                )
            }
            (None, Some(default), false) => {
                let default = literal(default, ty);
                (
                    quote! { ::wasil::Param::with_default(#label, #default) },
                    quote! { args.value(#index)? },
                )
            }
            (None, None, true) => {
                config_index = Some((index, ident.clone()));
                (
                    quote! { ::wasil::Param::with_default(#label, ::wasil::Config::new()) },
                    quote! { args.options(#index)? },
                )
            }
            (None, None, false) => (
                quote! { ::wasil::Param::required(#label) },
                quote! { args.value(#index)? },
            ),
        };

        params.push(param);
        inits.push(quote! { #ident: #value });
    }

    if let Some((index, ident)) = &config_index {
        if index + 1 != params.len() {
            errors.push(
                darling::Error::custom("`config` must be the last constructor field")
                    .with_span(ident),
            );
        }
    }

    errors.finish()?;

    let identifier = parsed.id.as_ref().map(|id| {
        quote! {
            fn identifier() -> &'static str {
                #id
            }
        }
    });

    let construct = match fields.style {
        Style::Unit => quote! { |_| ::core::result::Result::Ok(Self) },
        _ if params.is_empty() => quote! {
            |_| ::core::result::Result::Ok(Self { #(#inits),* })
        },
        _ => quote! {
            |args: &::wasil::Arguments| ::core::result::Result::Ok(Self { #(#inits),* })
        },
    };

    let constructor = (!params.is_empty()).then(|| {
        quote! { .with_constructor([#(#params),*]) }
    });
    let configurable = config_index.is_some().then(|| quote! { .configurable() });

    let service = (!parsed.custom_service).then(|| {
        quote! {
            impl ::wasil::Service for #name {}
        }
    });

    Ok(quote! {
        impl ::wasil::Reflect for #name {
            #identifier

            fn type_info() -> ::wasil::TypeInfo {
                ::wasil::TypeInfo::new::<Self, _>(
                    <Self as ::wasil::Reflect>::identifier(),
                    #construct,
                )
                #constructor
                #(#slots)*
                #configurable
            }
        }

        #service

        ::wasil::inventory::submit! {
            ::wasil::TypeRegistration::new(<#name as ::wasil::Reflect>::type_info)
        }
    })
}

/// `.property(PropertySlot::new(..))` for one `#[inject(property)]` field.
fn property_slot(field: &InjectField, ident: &Ident, label: &str) -> darling::Result<TokenStream2> {
    let ty = &field.ty;
    let inner = wrapped(ty, "Option");
    let target = inner.unwrap_or(ty);

    let read = if wrapped(target, "Arc").is_some() {
        quote! { ::wasil::shared(&value, #label)? }
    } else {
        quote! { ::wasil::cloned(&value, #label)? }
    };
    let assign = match inner {
        Some(_) => quote! { ::core::option::Option::Some(#read) },
        None => read,
    };

    let visibility = match field.vis {
        syn::Visibility::Public(_) => quote! { ::wasil::Visibility::Public },
        _ => quote! { ::wasil::Visibility::Private },
    };

    let inject = match (&field.service, &field.default) {
        (Some(_), Some(_)) => {
            return Err(darling::Error::custom("use only one of `service` or `default`")
                .with_span(ident));
        }
        (Some(service), None) => {
            let inner = wrapped(target, "Arc").ok_or_else(|| not_shared(ident))?;
            let identifier = service_identifier(service, inner);
            Some(quote! { .inject_service(#identifier) })
        }
        (None, Some(default)) => {
            let default = literal(default, target);
            Some(quote! { .inject_value(#default) })
        }
        (None, None) => None,
    };

    Ok(quote! {
        .property(
            ::wasil::PropertySlot::new(
                #label,
                #visibility,
                |object: &mut Self, value: ::wasil::Instance| {
                    object.#ident = #assign;
                    ::core::result::Result::Ok(())
                },
            )
            #inject
        )
    })
}

/// A literal typed as `ty`. String literals go through `Into` so they can
/// fill `String` fields.
fn literal(lit: &Lit, ty: &Type) -> TokenStream2 {
    match lit {
        Lit::Str(_) => quote! {{
            let value: #ty = ::core::convert::Into::into(#lit);
            value
        }},
        _ => quote! {{
            let value: #ty = #lit;
            value
        }},
    }
}

fn service_identifier(service: &Override<String>, ty: &Type) -> TokenStream2 {
    match service {
        Override::Explicit(id) => quote! { #id },
        Override::Inherit => quote! { <#ty as ::wasil::Reflect>::identifier() },
    }
}

/// Services are shared; a by-value field would hold a copy of the singleton.
fn not_shared(ident: &Ident) -> darling::Error {
    darling::Error::custom("`service` fields must be `Arc<T>` (or `Option<Arc<T>>` for properties)")
        .with_span(ident)
}

/// The `T` of `Wrapper<T>`, matched on the last path segment.
fn wrapped<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else { return None };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }

    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    match arguments.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}
