//! Procedural macros for Horizon AutoGui type descriptions.
//!
//! This crate provides `#[derive(Describe)]`, `#[derive(Choice)]`, and the
//! `#[actions]` attribute, which generate the member listings consumed by
//! `horizon-autogui-core`.
//!
//! # Attributes
//!
//! ## `#[autogui(...)]` on fields
//!
//! Any `#[autogui]` attribute marks the field as explicitly annotated, which
//! includes it under the strict inclusion policy:
//!
//! ```ignore
//! #[derive(Describe)]
//! struct Player {
//!     #[autogui(index = 0, display_name = "Player Name")]
//!     pub name: String,
//!
//!     #[autogui(read_only, description = "Remaining lives")]
//!     lives: u8,
//!
//!     #[autogui(skip)]
//!     cache: HashMap<String, String>,
//! }
//! ```
//!
//! Field attributes:
//! - `index = N`: Explicit ordering; indexed members come first
//! - `name = "..."` / `display_name = "..."`: Label overriding the field name
//! - `description = "..."`: Tooltip text
//! - `accelerator = "..."`: Keyboard accelerator
//! - `read_only`: No setter is generated
//! - `selection_target = "..."`: Links the member to a sibling collection
//! - `opaque`: Describe the field without mapping its type
//! - `skip`: Leave the field out entirely
//!
//! ## `#[autogui(...)]` on the struct
//!
//! ```ignore
//! #[derive(Describe)]
//! #[autogui(display_name = "Game Settings", actions)]
//! struct Settings {
//!     // ...
//! }
//! ```
//!
//! - `display_name = "..."` and `description = "..."` apply to the type
//! - `actions`: Append the members of the type's `#[actions]` impl block
//!
//! ## `#[actions]` and `#[action(...)]`
//!
//! ```ignore
//! #[actions]
//! impl Settings {
//!     #[action(accelerator = "ctrl R")]
//!     pub fn reset(&mut self) {
//!         // ...
//!     }
//!
//!     #[action(selection_updater, selection_target = "items")]
//!     pub fn remove(&mut self, selected: Vec<Shared<Item>>) -> Vec<Shared<Item>> {
//!         // ...
//!     }
//! }
//! ```
//!
//! Methods with no parameter besides the receiver become actions; methods
//! with one parameter become list actions receiving the selected elements
//! of a linked collection. Returning `Result<T, E>` reports `E` through its
//! `Display` implementation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields, FnArg, Ident, ImplItem,
    ImplItemFn, ItemImpl, Lit, Meta, ReturnType, Type, UnOp, parse_macro_input,
};

/// Derive `Describe` from the named fields of a struct.
///
/// # Example
///
/// ```ignore
/// use horizon_autogui_core::Describe;
/// use horizon_autogui_macros::Describe;
///
/// #[derive(Describe)]
/// struct Window {
///     pub title: String,
///     #[autogui(index = 0)]
///     pub width: u32,
/// }
/// ```
#[proc_macro_derive(Describe, attributes(autogui))]
pub fn derive_describe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_derive_describe(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derive `Choice` and `HostValue` for an enum with unit variants only.
///
/// The enum must also be `Copy`.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Choice)]
/// enum Quality {
///     Low,
///     High,
/// }
/// ```
#[proc_macro_derive(Choice)]
pub fn derive_choice(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_derive_choice(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Collect the `#[action]` methods of an inherent impl block into a
/// `DescribeActions` implementation.
#[proc_macro_attribute]
pub fn actions(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr = TokenStream2::from(attr);
        return syn::Error::new_spanned(attr, "#[actions] takes no arguments")
            .to_compile_error()
            .into();
    }
    let mut item = parse_macro_input!(item as ItemImpl);

    match impl_actions(&mut item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Annotation values shared by fields and action methods.
#[derive(Default)]
struct MemberOptions {
    annotated: bool,
    skip: bool,
    opaque: bool,
    read_only: bool,
    selection_updater: bool,
    index: Option<i32>,
    display_name: Option<String>,
    description: Option<String>,
    accelerator: Option<String>,
    selection_target: Option<String>,
}

/// Parsed struct-level `#[autogui(...)]` attributes.
#[derive(Default)]
struct TypeOptions {
    display_name: Option<String>,
    description: Option<String>,
    actions: bool,
}

/// A named field taking part in the description.
struct FieldInfo {
    ident: Ident,
    ty: Type,
    visibility: TokenStream2,
    options: MemberOptions,
}

fn impl_derive_describe(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let type_options = parse_type_options(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => {
                return describe_impl(input, &type_options, &[]);
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Describe derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "Describe derive only supports structs; use Choice for enums",
            ));
        }
    };

    let mut infos = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let options = parse_member_options(&field.attrs, "autogui")?;
        if options.skip {
            continue;
        }
        if options.selection_updater {
            return Err(syn::Error::new_spanned(
                &ident,
                "selection_updater only applies to #[action] methods",
            ));
        }
        infos.push(FieldInfo {
            ident,
            ty: field.ty.clone(),
            visibility: visibility_tokens(&field.vis),
            options,
        });
    }

    let members: Vec<TokenStream2> = infos.iter().map(field_member).collect();
    describe_impl(input, &type_options, &members)
}

fn describe_impl(
    input: &DeriveInput,
    type_options: &TypeOptions,
    members: &[TokenStream2],
) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let display_name = type_options
        .display_name
        .as_ref()
        .map(|name| quote! { .display_name(#name) });
    let description = type_options
        .description
        .as_ref()
        .map(|text| quote! { .description(#text) });
    let actions = type_options.actions.then(|| {
        quote! {
            let builder = <Self as ::horizon_autogui_core::describe::DescribeActions>::describe_actions(builder);
        }
    });

    Ok(quote! {
        impl #impl_generics ::horizon_autogui_core::describe::Describe for #struct_name #ty_generics #where_clause {
            fn describe() -> ::horizon_autogui_core::describe::TypeInfo {
                let builder = ::horizon_autogui_core::describe::TypeInfo::builder::<Self>()
                    .describe_with(<Self as ::horizon_autogui_core::describe::Describe>::describe)
                    #display_name
                    #description
                    #(#members)*;
                #actions
                builder.build()
            }
        }
    })
}

fn field_member(info: &FieldInfo) -> TokenStream2 {
    let FieldInfo {
        ident,
        ty,
        visibility,
        options,
    } = info;
    let name = ident.to_string();
    let attrs = attrs_tokens(options);

    if options.opaque {
        quote! {
            .opaque(#name, ::core::any::type_name::<#ty>(), #attrs, #visibility)
        }
    } else if options.read_only {
        quote! {
            .field_read_only::<#ty>(#name, |s| &s.#ident, #attrs, #visibility)
        }
    } else {
        quote! {
            .field::<#ty>(#name, |s| &s.#ident, |s| &mut s.#ident, #attrs, #visibility)
        }
    }
}

fn attrs_tokens(options: &MemberOptions) -> TokenStream2 {
    let mut tokens = if options.annotated {
        quote! { ::horizon_autogui_core::describe::MemberAttrs::annotated() }
    } else {
        quote! { ::horizon_autogui_core::describe::MemberAttrs::new() }
    };
    if let Some(index) = options.index {
        tokens.extend(quote! { .index(#index) });
    }
    if let Some(name) = &options.display_name {
        tokens.extend(quote! { .display_name(#name) });
    }
    if let Some(text) = &options.description {
        tokens.extend(quote! { .description(#text) });
    }
    if let Some(key) = &options.accelerator {
        tokens.extend(quote! { .accelerator(#key) });
    }
    if options.read_only {
        tokens.extend(quote! { .read_only() });
    }
    if options.selection_updater {
        tokens.extend(quote! { .selection_updater() });
    }
    if let Some(target) = &options.selection_target {
        tokens.extend(quote! { .selection_target(#target) });
    }
    tokens
}

fn visibility_tokens(vis: &syn::Visibility) -> TokenStream2 {
    match vis {
        syn::Visibility::Public(_) => {
            quote! { ::horizon_autogui_core::describe::Visibility::Public }
        }
        syn::Visibility::Restricted(_) => {
            quote! { ::horizon_autogui_core::describe::Visibility::Crate }
        }
        syn::Visibility::Inherited => {
            quote! { ::horizon_autogui_core::describe::Visibility::Private }
        }
    }
}

/// Parse struct-level #[autogui(...)] attributes.
fn parse_type_options(attrs: &[Attribute]) -> syn::Result<TypeOptions> {
    let mut result = TypeOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("autogui") || matches!(attr.meta, Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("display_name") || meta.path.is_ident("name") {
                result.display_name = Some(parse_string(&meta.value()?.parse()?)?);
            } else if meta.path.is_ident("description") {
                result.description = Some(parse_string(&meta.value()?.parse()?)?);
            } else if meta.path.is_ident("actions") {
                result.actions = true;
            } else {
                return Err(meta.error("unknown autogui type attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// Parse the member attributes named `attr_name`. Any occurrence, even
/// without arguments, marks the member as annotated.
fn parse_member_options(attrs: &[Attribute], attr_name: &str) -> syn::Result<MemberOptions> {
    let mut result = MemberOptions::default();

    for attr in attrs {
        if !attr.path().is_ident(attr_name) {
            continue;
        }
        result.annotated = true;
        if matches!(attr.meta, Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                result.skip = true;
            } else if meta.path.is_ident("opaque") {
                result.opaque = true;
            } else if meta.path.is_ident("read_only") {
                result.read_only = true;
            } else if meta.path.is_ident("selection_updater") {
                result.selection_updater = true;
            } else if meta.path.is_ident("index") {
                result.index = Some(parse_index(&meta.value()?.parse()?)?);
            } else if meta.path.is_ident("display_name") || meta.path.is_ident("name") {
                result.display_name = Some(parse_string(&meta.value()?.parse()?)?);
            } else if meta.path.is_ident("description") {
                result.description = Some(parse_string(&meta.value()?.parse()?)?);
            } else if meta.path.is_ident("accelerator") {
                result.accelerator = Some(parse_string(&meta.value()?.parse()?)?);
            } else if meta.path.is_ident("selection_target") {
                result.selection_target = Some(parse_string(&meta.value()?.parse()?)?);
            } else {
                return Err(meta.error(format!("unknown {attr_name} attribute")));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn parse_string(value: &Expr) -> syn::Result<String> {
    match value {
        Expr::Lit(ExprLit {
            lit: Lit::Str(lit_str),
            ..
        }) => Ok(lit_str.value()),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

fn parse_index(value: &Expr) -> syn::Result<i32> {
    match value {
        Expr::Lit(ExprLit {
            lit: Lit::Int(lit_int),
            ..
        }) => lit_int.base10_parse(),
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => parse_index(expr).map(|index| -index),
        other => Err(syn::Error::new_spanned(other, "expected an integer literal")),
    }
}

fn impl_derive_choice(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let enum_name = &input.ident;
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            enum_name,
            "Choice derive only supports enums",
        ));
    };
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Choice derive does not support generic enums",
        ));
    }
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            enum_name,
            "Choice derive needs at least one variant",
        ));
    }

    let mut variants = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Choice derive only supports unit variants",
            ));
        }
        variants.push(&variant.ident);
    }
    let names: Vec<String> = variants.iter().map(|v| v.to_string()).collect();

    Ok(quote! {
        impl ::horizon_autogui_core::value::Choice for #enum_name {
            const INFO: ::horizon_autogui_core::value::EnumInfo = ::horizon_autogui_core::value::EnumInfo {
                type_name: ::core::concat!(::core::module_path!(), "::", ::core::stringify!(#enum_name)),
                variants: &[#(#names),*],
            };

            fn variant_name(&self) -> &'static str {
                match self {
                    #(Self::#variants => #names,)*
                }
            }

            fn from_variant_name(name: &str) -> ::core::option::Option<Self> {
                match name {
                    #(#names => ::core::option::Option::Some(Self::#variants),)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl ::horizon_autogui_core::value::HostValue for #enum_name {
            fn value_type() -> ::horizon_autogui_core::value::ValueType {
                ::horizon_autogui_core::value::ValueType::Enum(
                    <Self as ::horizon_autogui_core::value::Choice>::INFO,
                )
            }

            fn to_value(&self) -> ::horizon_autogui_core::value::Value {
                ::horizon_autogui_core::value::Choice::to_enum_value(self)
            }

            fn from_value(
                value: ::horizon_autogui_core::value::Value,
            ) -> ::core::result::Result<Self, ::horizon_autogui_core::ValueError> {
                <Self as ::horizon_autogui_core::value::Choice>::from_enum_value(value)
            }
        }
    })
}

/// Parsed `#[action]` method.
struct ActionInfo {
    method: Ident,
    param: Option<Type>,
    output: ActionOutput,
    visibility: TokenStream2,
    options: MemberOptions,
}

enum ActionOutput {
    Unit,
    Value,
    Fallible,
}

fn impl_actions(item: &mut ItemImpl) -> syn::Result<TokenStream2> {
    if item.trait_.is_some() {
        return Err(syn::Error::new_spanned(
            &item.self_ty,
            "#[actions] only applies to inherent impl blocks",
        ));
    }

    let mut actions = Vec::new();
    for impl_item in &mut item.items {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };
        if !method.attrs.iter().any(|attr| attr.path().is_ident("action")) {
            continue;
        }
        let options = parse_member_options(&method.attrs, "action")?;
        method.attrs.retain(|attr| !attr.path().is_ident("action"));
        actions.push(parse_action(method, options)?);
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();
    let members: Vec<TokenStream2> = actions.iter().map(action_member).collect();

    Ok(quote! {
        #item

        impl #impl_generics ::horizon_autogui_core::describe::DescribeActions for #self_ty #where_clause {
            fn describe_actions(
                builder: ::horizon_autogui_core::describe::TypeInfoBuilder<Self>,
            ) -> ::horizon_autogui_core::describe::TypeInfoBuilder<Self> {
                builder #(#members)*
            }
        }
    })
}

fn parse_action(method: &ImplItemFn, options: MemberOptions) -> syn::Result<ActionInfo> {
    let sig = &method.sig;
    if options.skip || options.opaque || options.read_only {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "skip, opaque, and read_only do not apply to actions",
        ));
    }
    if sig.asyncness.is_some() || !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            sig,
            "actions must be plain non-generic methods",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                sig,
                "actions take `&self` or `&mut self`",
            ));
        }
    }
    let param = match (inputs.next(), inputs.next()) {
        (None, _) => None,
        (Some(FnArg::Typed(arg)), None) => Some((*arg.ty).clone()),
        _ => {
            return Err(syn::Error::new_spanned(
                sig,
                "actions take at most one parameter besides the receiver",
            ));
        }
    };

    let output = match &sig.output {
        ReturnType::Default => ActionOutput::Unit,
        ReturnType::Type(_, ty) if is_result(ty) => ActionOutput::Fallible,
        ReturnType::Type(..) => ActionOutput::Value,
    };

    Ok(ActionInfo {
        method: sig.ident.clone(),
        param,
        output,
        visibility: visibility_tokens(&method.vis),
        options,
    })
}

fn is_result(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Result"),
        _ => false,
    }
}

fn action_member(info: &ActionInfo) -> TokenStream2 {
    let ActionInfo {
        method,
        param,
        output,
        visibility,
        options,
    } = info;
    let name = method.to_string();
    let attrs = attrs_tokens(options);

    let call = match param {
        Some(_) => quote! { owner.#method(selection) },
        None => quote! { owner.#method() },
    };
    let body = match output {
        ActionOutput::Unit => quote! {
            #call;
            ::core::result::Result::Ok(::horizon_autogui_core::value::Value::Null)
        },
        ActionOutput::Value => quote! {
            let result = #call;
            ::core::result::Result::Ok(::horizon_autogui_core::value::HostValue::to_value(&result))
        },
        ActionOutput::Fallible => quote! {
            match #call {
                ::core::result::Result::Ok(result) => ::core::result::Result::Ok(
                    ::horizon_autogui_core::value::HostValue::to_value(&result),
                ),
                ::core::result::Result::Err(err) => ::core::result::Result::Err(
                    ::horizon_autogui_core::AccessError::host(err.to_string()),
                ),
            }
        },
    };

    match param {
        Some(param) => quote! {
            .action_list::<#param>(#name, #attrs, #visibility, |owner, selection| { #body })
        },
        None => quote! {
            .action(#name, #attrs, #visibility, |owner| { #body })
        },
    }
}
