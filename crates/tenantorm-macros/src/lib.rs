//! Procedural macros for tenantorm.
//!
//! `tenantorm-macros` is the compile-time codegen layer. `#[derive(Model)]`
//! turns a struct into an entity: it emits the static capability table
//! (`FieldInfo` + `FieldFlags` per field), row conversion, tenant accessors
//! and the association visitor the graph walker uses.
//!
//! These macros are used by application crates via the `tenantorm` facade.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};

mod parse;
mod validate;

use parse::{FieldDef, FieldKindAttr, ModelDef, parse_model};

/// Derive macro for the `Model` and `Entity` traits.
///
/// # Attributes
///
/// Struct level:
/// - `#[model(table = "name")]` - Override table name (defaults to snake_case plural)
/// - `#[model(events)]` - The struct implements `ModelEvents` itself
///
/// Field level:
/// - `#[model(primary_key)]` - The `i64` identity field
/// - `#[model(column = "name")]` - Override column name (reference column for `Related<T>`)
/// - `#[model(skip)]` - Not stored; filled with `Default::default()` on load
/// - `#[model(tenant)]` - The `Option<TenantId>` tenant field
/// - `#[model(no_set_tenant)]`, `#[model(no_filter_tenant)]` - Suppress stamping or filtering
/// - `#[model(eager)]`, `#[model(ignore_eager)]`, `#[model(ignore_eager_child)]`
/// - `#[model(ignore_set_default)]`, `#[model(ignore_set_default_child)]`
/// - `#[model(save_or_update_cascade)]`, `#[model(remove_cascade)]`
/// - `#[model(remote_column = "col")]` - Back-reference column for `RelatedMany<T>`
///
/// # Example
///
/// ```ignore
/// use tenantorm::prelude::*;
///
/// #[derive(Model, Debug, Default)]
/// #[model(table = "orders")]
/// struct Order {
///     #[model(primary_key)]
///     id: i64,
///     #[model(tenant)]
///     tenant_id: Option<TenantId>,
///     total: i64,
///     #[model(column = "customer_id", eager, save_or_update_cascade)]
///     customer: Related<Customer>,
///     #[model(remote_column = "order_id", remove_cascade)]
///     lines: RelatedMany<OrderLine>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let model = match parse_model(&input) {
        Ok(m) => m,
        Err(e) => return e.to_compile_error().into(),
    };

    if let Err(e) = validate::validate_model(&model) {
        return e.to_compile_error().into();
    }

    generate_model_impl(&model).into()
}

fn generate_model_impl(model: &ModelDef) -> TokenStream2 {
    let name = &model.name;
    let table_name = &model.table_name;
    let type_name = name.to_string();
    let (impl_generics, ty_generics, where_clause) = model.generics.split_for_impl();

    let field_infos = generate_field_infos(model);
    let to_row_body = generate_to_row(model);
    let from_row_body = generate_from_row(model);
    let (tenant_body, set_tenant_body) = generate_tenant_accessors(model);
    let set_column_body = generate_set_column(model);
    let associations_body = generate_associations(model);

    let pk = model
        .primary_key_field()
        .map(|f| f.name.clone())
        .unwrap_or_else(|| format_ident!("id"));

    let events_impl = if model.events {
        quote! {}
    } else {
        quote! {
            impl #impl_generics tenantorm_core::ModelEvents for #name #ty_generics #where_clause {}
        }
    };

    quote! {
        impl #impl_generics tenantorm_core::Model for #name #ty_generics #where_clause {
            const TABLE_NAME: &'static str = #table_name;
            const TYPE_NAME: &'static str = #type_name;

            fn fields() -> &'static [tenantorm_core::FieldInfo] {
                static FIELDS: &[tenantorm_core::FieldInfo] = &[
                    #field_infos
                ];
                FIELDS
            }

            fn from_row(row: &tenantorm_core::Row) -> tenantorm_core::Result<Self> {
                #from_row_body
            }
        }

        impl #impl_generics tenantorm_core::Entity for #name #ty_generics #where_clause {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            fn table_name(&self) -> &'static str {
                #table_name
            }

            fn field_infos(&self) -> &'static [tenantorm_core::FieldInfo] {
                <Self as tenantorm_core::Model>::fields()
            }

            fn id(&self) -> i64 {
                self.#pk
            }

            fn set_id(&mut self, id: i64) {
                self.#pk = id;
            }

            fn to_row(&self) -> tenantorm_core::Row {
                #to_row_body
            }

            fn tenant(&self) -> Option<tenantorm_core::TenantId> {
                #tenant_body
            }

            fn set_tenant(&mut self, tenant: Option<tenantorm_core::TenantId>) {
                #set_tenant_body
            }

            fn set_column(
                &mut self,
                column: &str,
                value: &tenantorm_core::Value,
            ) -> tenantorm_core::Result<bool> {
                #set_column_body
            }

            fn associations_mut(&mut self) -> Vec<tenantorm_core::AssociationMut<'_>> {
                #associations_body
            }
        }

        #events_impl
    }
}

fn flag_const(flag: &str) -> TokenStream2 {
    let ident = format_ident!("{}", flag.to_uppercase());
    quote! { tenantorm_core::FieldFlags::#ident }
}

/// Generate the `FieldInfo` entries of the capability table.
fn generate_field_infos(model: &ModelDef) -> TokenStream2 {
    let entries = model.described_fields().into_iter().map(|field| {
        let field_name = field.name.to_string();
        let column_name = &field.column_name;

        let kind = match field.kind {
            FieldKindAttr::Column => quote! { tenantorm_core::FieldKind::Column },
            FieldKindAttr::ToOne => quote! { tenantorm_core::FieldKind::ToOne },
            FieldKindAttr::ToMany => quote! { tenantorm_core::FieldKind::ToMany },
        };

        let mut flags = Vec::new();
        if field.primary_key {
            flags.push(flag_const("primary_key"));
        }
        if field.tenant {
            flags.push(flag_const("tenant"));
        }
        flags.extend(field.flags.iter().map(|f| flag_const(f)));

        let remote = field
            .remote_column
            .as_ref()
            .map(|col| quote! { .remote_column(#col) });

        quote! {
            tenantorm_core::FieldInfo::new(#field_name)
                .column(#column_name)
                .kind(#kind)
                .flags(tenantorm_core::FieldFlags::NONE #(.union(#flags))*)
                #remote
        }
    });

    quote! { #(#entries),* }
}

/// Generate the `to_row` body: every column and to-one reference column.
fn generate_to_row(model: &ModelDef) -> TokenStream2 {
    let row_fields = model.row_fields();
    let columns = row_fields.iter().map(|f| f.column_name.as_str());
    let values = row_fields.iter().map(|field| {
        let field_name = &field.name;
        match field.kind {
            FieldKindAttr::ToOne => quote! { self.#field_name.to_value() },
            _ if field.is_optional() => quote! {
                match &self.#field_name {
                    Some(v) => tenantorm_core::Value::from(v.clone()),
                    None => tenantorm_core::Value::Null,
                }
            },
            _ => quote! { tenantorm_core::Value::from(self.#field_name.clone()) },
        }
    });

    quote! {
        tenantorm_core::Row::new(
            vec![#(#columns.to_string()),*],
            vec![#(#values),*],
        )
    }
}

/// Generate the `from_row` body.
///
/// Optional columns and references tolerate a missing column; required
/// columns propagate the conversion error.
fn generate_from_row(model: &ModelDef) -> TokenStream2 {
    let inits = model.fields.iter().map(|field| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        let ty = &field.ty;

        if field.skip || field.kind == FieldKindAttr::ToMany {
            return quote! { #field_name: Default::default() };
        }
        match field.kind {
            FieldKindAttr::ToOne => quote! {
                #field_name: row.get_named::<#ty>(#column_name).unwrap_or_default()
            },
            _ if field.is_optional() => quote! {
                #field_name: row.get_named::<#ty>(#column_name).ok().flatten()
            },
            _ => quote! {
                #field_name: row.get_named::<#ty>(#column_name)?
            },
        }
    });

    quote! {
        Ok(Self {
            #(#inits),*
        })
    }
}

fn generate_tenant_accessors(model: &ModelDef) -> (TokenStream2, TokenStream2) {
    match model.tenant_field() {
        Some(field) => {
            let field_name = &field.name;
            (
                quote! { self.#field_name },
                quote! { self.#field_name = tenant; },
            )
        }
        None => (quote! { None }, quote! { let _ = tenant; }),
    }
}

/// Generate the `set_column` body.
fn generate_set_column(model: &ModelDef) -> TokenStream2 {
    let arms = model.row_fields().into_iter().map(|field: &FieldDef| {
        let field_name = &field.name;
        let column_name = &field.column_name;
        let ty = &field.ty;
        quote! {
            #column_name => {
                self.#field_name =
                    <#ty as tenantorm_core::FromValue>::from_value(value)?;
            }
        }
    });

    quote! {
        match column {
            #(#arms)*
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Generate the association visitor.
fn generate_associations(model: &ModelDef) -> TokenStream2 {
    let described = model.described_fields();
    let entries = described
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind != FieldKindAttr::Column)
        .map(|(index, field)| {
            let field_name = &field.name;
            quote! {
                tenantorm_core::AssociationMut::new(&fields[#index], &mut self.#field_name)
            }
        })
        .collect::<Vec<_>>();

    if entries.is_empty() {
        return quote! { Vec::new() };
    }

    quote! {
        let fields = <Self as tenantorm_core::Model>::fields();
        vec![#(#entries),*]
    }
}
