//! Parsing logic for the Model derive macro.
//!
//! This module extracts struct-level and field-level `#[model(...)]`
//! attributes from the derive input to build the `ModelDef` and `FieldDef`
//! structures used for code generation.

use proc_macro2::Span;
use quote::ToTokens;
use syn::{Attribute, Data, DeriveInput, Error, Field, Fields, Generics, Ident, Lit, Result, Type};

/// Annotation flags accepted on fields, in the order they are emitted.
///
/// `primary_key` and `tenant` are handled separately because they also
/// change code generation.
pub const FLAG_NAMES: &[&str] = &[
    "no_set_tenant",
    "no_filter_tenant",
    "eager",
    "ignore_eager",
    "ignore_eager_child",
    "ignore_set_default",
    "ignore_set_default_child",
    "save_or_update_cascade",
    "remove_cascade",
];

/// Parsed model definition from a struct with `#[derive(Model)]`.
#[derive(Debug)]
pub struct ModelDef {
    /// The struct name (e.g., `Order`).
    pub name: Ident,
    /// The backend table name (e.g., `"orders"`).
    pub table_name: String,
    /// Parsed field definitions.
    pub fields: Vec<FieldDef>,
    /// Generic parameters from the struct.
    pub generics: Generics,
    /// The struct supplies its own `ModelEvents` impl.
    pub events: bool,
}

/// What a field maps to, detected from its Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKindAttr {
    Column,
    /// `Related<T>`
    ToOne,
    /// `RelatedMany<T>`
    ToMany,
}

/// Parsed field definition from a struct field.
#[derive(Debug)]
pub struct FieldDef {
    /// The Rust field name.
    pub name: Ident,
    /// The backend column name (field name unless overridden).
    pub column_name: String,
    /// The Rust type of the field.
    pub ty: Type,
    pub kind: FieldKindAttr,
    pub primary_key: bool,
    pub tenant: bool,
    /// Skip this field entirely in backend operations.
    pub skip: bool,
    /// Annotation flags from [`FLAG_NAMES`], in declaration order.
    pub flags: Vec<String>,
    /// Back-reference column on the child table (to-many only).
    pub remote_column: Option<String>,
}

impl FieldDef {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    /// Whether the field's type is `Option<_>`.
    pub fn is_optional(&self) -> bool {
        is_option_type(&self.ty)
    }
}

impl ModelDef {
    /// Fields that are part of the backend row (columns and to-one references).
    pub fn row_fields(&self) -> Vec<&FieldDef> {
        self.fields
            .iter()
            .filter(|f| !f.skip && f.kind != FieldKindAttr::ToMany)
            .collect()
    }

    /// Fields exposed in the capability table.
    pub fn described_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| !f.skip).collect()
    }

    pub fn association_fields(&self) -> Vec<&FieldDef> {
        self.described_fields()
            .into_iter()
            .filter(|f| f.kind != FieldKindAttr::Column)
            .collect()
    }

    pub fn primary_key_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.primary_key)
    }

    pub fn tenant_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.tenant)
    }
}

/// Parse a `DeriveInput` into a `ModelDef`.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();
    let generics = input.generics.clone();

    let StructAttrs { table_name, events } = parse_struct_attrs(&input.attrs, &name)?;

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    Ok(ModelDef {
        name,
        table_name,
        fields,
        generics,
        events,
    })
}

struct StructAttrs {
    table_name: String,
    events: bool,
}

/// Parse struct-level `#[model(...)]` attributes.
///
/// Supported keys:
/// - `table = "name"` (overrides the derived table name)
/// - `events` (the struct implements `ModelEvents` itself)
fn parse_struct_attrs(attrs: &[Attribute], struct_name: &Ident) -> Result<StructAttrs> {
    let mut table_name: Option<String> = None;
    let mut events = false;

    for attr in attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                if table_name.is_some() {
                    return Err(Error::new_spanned(
                        meta.path,
                        "duplicate model attribute: table",
                    ));
                }
                table_name = Some(parse_str_value(&meta, "table name")?);
                Ok(())
            } else if meta.path.is_ident("events") {
                events = true;
                Ok(())
            } else {
                let name = meta.path.to_token_stream().to_string();
                Err(Error::new_spanned(
                    meta.path,
                    format!("unknown model struct attribute `{name}`"),
                ))
            }
        })?;
    }

    Ok(StructAttrs {
        table_name: table_name.unwrap_or_else(|| derive_table_name(&struct_name.to_string())),
        events,
    })
}

fn parse_str_value(meta: &syn::meta::ParseNestedMeta<'_>, what: &str) -> Result<String> {
    let value: Lit = meta.value()?.parse()?;
    if let Lit::Str(lit_str) = value {
        Ok(lit_str.value())
    } else {
        Err(Error::new_spanned(
            value,
            format!("expected string literal for {what}"),
        ))
    }
}

/// Derive a table name from a struct name: snake_case, pluralized.
///
/// - `Order` -> `orders`
/// - `LineItem` -> `line_items`
/// - `Category` -> `categories`
fn derive_table_name(struct_name: &str) -> String {
    pluralize(&to_snake_case(struct_name))
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();
                if prev.is_lowercase()
                    || (prev.is_uppercase() && next.is_some_and(char::is_lowercase))
                {
                    result.push('_');
                }
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }

    result
}

fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().is_some_and(|c| !"aeiou".contains(c)) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with fields, not a unit struct",
        )),
    }
}

#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    primary_key: bool,
    tenant: bool,
    skip: bool,
    flags: Vec<String>,
    remote_column: Option<String>,
}

fn parse_field(field: &Field) -> Result<FieldDef> {
    let name = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let ty = field.ty.clone();
    let kind = detect_field_kind(&ty);
    let attrs = parse_field_attrs(&field.attrs)?;

    Ok(FieldDef {
        column_name: attrs.column.unwrap_or_else(|| name.to_string()),
        name,
        ty,
        kind,
        primary_key: attrs.primary_key,
        tenant: attrs.tenant,
        skip: attrs.skip,
        flags: attrs.flags,
        remote_column: attrs.remote_column,
    })
}

/// Detect what a field maps to from its Rust type.
pub fn detect_field_kind(ty: &Type) -> FieldKindAttr {
    let normalized = ty.to_token_stream().to_string().replace(' ', "");

    if normalized.starts_with("RelatedMany<") || normalized.contains("::RelatedMany<") {
        FieldKindAttr::ToMany
    } else if normalized.starts_with("Related<") || normalized.contains("::Related<") {
        FieldKindAttr::ToOne
    } else {
        FieldKindAttr::Column
    }
}

/// Parse all `#[model(...)]` attributes on a field.
fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("model") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                result.primary_key = true;
            } else if path.is_ident("tenant") {
                result.tenant = true;
            } else if path.is_ident("skip") {
                result.skip = true;
            } else if path.is_ident("column") {
                result.column = Some(parse_str_value(&meta, "column name")?);
            } else if path.is_ident("remote_column") {
                result.remote_column = Some(parse_str_value(&meta, "remote_column")?);
            } else if let Some(flag) = FLAG_NAMES.iter().find(|f| path.is_ident(f)) {
                if result.flags.iter().any(|f| f == flag) {
                    return Err(Error::new_spanned(
                        path,
                        format!("duplicate model attribute: {flag}"),
                    ));
                }
                result.flags.push((*flag).to_string());
            } else {
                let name = path.to_token_stream().to_string();
                return Err(Error::new_spanned(
                    path,
                    format!("unknown model field attribute `{name}`"),
                ));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// Check if a type is `Option<T>`.
pub fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            return segment.ident == "Option";
        }
    }
    false
}

/// Check if a type is `Option<TenantId>` (any path prefix).
pub fn is_tenant_type(ty: &Type) -> bool {
    let normalized = ty.to_token_stream().to_string().replace(' ', "");
    normalized.ends_with("Option<TenantId>")
}

/// Check if a type is `i64`.
pub fn is_i64_type(ty: &Type) -> bool {
    matches!(ty, Type::Path(p) if p.qself.is_none() && p.path.is_ident("i64"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_derive_table_name() {
        assert_eq!(to_snake_case("LineItem"), "line_item");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(derive_table_name("Order"), "orders");
        assert_eq!(derive_table_name("Category"), "categories");
        assert_eq!(derive_table_name("Address"), "addresses");
        assert_eq!(derive_table_name("Day"), "days");
    }

    #[test]
    fn test_parse_model_table_override_and_events() {
        let input: DeriveInput = parse_quote! {
            #[model(table = "sales", events)]
            struct Order {
                #[model(primary_key)]
                id: i64,
            }
        };

        let def = parse_model(&input).unwrap();
        assert_eq!(def.table_name, "sales");
        assert!(def.events);
    }

    #[test]
    fn test_unknown_struct_attr_errors() {
        let input: DeriveInput = parse_quote! {
            #[model(not_a_real_key = "x")]
            struct Order {
                #[model(primary_key)]
                id: i64,
            }
        };

        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("unknown model struct attribute"), "{err}");
    }

    #[test]
    fn test_parse_field_flags_in_order() {
        let input: DeriveInput = parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: i64,
                #[model(tenant, no_filter_tenant)]
                tenant_id: Option<TenantId>,
                #[model(column = "customer_id", eager, ignore_eager_child, save_or_update_cascade)]
                customer: Related<Customer>,
                #[model(remote_column = "order_id", remove_cascade)]
                lines: RelatedMany<Line>,
                #[model(skip)]
                scratch: String,
            }
        };

        let def = parse_model(&input).unwrap();
        assert_eq!(def.table_name, "orders");
        assert!(def.primary_key_field().is_some());
        let tenant = def.tenant_field().unwrap();
        assert_eq!(tenant.flags, ["no_filter_tenant"]);

        let customer = &def.fields[2];
        assert_eq!(customer.kind, FieldKindAttr::ToOne);
        assert_eq!(customer.column_name, "customer_id");
        assert_eq!(
            customer.flags,
            ["eager", "ignore_eager_child", "save_or_update_cascade"]
        );

        let lines = &def.fields[3];
        assert_eq!(lines.kind, FieldKindAttr::ToMany);
        assert_eq!(lines.remote_column.as_deref(), Some("order_id"));

        assert_eq!(def.row_fields().len(), 3);
        assert_eq!(def.association_fields().len(), 2);
    }

    #[test]
    fn test_unknown_field_attr_errors() {
        let input: DeriveInput = parse_quote! {
            struct Order {
                #[model(primary_key, lazy)]
                id: i64,
            }
        };
        let err = parse_model(&input).unwrap_err();
        assert!(err.to_string().contains("unknown model field attribute `lazy`"), "{err}");
    }

    #[test]
    fn test_duplicate_flag_errors() {
        let input: DeriveInput = parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: i64,
                #[model(eager, eager)]
                customer: Related<Customer>,
            }
        };
        assert!(parse_model(&input).is_err());
    }

    #[test]
    fn test_detect_field_kind() {
        let related: Type = parse_quote!(tenantorm::Related<Customer>);
        let many: Type = parse_quote!(RelatedMany<Line>);
        let plain: Type = parse_quote!(Option<String>);
        assert_eq!(detect_field_kind(&related), FieldKindAttr::ToOne);
        assert_eq!(detect_field_kind(&many), FieldKindAttr::ToMany);
        assert_eq!(detect_field_kind(&plain), FieldKindAttr::Column);
    }

    #[test]
    fn test_type_predicates() {
        assert!(is_tenant_type(&parse_quote!(Option<tenantorm::TenantId>)));
        assert!(!is_tenant_type(&parse_quote!(TenantId)));
        assert!(is_i64_type(&parse_quote!(i64)));
        assert!(!is_i64_type(&parse_quote!(Option<i64>)));
    }
}
