//! Compile-time validation for the Model derive macro.
//!
//! All problems are collected and reported together, each pointing at the
//! offending field.

use std::collections::HashSet;

use syn::Error;

use crate::parse::{FieldDef, FieldKindAttr, ModelDef, is_i64_type, is_tenant_type};

/// Flags that only make sense on association fields.
const ASSOCIATION_FLAGS: &[&str] = &[
    "eager",
    "ignore_eager",
    "ignore_eager_child",
    "ignore_set_default",
    "ignore_set_default_child",
    "save_or_update_cascade",
    "remove_cascade",
];

/// Validate a parsed model definition.
pub fn validate_model(model: &ModelDef) -> Result<(), Error> {
    let mut errors = Vec::new();

    validate_primary_key(model, &mut errors);
    validate_single_tenant_field(model, &mut errors);
    validate_no_duplicate_columns(model, &mut errors);

    for field in &model.fields {
        validate_field(field, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        let mut combined = errors.remove(0);
        for err in errors {
            combined.combine(err);
        }
        Err(combined)
    }
}

fn validate_primary_key(model: &ModelDef, errors: &mut Vec<Error>) {
    let pks: Vec<&FieldDef> = model.fields.iter().filter(|f| f.primary_key).collect();
    match pks.as_slice() {
        [] => errors.push(Error::new(
            model.name.span(),
            "Model requires exactly one `#[model(primary_key)]` field of type i64",
        )),
        [pk] => {
            if !is_i64_type(&pk.ty) {
                errors.push(Error::new_spanned(&pk.ty, "primary key field must be `i64`"));
            }
        }
        [_, rest @ ..] => {
            for extra in rest {
                errors.push(Error::new_spanned(
                    &extra.name,
                    "only one field may be marked `primary_key`",
                ));
            }
        }
    }
}

fn validate_single_tenant_field(model: &ModelDef, errors: &mut Vec<Error>) {
    for extra in model.fields.iter().filter(|f| f.tenant).skip(1) {
        errors.push(Error::new_spanned(
            &extra.name,
            "only one field may be marked `tenant`",
        ));
    }
}

fn validate_no_duplicate_columns(model: &ModelDef, errors: &mut Vec<Error>) {
    let mut seen = HashSet::new();
    for field in model.row_fields() {
        if !seen.insert(field.column_name.as_str()) {
            errors.push(Error::new_spanned(
                &field.name,
                format!("duplicate column name `{}`", field.column_name),
            ));
        }
    }
}

fn validate_field(field: &FieldDef, errors: &mut Vec<Error>) {
    if field.skip && (field.primary_key || field.tenant || !field.flags.is_empty()) {
        errors.push(Error::new_spanned(
            &field.name,
            "`skip` cannot be combined with other model attributes",
        ));
        return;
    }

    if field.tenant && !is_tenant_type(&field.ty) {
        errors.push(Error::new_spanned(
            &field.ty,
            "`tenant` field must be of type `Option<TenantId>`",
        ));
    }

    for flag in ["no_set_tenant", "no_filter_tenant"] {
        if field.has_flag(flag) && !field.tenant {
            errors.push(Error::new_spanned(
                &field.name,
                format!("`{flag}` requires `tenant` on the same field"),
            ));
        }
    }

    match field.kind {
        FieldKindAttr::Column => {
            for flag in ASSOCIATION_FLAGS {
                if field.has_flag(flag) {
                    errors.push(Error::new_spanned(
                        &field.name,
                        format!("`{flag}` can only be used on Related<T> or RelatedMany<T> fields"),
                    ));
                }
            }
            if field.remote_column.is_some() {
                errors.push(Error::new_spanned(
                    &field.name,
                    "`remote_column` can only be used on RelatedMany<T> fields",
                ));
            }
        }
        FieldKindAttr::ToOne => {
            if field.primary_key || field.tenant {
                errors.push(Error::new_spanned(
                    &field.name,
                    "an association cannot be a primary key or tenant field",
                ));
            }
            if field.remote_column.is_some() {
                errors.push(Error::new_spanned(
                    &field.name,
                    "`remote_column` can only be used on RelatedMany<T> fields",
                ));
            }
        }
        FieldKindAttr::ToMany => {
            if field.primary_key || field.tenant {
                errors.push(Error::new_spanned(
                    &field.name,
                    "an association cannot be a primary key or tenant field",
                ));
            }
            if field.remote_column.is_none() {
                errors.push(Error::new_spanned(
                    &field.name,
                    "RelatedMany<T> fields require `remote_column = \"...\"`",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_model;
    use syn::{DeriveInput, parse_quote};

    fn check(input: DeriveInput) -> Result<(), String> {
        let model = parse_model(&input).map_err(|e| e.to_string())?;
        validate_model(&model).map_err(|e| e.to_string())
    }

    #[test]
    fn accepts_complete_model() {
        let result = check(parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: i64,
                #[model(tenant, no_set_tenant)]
                tenant_id: Option<TenantId>,
                #[model(column = "customer_id", eager)]
                customer: Related<Customer>,
                #[model(remote_column = "order_id", save_or_update_cascade)]
                lines: RelatedMany<Line>,
            }
        });
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn rejects_missing_primary_key() {
        let err = check(parse_quote! {
            struct Order {
                total: i64,
            }
        })
        .unwrap_err();
        assert!(err.contains("exactly one"), "{err}");
    }

    #[test]
    fn rejects_non_i64_primary_key() {
        let err = check(parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: Option<i64>,
            }
        })
        .unwrap_err();
        assert!(err.contains("must be `i64`"), "{err}");
    }

    #[test]
    fn rejects_tenant_of_wrong_type() {
        let err = check(parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: i64,
                #[model(tenant)]
                tenant_id: i64,
            }
        })
        .unwrap_err();
        assert!(err.contains("Option<TenantId>"), "{err}");
    }

    #[test]
    fn rejects_association_flag_on_column() {
        let err = check(parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: i64,
                #[model(eager)]
                customer_id: i64,
            }
        })
        .unwrap_err();
        assert!(err.contains("`eager` can only be used"), "{err}");
    }

    #[test]
    fn rejects_to_many_without_remote_column() {
        let err = check(parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: i64,
                lines: RelatedMany<Line>,
            }
        })
        .unwrap_err();
        assert!(err.contains("remote_column"), "{err}");
    }

    #[test]
    fn rejects_tenant_modifier_without_tenant() {
        let err = check(parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: i64,
                #[model(no_filter_tenant)]
                tenant_id: Option<TenantId>,
            }
        })
        .unwrap_err();
        assert!(err.contains("requires `tenant`"), "{err}");
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = check(parse_quote! {
            struct Order {
                #[model(primary_key)]
                id: i64,
                #[model(column = "id")]
                other: i64,
            }
        })
        .unwrap_err();
        assert!(err.contains("duplicate column"), "{err}");
    }
}
