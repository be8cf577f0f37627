//! Document validation against a [`Schema`].
//!
//! All violations are collected; an empty result means the document is
//! valid and safe to execute.

use std::collections::{HashMap, HashSet};

use crate::ast::{Document, Field, OperationDefinition, OperationKind, TypeRef};
use crate::error::{ValidationError, ValidationRule};
use crate::schema::{FieldDef, NamedType, Schema, SUBSCRIPTION_TYPE};
use crate::span::Span;
use crate::values::coerce_literal;

const TYPENAME: &str = "__typename";

/// Validate `document` against `schema`, returning every violation found.
pub fn validate(schema: &Schema, document: &Document) -> Vec<ValidationError> {
    let mut validator = Validator {
        schema,
        errors: Vec::new(),
    };
    validator.check_document(document);
    validator.errors
}

struct Validator<'a> {
    schema: &'a Schema,
    errors: Vec<ValidationError>,
}

impl<'a> Validator<'a> {
    fn report(&mut self, rule: ValidationRule, message: impl Into<String>, span: Span) {
        self.errors.push(ValidationError::new(rule, message, span));
    }

    fn check_document(&mut self, document: &Document) {
        if document.definitions.is_empty() {
            self.report(
                ValidationRule::ExecutableDefinitions,
                "document does not contain an operation",
                Span::default(),
            );
            return;
        }

        let multiple = document.definitions.len() > 1;
        let mut names = HashSet::new();
        for operation in document.operations() {
            match &operation.name {
                None if multiple => self.report(
                    ValidationRule::LoneAnonymousOperation,
                    "this anonymous operation must be the only defined operation",
                    operation.span,
                ),
                Some(name) if !names.insert(name.as_str()) => self.report(
                    ValidationRule::UniqueOperationNames,
                    format!("there can be only one operation named '{}'", name.value),
                    name.span,
                ),
                _ => {}
            }
            self.check_operation(operation);
        }
    }

    fn check_operation(&mut self, operation: &OperationDefinition) {
        if operation.kind != OperationKind::Subscription {
            self.report(
                ValidationRule::SupportedOperationType,
                format!("schema does not support {} operations", operation.kind),
                operation.span,
            );
            return;
        }

        if let Some(extra) = operation.selection_set.fields.get(1) {
            let message = match &operation.name {
                Some(name) => format!(
                    "subscription '{}' must select only one top level field",
                    name.value
                ),
                None => "anonymous subscription must select only one top level field".to_string(),
            };
            self.report(ValidationRule::SingleRootField, message, extra.span);
        }

        let schema = self.schema;
        for field in &operation.selection_set.fields {
            if field.name.value == TYPENAME {
                continue;
            }
            match schema.subscription_field(&field.name.value) {
                Some(def) => {
                    self.check_arguments(SUBSCRIPTION_TYPE, field, def);
                    self.check_selection(field, &def.ty);
                }
                None => self.report(
                    ValidationRule::KnownFields,
                    format!(
                        "cannot query field '{}' on type '{}'",
                        field.name.value, SUBSCRIPTION_TYPE
                    ),
                    field.name.span,
                ),
            }
        }

        self.check_variables(operation);
    }

    fn check_arguments(&mut self, parent: &str, field: &Field, def: &FieldDef) {
        for argument in &field.arguments {
            let Some(arg_def) = def.argument(&argument.name.value) else {
                self.report(
                    ValidationRule::KnownArguments,
                    format!(
                        "unknown argument '{}' on field '{}.{}'",
                        argument.name.value, parent, def.name
                    ),
                    argument.name.span,
                );
                continue;
            };
            if let Err(e) = coerce_literal(self.schema, &argument.value.value, &arg_def.ty, None) {
                self.report(
                    ValidationRule::ArgumentTypes,
                    format!("argument '{}' has an invalid value: {}", arg_def.name, e),
                    argument.value.span,
                );
            }
        }

        for arg_def in def.arguments.iter().filter(|a| a.is_required()) {
            if !field.arguments.iter().any(|a| a.name.value == arg_def.name) {
                self.report(
                    ValidationRule::RequiredArguments,
                    format!(
                        "field '{}' argument '{}' of type '{}' is required but not provided",
                        def.name, arg_def.name, arg_def.ty
                    ),
                    field.name.span,
                );
            }
        }
    }

    fn check_selection(&mut self, field: &Field, ty: &TypeRef) {
        let schema = self.schema;
        match schema.named_type(ty.base_name()) {
            Some(NamedType::Object(object)) => {
                let Some(selection) = &field.selection_set else {
                    self.report(
                        ValidationRule::LeafSelections,
                        format!(
                            "field '{}' of type '{}' must have a selection of subfields",
                            field.name.value, ty
                        ),
                        field.span,
                    );
                    return;
                };
                for sub in &selection.fields {
                    if sub.name.value == TYPENAME {
                        continue;
                    }
                    match object.field(&sub.name.value) {
                        Some(def) => {
                            self.check_arguments(&object.name, sub, def);
                            self.check_selection(sub, &def.ty);
                        }
                        None => self.report(
                            ValidationRule::KnownFields,
                            format!(
                                "cannot query field '{}' on type '{}'",
                                sub.name.value, object.name
                            ),
                            sub.name.span,
                        ),
                    }
                }
            }
            Some(NamedType::Scalar(_)) | Some(NamedType::Enum(_)) => {
                if let Some(selection) = &field.selection_set {
                    self.report(
                        ValidationRule::LeafSelections,
                        format!(
                            "field '{}' must not have a selection since type '{}' has no subfields",
                            field.name.value, ty
                        ),
                        selection.span,
                    );
                }
            }
            None => {}
        }
    }

    fn check_variables(&mut self, operation: &OperationDefinition) {
        let defined: HashMap<&str, Span> = operation
            .variables
            .iter()
            .map(|v| (v.name.as_str(), v.name.span))
            .collect();

        let mut used = Vec::new();
        for field in &operation.selection_set.fields {
            collect_field_variables(field, &mut used);
        }

        let mut seen = HashSet::new();
        for (name, span) in &used {
            if !defined.contains_key(name) && seen.insert(*name) {
                self.report(
                    ValidationRule::DefinedVariables,
                    format!("variable '${}' is not defined", name),
                    *span,
                );
            }
        }

        for definition in &operation.variables {
            let name = definition.name.as_str();
            if !used.iter().any(|(n, _)| *n == name) {
                self.report(
                    ValidationRule::UsedVariables,
                    format!("variable '${}' is never used", name),
                    definition.name.span,
                );
            }
        }
    }
}

fn collect_field_variables<'f>(field: &'f Field, out: &mut Vec<(&'f str, Span)>) {
    for argument in &field.arguments {
        let mut names = Vec::new();
        argument.value.value.collect_variables(&mut names);
        out.extend(names.into_iter().map(|n| (n, argument.value.span)));
    }
    if let Some(selection) = &field.selection_set {
        for sub in &selection.fields {
            collect_field_variables(sub, out);
        }
    }
}
