//! Parameter and output records.

use std::collections::HashMap;

use serde_json::Value;

use crate::facts::arm::{is_expression, is_secure_type, metadata_description, normalize_type, Template};
use crate::facts::model::{Constraints, DefaultKind, Output, Parameter};
use crate::rpc::protocol::{Metadata, SymbolMetadata};

/// Descriptions reported by the compiler, keyed by symbol name. Later
/// entries win.
fn descriptions(symbols: &[SymbolMetadata]) -> HashMap<&str, Option<&str>> {
    symbols
        .iter()
        .map(|s| (s.name.as_str(), s.description.as_deref()))
        .collect()
}

fn describe(reported: &HashMap<&str, Option<&str>>, name: &str, definition: &Value) -> Option<String> {
    reported
        .get(name)
        .copied()
        .flatten()
        .or_else(|| metadata_description(definition))
        .map(str::to_string)
}

/// One record per declared parameter, sorted by name.
pub fn build_parameters(template: &Template, metadata: &Metadata) -> Vec<Parameter> {
    let reported = descriptions(&metadata.parameters);

    let mut parameters: Vec<Parameter> = template
        .parameters()
        .map(|(name, definition)| {
            let declared_type = definition.get("type");
            let default = definition.get("defaultValue");

            let default_kind = match default {
                None => DefaultKind::None,
                Some(value) if is_expression(value) => DefaultKind::Expression,
                Some(_) => DefaultKind::Literal,
            };
            let default_expression = match default_kind {
                DefaultKind::Expression => default.and_then(Value::as_str).map(str::to_string),
                _ => None,
            };

            Parameter {
                name: name.clone(),
                param_type: normalize_type(declared_type),
                required: default.is_none(),
                default_kind,
                default: match default_kind {
                    DefaultKind::Literal => default.cloned(),
                    _ => None,
                },
                default_expression,
                constraints: build_constraints(definition),
                description: describe(&reported, name, definition),
                sensitive: is_secure_type(declared_type).then_some(true),
            }
        })
        .collect();

    parameters.sort_by(|a, b| a.name.cmp(&b.name));
    parameters
}

/// Constraints present on a declaration, or `None` if it has none.
pub fn build_constraints(definition: &Value) -> Option<Constraints> {
    let definition = definition.as_object()?;
    let field = |key: &str| definition.get(key).cloned();

    let constraints = Constraints {
        allowed: definition
            .get("allowedValues")
            .and_then(Value::as_array)
            .cloned(),
        min_value: field("minValue"),
        max_value: field("maxValue"),
        min_length: field("minLength"),
        max_length: field("maxLength"),
        pattern: field("pattern"),
    };

    (!constraints.is_empty()).then_some(constraints)
}

/// One record per declared output, sorted by name.
pub fn build_outputs(template: &Template, metadata: &Metadata) -> Vec<Output> {
    let reported = descriptions(&metadata.outputs);

    let mut outputs: Vec<Output> = template
        .outputs()
        .map(|(name, definition)| Output {
            name: name.clone(),
            output_type: normalize_type(definition.get("type")),
            description: describe(&reported, name, definition),
        })
        .collect();

    outputs.sort_by(|a, b| a.name.cmp(&b.name));
    outputs
}
