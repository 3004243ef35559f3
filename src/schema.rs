//! Metadata schema: declarative field specs and the validation layer that
//! types otherwise untyped caller input.
//!
//! A bundle's metadata contract is a list of [`MetadataSpec`] entries. The
//! run-bundle schema is the base set (name, description, tags, generated
//! bookkeeping fields) plus the run-specific set (`request_*` resource
//! fields and generated execution-result fields).
//!
//! [`validate`] and [`fill_missing`] are pure functions over their inputs:
//! no partial writes, no side effects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The declared type of a metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    StringList,
}

/// Rendering hint for a metadata field. Tagged by the schema and the
/// interpreter; applied by renderers via [`crate::format`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Formatting {
    #[default]
    None,

    /// Human duration units: s/m/h/d.
    Duration,

    /// Binary byte units: k/m/g/t.
    Size,

    /// ISO-like timestamp from epoch seconds.
    Date,
}

/// A typed metadata value, produced by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    StringList(Vec<String>),
}

impl MetadataValue {
    /// The empty/zero value for a declared type.
    pub fn default_for(value_type: ValueType) -> Self {
        match value_type {
            ValueType::String => Self::String(String::new()),
            ValueType::Integer => Self::Integer(0),
            ValueType::Float => Self::Float(0.0),
            ValueType::Boolean => Self::Boolean(false),
            ValueType::StringList => Self::StringList(Vec::new()),
        }
    }
}

/// One entry of a metadata schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSpec {
    pub name: String,
    pub value_type: ValueType,
    pub description: String,

    /// Generated fields are produced by the execution engine and can never
    /// appear in a caller-supplied update.
    pub generated: bool,

    pub formatting: Formatting,

    /// Closed enumeration of allowed string values, when set.
    pub choices: Option<Vec<String>>,
}

impl MetadataSpec {
    pub fn new(name: &str, value_type: ValueType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            description: description.to_string(),
            generated: false,
            formatting: Formatting::None,
            choices: None,
        }
    }

    /// Mark the field as engine-generated (not user-settable).
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn formatting(mut self, formatting: Formatting) -> Self {
        self.formatting = formatting;
        self
    }

    pub fn choices(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(ToString::to_string).collect());
        self
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Metadata validation failure: the full list of field errors.
///
/// Validation never partially accepts an update — either every proposed
/// field coerces, or the caller gets all the errors at once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("metadata validation failed on {} field(s)", errors.len())]
pub struct SchemaError {
    pub errors: Vec<FieldError>,
}

/// The base metadata schema shared by all bundle types.
pub fn base_specs() -> Vec<MetadataSpec> {
    vec![
        MetadataSpec::new("name", ValueType::String, "Short name of this bundle."),
        MetadataSpec::new(
            "description",
            ValueType::String,
            "Longer description of this bundle.",
        ),
        MetadataSpec::new("tags", ValueType::StringList, "Tags for search."),
        MetadataSpec::new(
            "created",
            ValueType::Integer,
            "Time when this bundle was created.",
        )
        .generated()
        .formatting(Formatting::Date),
        MetadataSpec::new(
            "data_size",
            ValueType::Integer,
            "Size (bytes) of this bundle's contents.",
        )
        .generated()
        .formatting(Formatting::Size),
        MetadataSpec::new(
            "failure_message",
            ValueType::String,
            "Why this bundle failed, when it did.",
        )
        .generated(),
    ]
}

/// The full metadata schema for a run bundle: base fields, resource request
/// fields, and generated execution-result fields.
pub fn run_specs() -> Vec<MetadataSpec> {
    let mut specs = base_specs();
    specs.extend([
        MetadataSpec::new(
            "request_docker_image",
            ValueType::String,
            "Which docker image to run in.",
        )
        .choices(&["codalab/ubuntu", "codalab/tensorflow"]),
        MetadataSpec::new(
            "request_time",
            ValueType::String,
            "Amount of time (e.g. 3, 3m, 3h, 3d) allowed for this run.",
        )
        .formatting(Formatting::Duration),
        MetadataSpec::new(
            "request_memory",
            ValueType::String,
            "Amount of memory (e.g. 3, 3k, 3m, 3g, 3t) allowed for this run.",
        )
        .formatting(Formatting::Size),
        MetadataSpec::new(
            "request_disk",
            ValueType::String,
            "Amount of disk space allowed for this run.",
        )
        .formatting(Formatting::Size),
        MetadataSpec::new(
            "request_cpus",
            ValueType::Integer,
            "Number of CPUs allowed for this run.",
        ),
        MetadataSpec::new(
            "request_gpus",
            ValueType::Integer,
            "Number of GPUs allowed for this run.",
        ),
        MetadataSpec::new(
            "request_queue",
            ValueType::String,
            "Submit the run to this job queue.",
        ),
        MetadataSpec::new(
            "request_priority",
            ValueType::Integer,
            "Job priority (higher is more important).",
        ),
        MetadataSpec::new(
            "request_network",
            ValueType::Boolean,
            "Whether to allow network access.",
        ),
        // Filled in by the execution engine as the run progresses.
        MetadataSpec::new(
            "actions",
            ValueType::StringList,
            "Actions (e.g. kill) performed on this run.",
        )
        .generated(),
        MetadataSpec::new(
            "time",
            ValueType::Float,
            "Amount of time (seconds) used by this run (total).",
        )
        .generated()
        .formatting(Formatting::Duration),
        MetadataSpec::new("time_user", ValueType::Float, "Amount of user time.")
            .generated()
            .formatting(Formatting::Duration),
        MetadataSpec::new("time_system", ValueType::Float, "Amount of system time.")
            .generated()
            .formatting(Formatting::Duration),
        MetadataSpec::new(
            "memory",
            ValueType::Float,
            "Amount of memory (bytes) used by this run.",
        )
        .generated()
        .formatting(Formatting::Size),
        MetadataSpec::new("disk_read", ValueType::Float, "Number of bytes read.")
            .generated()
            .formatting(Formatting::Size),
        MetadataSpec::new("disk_write", ValueType::Float, "Number of bytes written.")
            .generated()
            .formatting(Formatting::Size),
        MetadataSpec::new(
            "started",
            ValueType::Integer,
            "Time when this bundle started executing.",
        )
        .generated()
        .formatting(Formatting::Date),
        MetadataSpec::new(
            "last_updated",
            ValueType::Integer,
            "Time when information about this bundle was last updated.",
        )
        .generated()
        .formatting(Formatting::Date),
        MetadataSpec::new(
            "docker_image",
            ValueType::String,
            "Which docker image was used to run the process.",
        )
        .generated(),
        MetadataSpec::new("exitcode", ValueType::Integer, "Exitcode of the process.").generated(),
        MetadataSpec::new(
            "job_handle",
            ValueType::String,
            "Identifies the job handle (internal).",
        )
        .generated(),
        MetadataSpec::new(
            "remote",
            ValueType::String,
            "Where this job is/was run (internal).",
        )
        .generated(),
        MetadataSpec::new(
            "temp_dir",
            ValueType::String,
            "Temporary directory where the job is/was running (internal).",
        )
        .generated(),
    ]);
    specs
}

/// Rendering hint for a field, looked up in the given schema.
pub fn formatting_of(specs: &[MetadataSpec], field: &str) -> Formatting {
    specs
        .iter()
        .find(|s| s.name == field)
        .map_or(Formatting::None, |s| s.formatting)
}

/// Names of the fields a caller may set: everything not generated.
pub fn editable_fields(specs: &[MetadataSpec]) -> Vec<&str> {
    specs
        .iter()
        .filter(|s| !s.generated)
        .map(|s| s.name.as_str())
        .collect()
}

/// Validate a proposed metadata update against a schema.
///
/// Every key must name a known, non-generated field and its value must
/// coerce to the declared type (and land inside `choices` when one is set).
/// All failures are collected; on any failure nothing is accepted.
pub fn validate(
    specs: &[MetadataSpec],
    proposed: &serde_json::Map<String, serde_json::Value>,
) -> Result<BTreeMap<String, MetadataValue>, SchemaError> {
    let mut accepted = BTreeMap::new();
    let mut errors = Vec::new();

    for (key, value) in proposed {
        let Some(spec) = specs.iter().find(|s| s.name == *key) else {
            errors.push(FieldError {
                field: key.clone(),
                reason: "unknown field".to_string(),
            });
            continue;
        };

        if spec.generated {
            errors.push(FieldError {
                field: key.clone(),
                reason: "field is generated by the execution engine and cannot be set".to_string(),
            });
            continue;
        }

        match coerce(spec, value) {
            Ok(coerced) => {
                accepted.insert(key.clone(), coerced);
            }
            Err(reason) => errors.push(FieldError {
                field: key.clone(),
                reason,
            }),
        }
    }

    if errors.is_empty() {
        Ok(accepted)
    } else {
        Err(SchemaError { errors })
    }
}

/// Return a complete metadata mapping for every non-generated field:
/// `supplied`, then `defaults`, then the type default.
pub fn fill_missing(
    specs: &[MetadataSpec],
    supplied: &BTreeMap<String, MetadataValue>,
    defaults: &BTreeMap<String, MetadataValue>,
) -> BTreeMap<String, MetadataValue> {
    specs
        .iter()
        .filter(|spec| !spec.generated)
        .map(|spec| {
            let value = supplied
                .get(&spec.name)
                .or_else(|| defaults.get(&spec.name))
                .cloned()
                .unwrap_or_else(|| MetadataValue::default_for(spec.value_type));
            (spec.name.clone(), value)
        })
        .collect()
}

/// Type defaults for every generated field of a schema. The builder uses
/// this to initialize execution-result fields before the engine fills them.
pub fn generated_defaults(specs: &[MetadataSpec]) -> BTreeMap<String, MetadataValue> {
    specs
        .iter()
        .filter(|spec| spec.generated)
        .map(|spec| {
            (
                spec.name.clone(),
                MetadataValue::default_for(spec.value_type),
            )
        })
        .collect()
}

/// Coerce one JSON value to a spec's declared type.
///
/// Defined coercions: comma-separated string → list, numeric string →
/// integer/float, `"true"`/`"false"` → boolean. Natives of the declared
/// type pass through; integers are accepted for float fields.
fn coerce(spec: &MetadataSpec, value: &serde_json::Value) -> Result<MetadataValue, String> {
    use serde_json::Value;

    let coerced = match (spec.value_type, value) {
        (ValueType::String, Value::String(s)) => MetadataValue::String(s.clone()),

        (ValueType::Integer, Value::Number(n)) => match n.as_i64() {
            Some(i) => MetadataValue::Integer(i),
            None => return Err(format!("{n} is not an integer")),
        },
        (ValueType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => MetadataValue::Integer(i),
            Err(_) => return Err(format!("cannot parse {s:?} as an integer")),
        },

        (ValueType::Float, Value::Number(n)) => match n.as_f64() {
            Some(f) => MetadataValue::Float(f),
            None => return Err(format!("{n} is not a float")),
        },
        (ValueType::Float, Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(f) => MetadataValue::Float(f),
            Err(_) => return Err(format!("cannot parse {s:?} as a float")),
        },

        (ValueType::Boolean, Value::Bool(b)) => MetadataValue::Boolean(*b),
        (ValueType::Boolean, Value::String(s)) => match s.trim() {
            "true" => MetadataValue::Boolean(true),
            "false" => MetadataValue::Boolean(false),
            other => return Err(format!("cannot parse {other:?} as a boolean")),
        },

        (ValueType::StringList, Value::Array(items)) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => list.push(s.clone()),
                    other => return Err(format!("list element {other} is not a string")),
                }
            }
            MetadataValue::StringList(list)
        }
        (ValueType::StringList, Value::String(s)) => MetadataValue::StringList(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(ToString::to_string)
                .collect(),
        ),

        (expected, other) => {
            return Err(format!("expected {expected:?}, got {other}"));
        }
    };

    if let Some(choices) = &spec.choices
        && let MetadataValue::String(s) = &coerced
        && !choices.iter().any(|c| c == s)
    {
        return Err(format!(
            "{s:?} is not one of the allowed values: {}",
            choices.join(", ")
        ));
    }

    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn proposed(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn accepts_native_types() {
        let specs = run_specs();
        let accepted = validate(
            &specs,
            &proposed(&[
                ("name", json!("experiment-1")),
                ("request_cpus", json!(4)),
                ("request_network", json!(true)),
                ("tags", json!(["ml", "nlp"])),
            ]),
        )
        .unwrap();

        assert_eq!(
            accepted["name"],
            MetadataValue::String("experiment-1".to_string())
        );
        assert_eq!(accepted["request_cpus"], MetadataValue::Integer(4));
        assert_eq!(accepted["request_network"], MetadataValue::Boolean(true));
        assert_eq!(
            accepted["tags"],
            MetadataValue::StringList(vec!["ml".to_string(), "nlp".to_string()])
        );
    }

    #[test]
    fn coerces_strings() {
        let specs = run_specs();
        let accepted = validate(
            &specs,
            &proposed(&[
                ("request_cpus", json!("8")),
                ("request_network", json!("false")),
                ("tags", json!("a, b , c")),
            ]),
        )
        .unwrap();

        assert_eq!(accepted["request_cpus"], MetadataValue::Integer(8));
        assert_eq!(accepted["request_network"], MetadataValue::Boolean(false));
        assert_eq!(
            accepted["tags"],
            MetadataValue::StringList(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string()
            ])
        );
    }

    #[test]
    fn rejects_generated_field_by_name() {
        let specs = run_specs();
        let err = validate(&specs, &proposed(&[("exitcode", json!(0))])).unwrap_err();

        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].field, "exitcode");
        assert!(err.errors[0].reason.contains("generated"));
    }

    #[test]
    fn rejects_unknown_field() {
        let specs = run_specs();
        let err = validate(&specs, &proposed(&[("no_such_field", json!("x"))])).unwrap_err();

        assert_eq!(err.errors[0].field, "no_such_field");
        assert_eq!(err.errors[0].reason, "unknown field");
    }

    #[test]
    fn rejects_out_of_choices_value() {
        let specs = run_specs();
        let err = validate(
            &specs,
            &proposed(&[("request_docker_image", json!("somewhere/else"))]),
        )
        .unwrap_err();

        assert_eq!(err.errors[0].field, "request_docker_image");
        assert!(err.errors[0].reason.contains("allowed values"));
    }

    #[test]
    fn accepts_in_choices_value() {
        let specs = run_specs();
        let accepted = validate(
            &specs,
            &proposed(&[("request_docker_image", json!("codalab/ubuntu"))]),
        )
        .unwrap();

        assert_eq!(
            accepted["request_docker_image"],
            MetadataValue::String("codalab/ubuntu".to_string())
        );
    }

    #[test]
    fn rejects_uncoercible_value() {
        let specs = run_specs();
        let err = validate(&specs, &proposed(&[("request_cpus", json!("many"))])).unwrap_err();

        assert_eq!(err.errors[0].field, "request_cpus");
    }

    #[test]
    fn collects_all_errors_and_accepts_nothing() {
        let specs = run_specs();
        let err = validate(
            &specs,
            &proposed(&[
                ("exitcode", json!(1)),
                ("bogus", json!("y")),
                ("name", json!("fine")),
            ]),
        )
        .unwrap_err();

        // `name` was fine, but nothing is accepted when anything fails.
        assert_eq!(err.errors.len(), 2);
        let fields: Vec<_> = err.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"exitcode"));
        assert!(fields.contains(&"bogus"));
    }

    #[test]
    fn integer_accepted_for_float_field() {
        // `time` is generated, so use validate's coercion path indirectly.
        let spec = MetadataSpec::new("ratio", ValueType::Float, "");
        let accepted = validate(
            &[spec],
            &proposed(&[("ratio", json!(3))]),
        )
        .unwrap();

        assert_eq!(accepted["ratio"], MetadataValue::Float(3.0));
    }

    #[test]
    fn fill_missing_layers_supplied_defaults_then_type_default() {
        let specs = base_specs();
        let supplied = BTreeMap::from([(
            "name".to_string(),
            MetadataValue::String("mine".to_string()),
        )]);
        let defaults = BTreeMap::from([
            (
                "name".to_string(),
                MetadataValue::String("ignored".to_string()),
            ),
            (
                "description".to_string(),
                MetadataValue::String("from defaults".to_string()),
            ),
        ]);

        let filled = fill_missing(&specs, &supplied, &defaults);

        assert_eq!(filled["name"], MetadataValue::String("mine".to_string()));
        assert_eq!(
            filled["description"],
            MetadataValue::String("from defaults".to_string())
        );
        assert_eq!(filled["tags"], MetadataValue::StringList(vec![]));
        // Generated fields are not part of the filled set.
        assert!(!filled.contains_key("created"));
    }

    #[test]
    fn generated_defaults_are_empty_or_zero() {
        let specs = run_specs();
        let generated = generated_defaults(&specs);

        assert_eq!(generated["exitcode"], MetadataValue::Integer(0));
        assert_eq!(generated["time"], MetadataValue::Float(0.0));
        assert_eq!(generated["actions"], MetadataValue::StringList(vec![]));
        assert_eq!(
            generated["docker_image"],
            MetadataValue::String(String::new())
        );
        assert!(!generated.contains_key("request_cpus"));
    }

    #[test]
    fn editable_fields_exclude_generated() {
        let specs = run_specs();
        let editable = editable_fields(&specs);

        assert!(editable.contains(&"name"));
        assert!(editable.contains(&"request_memory"));
        assert!(!editable.contains(&"exitcode"));
        assert!(!editable.contains(&"started"));
    }

    #[test]
    fn formatting_lookup() {
        let specs = run_specs();
        assert_eq!(formatting_of(&specs, "request_time"), Formatting::Duration);
        assert_eq!(formatting_of(&specs, "memory"), Formatting::Size);
        assert_eq!(formatting_of(&specs, "started"), Formatting::Date);
        assert_eq!(formatting_of(&specs, "name"), Formatting::None);
        assert_eq!(formatting_of(&specs, "unknown"), Formatting::None);
    }
}
