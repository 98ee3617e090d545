//! Tool Input Schemas
//!
//! Typed parameter declarations for each tool, plus validation of the
//! model-supplied arguments before a capability ever runs. Models frequently
//! emit numbers as strings, so numeric kinds coerce from numeric strings;
//! everything else is strict.

use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

/// Ordered parameter schema for one tool.
#[derive(Clone, Debug, Default)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required: true,
            default: None,
            description: description.into(),
        });
        self
    }

    pub fn optional(
        mut self,
        name: impl Into<String>,
        kind: ParamKind,
        description: impl Into<String>,
        default: Value,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            kind,
            required: false,
            default: Some(default),
            description: description.into(),
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// JSON-schema object in the function-calling format the model expects.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required: Vec<Value> = Vec::new();

        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".to_string(), Value::from(param.kind.json_type()));
            prop.insert(
                "description".to_string(),
                Value::from(param.description.clone()),
            );
            if let Some(ref default) = param.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::from("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(schema)
    }

    /// Validate and normalize model-supplied arguments.
    ///
    /// Rejects unknown parameters, missing required parameters, and values of
    /// the wrong kind. Fills in defaults for absent optional parameters.
    /// Returns the normalized argument map on success, an explanation on
    /// failure; the caller decides how to surface it.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<Map<String, Value>, String> {
        for key in args.keys() {
            if !self.params.iter().any(|p| &p.name == key) {
                return Err(format!("unknown parameter '{}'", key));
            }
        }

        let missing: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required && !args.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(format!(
                "missing required parameter(s): {}",
                missing.join(", ")
            ));
        }

        let mut normalized = Map::new();
        for param in &self.params {
            match args.get(&param.name) {
                Some(value) => {
                    let coerced = coerce(value, param.kind).ok_or_else(|| {
                        format!(
                            "parameter '{}' expects {}, got {}",
                            param.name,
                            param.kind.json_type(),
                            type_name(value)
                        )
                    })?;
                    normalized.insert(param.name.clone(), coerced);
                }
                None => {
                    if let Some(ref default) = param.default {
                        normalized.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(normalized)
    }
}

/// Coerce a value to the declared kind. Numeric strings are accepted for
/// numeric kinds; anything else of the wrong shape is rejected.
fn coerce(value: &Value, kind: ParamKind) -> Option<Value> {
    match kind {
        ParamKind::String => value.as_str().map(Value::from),
        ParamKind::Number => match value {
            Value::Number(_) => Some(value.clone()),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::from),
            _ => None,
        },
        ParamKind::Integer => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::from(i))
                } else {
                    // Accept whole floats like 3.0, reject anything lossy.
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| Value::from(f as i64))
                }
            }
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().map(Value::from).or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| Value::from(f as i64))
                })
            }
            _ => None,
        },
        ParamKind::Boolean => match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::from(true)),
                "false" => Some(Value::from(false)),
                _ => None,
            },
            _ => None,
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_schema() -> InputSchema {
        InputSchema::new()
            .required("symbol", ParamKind::String, "Crypto symbol")
            .required("quantity", ParamKind::Number, "Amount to trade")
            .optional(
                "order_type",
                ParamKind::String,
                "market or limit",
                json!("market"),
            )
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_valid_arguments_pass_with_defaults() {
        let normalized = order_schema()
            .validate(&args(json!({"symbol": "BTC/USD", "quantity": 0.1})))
            .unwrap();
        assert_eq!(normalized["symbol"], "BTC/USD");
        assert_eq!(normalized["quantity"], 0.1);
        assert_eq!(normalized["order_type"], "market");
    }

    #[test]
    fn test_missing_required_rejected() {
        let err = order_schema()
            .validate(&args(json!({"symbol": "BTC/USD"})))
            .unwrap_err();
        assert!(err.contains("quantity"));
    }

    #[test]
    fn test_missing_required_lists_all() {
        let err = order_schema().validate(&args(json!({}))).unwrap_err();
        assert!(err.contains("symbol"));
        assert!(err.contains("quantity"));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = order_schema()
            .validate(&args(json!({
                "symbol": "BTC/USD", "quantity": 1, "transact_time": "now"
            })))
            .unwrap_err();
        assert!(err.contains("transact_time"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = order_schema()
            .validate(&args(json!({"symbol": 42, "quantity": 1})))
            .unwrap_err();
        assert!(err.contains("symbol"));
        assert!(err.contains("string"));
    }

    #[test]
    fn test_numeric_string_coerced() {
        let normalized = order_schema()
            .validate(&args(json!({"symbol": "BTC/USD", "quantity": "0.25"})))
            .unwrap();
        assert_eq!(normalized["quantity"], 0.25);
    }

    #[test]
    fn test_integer_accepts_whole_floats_only() {
        let schema = InputSchema::new().required("limit", ParamKind::Integer, "count");
        let ok = schema.validate(&args(json!({"limit": 3.0}))).unwrap();
        assert_eq!(ok["limit"], 3);
        let ok = schema.validate(&args(json!({"limit": "14"}))).unwrap();
        assert_eq!(ok["limit"], 14);
        assert!(schema.validate(&args(json!({"limit": 2.5}))).is_err());
    }

    #[test]
    fn test_to_json_shape() {
        let schema = order_schema().to_json();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["symbol"]["type"], "string");
        assert_eq!(schema["properties"]["order_type"]["default"], "market");
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(required, vec!["symbol", "quantity"]);
    }
}
