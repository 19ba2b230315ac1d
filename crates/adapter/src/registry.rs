//! Tool registry: static tool definitions, argument validation and dispatch.
//!
//! Every tool declares its parameters once as [`ParamSpec`]s. The same declaration drives the
//! JSON Schema advertised in `tools/list` and the validation applied to `tools/call` arguments.
//! Validation completes before a handler runs: a rejected call never reaches Sonarr.

use crate::error::{AdapterError, ToolError};
use crate::tools::ToolContext;
use chrono::NaiveDate;
use futures::future::BoxFuture;
use rmcp::model::{JsonObject, Tool};
use serde_json::{Map, Value, json};
use sonarr_mcp_upstream::Method;
use sonarr_mcp_upstream::semantics::annotations_for_method;
use std::collections::HashMap;
use std::sync::Arc;

/// Calendar date format accepted by date parameters.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Integer,
    Boolean,
    String,
    /// Calendar date in `YYYY-MM-DD` form.
    Date,
}

impl ParamType {
    fn json_type(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::String | Self::Date => "string",
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::String => "a non-empty string",
            Self::Date => "a date in YYYY-MM-DD form",
        }
    }
}

/// Declaration of one tool parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub description: &'static str,
}

impl ParamSpec {
    #[must_use]
    pub fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            default: None,
            minimum: None,
            maximum: None,
            description,
        }
    }

    #[must_use]
    pub fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty, description)
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn with_minimum(mut self, minimum: i64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    #[must_use]
    pub fn with_maximum(mut self, maximum: i64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    fn schema(&self) -> Value {
        let mut schema = json!({
            "type": self.ty.json_type(),
            "description": self.description,
        });
        if self.ty == ParamType::Date {
            schema["format"] = json!("date");
        }
        if self.ty == ParamType::String {
            schema["minLength"] = json!(1);
        }
        if let Some(min) = self.minimum {
            schema["minimum"] = json!(min);
        }
        if let Some(max) = self.maximum {
            schema["maximum"] = json!(max);
        }
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }

    /// Coerce a raw argument into the canonical JSON form for this parameter.
    fn coerce(&self, raw: &Value) -> std::result::Result<Value, String> {
        let mismatch = || format!("{}: expected {}, got {raw}", self.name, self.ty.expected());
        match self.ty {
            ParamType::Integer => {
                let n = match raw {
                    Value::Number(n) => n.as_i64().or_else(|| {
                        n.as_f64()
                            .filter(|f| f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0)
                            .map(|f| f as i64)
                    }),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(mismatch)?;
                if let Some(min) = self.minimum
                    && n < min
                {
                    return Err(format!("{}: must be >= {min}, got {n}", self.name));
                }
                if let Some(max) = self.maximum
                    && n > max
                {
                    return Err(format!("{}: must be <= {max}, got {n}", self.name));
                }
                Ok(json!(n))
            }
            ParamType::Boolean => match raw {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },
            ParamType::String => match raw {
                Value::String(s) if !s.trim().is_empty() => Ok(Value::String(s.clone())),
                _ => Err(mismatch()),
            },
            ParamType::Date => {
                let s = raw.as_str().ok_or_else(mismatch)?;
                let date = NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                    .map_err(|_| mismatch())?;
                Ok(Value::String(date.format(DATE_FORMAT).to_string()))
            }
        }
    }
}

/// Validated, coerced arguments of a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    #[must_use]
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.str(name)
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
    }

    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if the argument is absent.
    pub fn require_i64(&self, name: &str) -> std::result::Result<i64, ToolError> {
        self.i64(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("{name}: is required")))
    }

    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if the argument is absent.
    pub fn require_str(&self, name: &str) -> std::result::Result<&str, ToolError> {
        self.str(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("{name}: is required")))
    }
}

pub type ToolHandler =
    fn(ToolContext, Arguments) -> BoxFuture<'static, std::result::Result<Value, ToolError>>;

/// Static description of one exposed tool.
pub struct ToolDefinition {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// HTTP method of the Sonarr call that carries the tool's effect.
    pub method: Method,
    pub params: Vec<ParamSpec>,
    pub handler: ToolHandler,
}

impl ToolDefinition {
    /// JSON Schema for the tool's `inputSchema`.
    #[must_use]
    pub fn input_schema(&self) -> JsonObject {
        let mut properties = Map::new();
        let mut required: Vec<&str> = Vec::new();
        for param in &self.params {
            properties.insert(param.name.to_string(), param.schema());
            if param.required && param.default.is_none() {
                required.push(param.name);
            }
        }

        let mut schema = JsonObject::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        schema.insert("additionalProperties".into(), json!(false));
        schema
    }

    #[must_use]
    pub fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(self.name, self.description, Arc::new(self.input_schema()));
        tool.title = Some(self.title.to_string());
        tool.annotations = Some(annotations_for_method(&self.method, Some(self.title)));
        tool
    }

    /// Validate and coerce raw call arguments.
    ///
    /// `null` counts as absent. Defaults are applied after coercion. All problems are reported
    /// together.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] describing every rejected argument.
    pub fn validate(&self, raw: Option<&JsonObject>) -> std::result::Result<Arguments, ToolError> {
        let empty = JsonObject::new();
        let raw = raw.unwrap_or(&empty);
        let mut problems: Vec<String> = Vec::new();

        let mut unknown: Vec<&str> = raw
            .keys()
            .map(String::as_str)
            .filter(|k| !self.params.iter().any(|p| p.name == *k))
            .collect();
        unknown.sort_unstable();
        for name in unknown {
            problems.push(format!("{name}: unknown argument"));
        }

        let mut out = Map::new();
        for param in &self.params {
            match raw.get(param.name).filter(|v| !v.is_null()) {
                Some(value) => match param.coerce(value) {
                    Ok(v) => {
                        out.insert(param.name.to_string(), v);
                    }
                    Err(problem) => problems.push(problem),
                },
                None => {
                    if let Some(default) = &param.default {
                        out.insert(param.name.to_string(), default.clone());
                    } else if param.required {
                        problems.push(format!("{}: is required", param.name));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(Arguments(out))
        } else {
            Err(ToolError::InvalidArguments(problems.join("; ")))
        }
    }
}

/// Immutable set of tools, built once at startup and shared by every session.
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] if two tools share a name.
    pub fn new(tools: Vec<ToolDefinition>) -> crate::error::Result<Self> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            if index.insert(tool.name, i).is_some() {
                return Err(AdapterError::Config(format!(
                    "Duplicate tool name: {}",
                    tool.name
                )));
            }
        }
        Ok(Self { tools, index })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Tools in declaration order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDefinition::to_tool).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Look up, validate and run a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] or [`ToolError::InvalidArguments`] without touching
    /// Sonarr, or whatever the handler reports.
    pub async fn invoke(
        &self,
        ctx: &ToolContext,
        name: &str,
        arguments: Option<&JsonObject>,
    ) -> std::result::Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = tool.validate(arguments)?;
        (tool.handler)(ctx.clone(), args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: ToolContext, _args: Arguments) -> BoxFuture<'static, Result<Value, ToolError>> {
        Box::pin(async { Ok(json!({})) })
    }

    fn paging_tool() -> ToolDefinition {
        ToolDefinition {
            name: "paging",
            title: "Paging",
            description: "test tool",
            method: Method::GET,
            params: vec![
                ParamSpec::required("series_id", ParamType::Integer, "series"),
                ParamSpec::optional("page_size", ParamType::Integer, "size")
                    .with_default(json!(20))
                    .with_minimum(1)
                    .with_maximum(250),
                ParamSpec::optional("include_unknown", ParamType::Boolean, "flag")
                    .with_default(json!(false)),
                ParamSpec::optional("start_date", ParamType::Date, "start"),
                ParamSpec::optional("label", ParamType::String, "label"),
            ],
            handler: noop,
        }
    }

    fn obj(v: Value) -> JsonObject {
        v.as_object().cloned().expect("object literal")
    }

    #[test]
    fn schema_lists_required_bounds_and_defaults() {
        let schema = paging_tool().input_schema();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["required"], json!(["series_id"]));
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["properties"]["page_size"]["default"], json!(20));
        assert_eq!(schema["properties"]["page_size"]["maximum"], json!(250));
        assert_eq!(schema["properties"]["start_date"]["format"], json!("date"));
    }

    #[test]
    fn coerces_numeric_strings_and_integral_floats() {
        let tool = paging_tool();
        let args = tool
            .validate(Some(&obj(json!({"series_id": "42", "page_size": 50.0}))))
            .expect("valid");
        assert_eq!(args.i64("series_id"), Some(42));
        assert_eq!(args.i64("page_size"), Some(50));

        let args = tool
            .validate(Some(&obj(json!({"series_id": 7, "include_unknown": "TRUE"}))))
            .expect("valid");
        assert_eq!(args.bool("include_unknown"), Some(true));
    }

    #[test]
    fn applies_defaults_and_treats_null_as_absent() {
        let args = paging_tool()
            .validate(Some(&obj(json!({"series_id": 1, "page_size": null}))))
            .expect("valid");
        assert_eq!(args.i64("page_size"), Some(20));
        assert_eq!(args.bool("include_unknown"), Some(false));
        assert_eq!(args.str("label"), None);
    }

    #[test]
    fn rejects_missing_unknown_and_mistyped_arguments_together() {
        let err = paging_tool()
            .validate(Some(&obj(json!({"page_size": 0, "bogus": 1, "start_date": "2024-13-01"}))))
            .expect_err("invalid");
        let ToolError::InvalidArguments(msg) = err else {
            panic!("expected InvalidArguments, got {err:?}");
        };
        assert!(msg.contains("bogus: unknown argument"), "{msg}");
        assert!(msg.contains("series_id: is required"), "{msg}");
        assert!(msg.contains("page_size: must be >= 1"), "{msg}");
        assert!(msg.contains("start_date"), "{msg}");
    }

    #[test]
    fn rejects_fractional_integers_and_empty_strings() {
        let tool = paging_tool();
        assert!(tool.validate(Some(&obj(json!({"series_id": 1.5})))).is_err());
        assert!(
            tool.validate(Some(&obj(json!({"series_id": 1, "label": "  "}))))
                .is_err()
        );
        assert!(
            tool.validate(Some(&obj(json!({"series_id": true}))))
                .is_err()
        );
    }

    #[test]
    fn dates_are_normalized() {
        let args = paging_tool()
            .validate(Some(&obj(json!({"series_id": 1, "start_date": " 2024-02-29 "}))))
            .expect("valid leap day");
        assert_eq!(args.str("start_date"), Some("2024-02-29"));
        assert_eq!(
            args.date("start_date"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let Err(err) = ToolRegistry::new(vec![paging_tool(), paging_tool()]) else {
            panic!("duplicate names must be rejected");
        };
        assert!(err.to_string().contains("Duplicate tool name: paging"));
    }

    #[test]
    fn tool_annotations_follow_method() {
        let tool = paging_tool().to_tool();
        let ann = tool.annotations.expect("annotations");
        assert_eq!(ann.read_only_hint, Some(true));
        assert_eq!(tool.title.as_deref(), Some("Paging"));
    }
}
