//! The tool interface (spec §6): how external data sources — market
//! quotes, filings, macro series, web search — are registered with the
//! engine and invoked by the `StepExecutor`.
//!
//! A tool is a pure function from validated parameters to a
//! JSON-serializable value or an error; the host adapts whatever async
//! transport the concrete vendor binding needs (spec's "external
//! collaborator" framing — concrete vendor bindings live outside this
//! crate, e.g. in `finance-agent`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors a tool invocation can produce. The `StepExecutor` always
/// downgrades these into `StepResult { success: false, error: .. }` —
/// they never propagate past `ToolRegistry::invoke`.
#[derive(Debug, Error, Clone)]
pub enum ToolError {
    #[error("tool '{0}' is not registered")]
    NotFound(String),

    #[error("unknown parameter '{parameter}' for tool '{tool}'")]
    UnknownParameter { tool: String, parameter: String },

    #[error("missing required parameter '{parameter}' for tool '{tool}'")]
    MissingRequired { tool: String, parameter: String },

    #[error("parameter '{parameter}' for tool '{tool}' expected {expected}, got {got}")]
    TypeMismatch {
        tool: String,
        parameter: String,
        expected: &'static str,
        got: String,
    },

    #[error("tool '{tool}' execution failed: {message}")]
    ExecutionFailed { tool: String, message: String },
}

/// The declared type of a single parameter. Intentionally a small,
/// closed set (spec §6 only needs enough to type-check planner output;
/// it does not need full JSON Schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

/// One entry of a tool's declared parameter schema: `(name, type,
/// required, default, description)` per spec §6.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        ParamSpec {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            description: description.into(),
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        default: Value,
        description: impl Into<String>,
    ) -> Self {
        ParamSpec {
            name: name.into(),
            param_type,
            required: false,
            default: Some(default),
            description: description.into(),
        }
    }
}

/// The category a tool belongs to, for the planner's catalog (spec §6
/// lists these groupings) and for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    MarketQuotes,
    HistoricalPrices,
    FinancialStatements,
    KeyMetrics,
    AnalystRecommendations,
    InstitutionalHolders,
    OptionsOverview,
    CompanyNews,
    RegulatoryFilings,
    StructuredFilingData,
    InsiderTransactions,
    MacroeconomicIndicators,
    AnalystEstimates,
    WebSearch,
}

/// A registered external capability. Implementors hold whatever HTTP
/// client / credentials they need; `invoke` is async-from-the-host's
/// perspective even though the engine treats the result as a plain
/// value-or-error (the `invoke(parameters) -> (value, error)` contract
/// of spec §6, expressed as `Result` in Rust).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn category(&self) -> ToolCategory;
    fn parameter_schema(&self) -> &[ParamSpec];

    async fn invoke(&self, parameters: HashMap<String, Value>) -> Result<Value, ToolError>;
}

/// Validates `parameters` against `schema`, filling in declared defaults
/// for missing optional parameters and rejecting unknown ones (spec §6:
/// "validated against the tool's declared schema... unknown parameters
/// rejected").
pub fn validate_parameters(
    tool_name: &str,
    schema: &[ParamSpec],
    parameters: &HashMap<String, Value>,
) -> Result<HashMap<String, Value>, ToolError> {
    let known: HashMap<&str, &ParamSpec> = schema.iter().map(|p| (p.name.as_str(), p)).collect();

    for key in parameters.keys() {
        if !known.contains_key(key.as_str()) {
            return Err(ToolError::UnknownParameter {
                tool: tool_name.to_string(),
                parameter: key.clone(),
            });
        }
    }

    let mut validated = HashMap::with_capacity(schema.len());
    for spec in schema {
        match parameters.get(&spec.name) {
            Some(value) => {
                if !spec.param_type.matches(value) {
                    return Err(ToolError::TypeMismatch {
                        tool: tool_name.to_string(),
                        parameter: spec.name.clone(),
                        expected: spec.param_type.label(),
                        got: value.to_string(),
                    });
                }
                validated.insert(spec.name.clone(), value.clone());
            }
            None => {
                if spec.required {
                    return Err(ToolError::MissingRequired {
                        tool: tool_name.to_string(),
                        parameter: spec.name.clone(),
                    });
                }
                if let Some(default) = &spec.default {
                    validated.insert(spec.name.clone(), default.clone());
                }
            }
        }
    }

    Ok(validated)
}

/// Registry of tools available to the planner and the `StepExecutor`.
/// Immutable after startup (spec §5 "Tool registry: immutable after
/// startup; concurrent readers need no coordination").
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Registers a tool only if its constructor produced one. Used for
    /// tools whose credential is optional (spec §6: "Absence of an
    /// optional tool's credential must not fail engine startup; the tool
    /// is marked unavailable and excluded from the planner's catalog").
    pub fn register_if_available(&mut self, tool: Option<Arc<dyn Tool>>) {
        match tool {
            Some(tool) => self.register(tool),
            None => tracing::warn!("tool unavailable at startup (missing credential), skipping registration"),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Renders the tool catalog the planner prompt embeds: name,
    /// one-line description, parameter schema (spec §4.3 point 2).
    pub fn catalog_for_prompt(&self) -> String {
        let mut names: Vec<_> = self.tools.values().collect();
        names.sort_by(|a, b| a.name().cmp(b.name()));
        names
            .into_iter()
            .map(|tool| {
                let params = tool
                    .parameter_schema()
                    .iter()
                    .map(|p| {
                        format!(
                            "{}:{}{}",
                            p.name,
                            p.param_type.label(),
                            if p.required { "" } else { " (optional)" }
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("- {} — {} [{}]", tool.name(), tool.description(), params)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn invoke(
        &self,
        tool_name: &str,
        parameters: HashMap<String, Value>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;

        let validated = validate_parameters(tool_name, tool.parameter_schema(), &parameters)?;
        tool.invoke(validated).await
    }
}
