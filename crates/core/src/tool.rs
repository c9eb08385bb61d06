//! Tool contract: what the model may ask for and how requests are answered.
//!
//! The model sees exactly two tools. Their arguments arrive as untrusted JSON
//! and are coerced into the tagged [`ToolRequest`] union before anything is
//! dispatched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ToolError;

/// Name of the documentation-repository tool.
pub const FRAMEWORK_DOCS_TOOL: &str = "get_framework_docs";

/// Name of the hard-deck lookup tool.
pub const SSE_DOCS_TOOL: &str = "get_sse_docs";

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model inside a response chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call ID assigned by the model (may be empty for some backends)
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// The answer to one tool call, fed back to the model on the next turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub call_id: String,
    pub name: String,
    pub output: String,
}

/// Scripting frameworks with a documentation repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Framework {
    Moose,
    Dml,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Moose => "MOOSE",
            Self::Dml => "DML",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MOOSE" => Ok(Self::Moose),
            "DML" => Ok(Self::Dml),
            other => Err(format!("unknown framework '{other}' (expected MOOSE or DML)")),
        }
    }
}

/// Arguments of `get_framework_docs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkDocsArgs {
    pub framework: Framework,
    pub module_name: String,
    /// Branch key as sent by the model (`STABLE`, `DEVELOP`); normalized later
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Arguments of `get_sse_docs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseDocsArgs {
    pub category: String,
}

/// A validated tool request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    FrameworkDocs(FrameworkDocsArgs),
    SseDocs(SseDocsArgs),
}

/// Untyped shape used only to read the model's JSON before validation.
#[derive(Deserialize)]
struct RawFrameworkArgs {
    framework: String,
    module_name: String,
    #[serde(default)]
    branch: Option<String>,
}

impl ToolRequest {
    /// Validate a model-issued call into a typed request.
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool_name: call.name.clone(),
            reason,
        };

        match call.name.as_str() {
            FRAMEWORK_DOCS_TOOL => {
                let raw: RawFrameworkArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| invalid(e.to_string()))?;
                let framework = raw.framework.parse::<Framework>().map_err(invalid)?;
                let module_name = raw.module_name.trim().to_string();
                if module_name.is_empty() {
                    return Err(invalid("module_name must not be empty".into()));
                }
                let branch = raw
                    .branch
                    .map(|b| b.trim().to_string())
                    .filter(|b| !b.is_empty());
                Ok(Self::FrameworkDocs(FrameworkDocsArgs {
                    framework,
                    module_name,
                    branch,
                }))
            }
            SSE_DOCS_TOOL => {
                let args: SseDocsArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| invalid(e.to_string()))?;
                let category = args.category.trim().to_string();
                if category.is_empty() {
                    return Err(invalid("category must not be empty".into()));
                }
                Ok(Self::SseDocs(SseDocsArgs { category }))
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// The tool name this request answers to.
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::FrameworkDocs(_) => FRAMEWORK_DOCS_TOOL,
            Self::SseDocs(_) => SSE_DOCS_TOOL,
        }
    }

    /// Normalized dedup key: `FRAMEWORK:MODULE:BRANCH` or `SSE:CATEGORY`.
    pub fn fingerprint(&self) -> String {
        match self {
            Self::FrameworkDocs(args) => format!(
                "{}:{}:{}",
                args.framework,
                args.module_name,
                args.branch.as_deref().unwrap_or("")
            )
            .to_uppercase(),
            Self::SseDocs(args) => format!("SSE:{}", args.category).to_uppercase(),
        }
    }

    /// Short subject for status labels ("SPAWN", "Group").
    pub fn subject(&self) -> &str {
        match self {
            Self::FrameworkDocs(args) => &args.module_name,
            Self::SseDocs(args) => &args.category,
        }
    }
}

/// Answers validated tool requests.
///
/// Implementations must never fail: every problem is returned as text so the
/// model can react to it.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Declarations sent to the model at session creation.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Resolve one request into tool-response text.
    async fn dispatch(&self, request: &ToolRequest) -> String;
}
