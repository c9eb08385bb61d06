//! Declarations of the two tools offered to the model.

use mizmaster_core::tool::{FRAMEWORK_DOCS_TOOL, SSE_DOCS_TOOL};
use mizmaster_core::ToolDefinition;

use crate::hard_deck::{self, ALL_CATEGORIES};

/// `get_framework_docs(framework, module_name, branch?)`
pub fn framework_docs() -> ToolDefinition {
    ToolDefinition {
        name: FRAMEWORK_DOCS_TOOL.into(),
        description: "Fetches RAW LUA SOURCE CODE from the official GitHub repositories (MOOSE or DML). \
             Use this to analyze function definitions and header comments directly. \
             Semantic Compression is applied to large files."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "framework": {
                    "type": "string",
                    "description": "Framework name ('MOOSE' or 'DML').",
                    "enum": ["MOOSE", "DML"]
                },
                "module_name": {
                    "type": "string",
                    "description": "Name of the module/class to search for (e.g., 'Airboss', 'cloneZones'). \
                                    The system performs a fuzzy search on the file tree."
                },
                "branch": {
                    "type": "string",
                    "description": "Required for MOOSE. 'STABLE' (Master) or 'DEVELOP'. Default is DEVELOP.",
                    "enum": ["STABLE", "DEVELOP"]
                }
            },
            "required": ["framework", "module_name"]
        }),
    }
}

/// `get_sse_docs(category)`
pub fn sse_docs() -> ToolDefinition {
    let categories: Vec<&str> = hard_deck::categories()
        .chain(std::iter::once(ALL_CATEGORIES))
        .collect();

    ToolDefinition {
        name: SSE_DOCS_TOOL.into(),
        description: "Fetches the Safe Standard Scripting Engine (SSE) Hard Deck Definitions. \
             Use this when the user needs to use standard DCS classes like Group, Unit, Timer, or Trigger. \
             Do not rely on training data for these classes."
            .into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "description": "The SSE Class category to retrieve.",
                    "enum": categories
                }
            },
            "required": ["category"]
        }),
    }
}

/// Both declarations, in the order they are offered.
pub fn all() -> Vec<ToolDefinition> {
    vec![framework_docs(), sse_docs()]
}
