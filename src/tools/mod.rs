pub mod executor;

pub use executor::*;

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::json;

use crate::error::{Result, ShoppingError};
use crate::gateway::{FunctionDefinition, ToolCallRequest, ToolDefinition};

/// The closed set of tools this service can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    SearchGoogleShopping,
}

impl ToolKind {
    pub const ALL: &'static [ToolKind] = &[ToolKind::SearchGoogleShopping];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::SearchGoogleShopping => "search_google_shopping",
        }
    }

    /// Schema declared to the remote assistant
    pub fn definition(self) -> ToolDefinition {
        match self {
            ToolKind::SearchGoogleShopping => ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: self.name().to_string(),
                    description: "Retrieve Google Shopping search results for a given query."
                        .to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "query": {
                                "type": "string",
                                "description": "The search query for finding products on Google Shopping."
                            }
                        },
                        "required": ["query"]
                    }),
                },
            },
        }
    }
}

/// A tool call decoded into typed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    SearchGoogleShopping { query: String },
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

/// Registry mapping tool names to the tools this service runs
pub struct ToolRegistry {
    tools: HashMap<&'static str, ToolKind>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: ToolKind::ALL.iter().map(|kind| (kind.name(), *kind)).collect(),
        }
    }

    /// Definitions of every registered tool, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut kinds: Vec<_> = self.tools.values().copied().collect();
        kinds.sort_by_key(|k| k.name());
        kinds.into_iter().map(ToolKind::definition).collect()
    }

    pub fn resolve(&self, name: &str) -> Option<ToolKind> {
        self.tools.get(name).copied()
    }

    /// Check that every tool the assistant declares can be executed here.
    /// Run at startup so a mismatch never surfaces mid-conversation.
    pub fn validate_declared(&self, declared: &[ToolDefinition]) -> Result<()> {
        let mut seen = HashSet::new();
        for tool in declared {
            let name = tool.function.name.as_str();
            if !seen.insert(name) {
                return Err(ShoppingError::ToolSchemaMismatch(format!(
                    "tool declared twice: {}",
                    name
                )));
            }
            let kind = self.resolve(name).ok_or_else(|| {
                ShoppingError::ToolSchemaMismatch(format!("no handler for declared tool: {}", name))
            })?;
            if kind.definition().function.parameters != tool.function.parameters {
                return Err(ShoppingError::ToolSchemaMismatch(format!(
                    "parameters of {} differ from the handler's schema",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Decode a pending call into a typed invocation
    pub fn parse(&self, call: &ToolCallRequest) -> Result<ToolInvocation> {
        let name = call.function.name.as_str();
        let kind = self
            .resolve(name)
            .ok_or_else(|| ShoppingError::UnknownTool(name.to_string()))?;

        match kind {
            ToolKind::SearchGoogleShopping => {
                let args: SearchArgs = serde_json::from_str(&call.function.arguments).map_err(|e| {
                    ShoppingError::InvalidToolArguments {
                        tool: name.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(ToolInvocation::SearchGoogleShopping { query: args.query })
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
