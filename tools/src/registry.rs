//! Tool Registry
//!
//! Maps a tool name to a typed callable with a declared parameter schema.
//! The registry is the only dispatch point for model-requested tool calls;
//! lookups are validated before invocation instead of calling into a
//! string-keyed function table.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use stockagent_core::llm::ToolDeclaration;

/// A callable the completion service may request by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Wire name of the tool.
    fn name(&self) -> &str;
    /// Description sent to the model.
    fn description(&self) -> &str;
    /// JSON schema of the argument object.
    fn parameters(&self) -> Value;
    /// Execute with already-parsed arguments.
    async fn invoke(&self, arguments: Value) -> Result<Value>;
}

/// Name → tool map for one query category.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    /// Register a tool under its own name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(tool = tool.name(), "registered tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations for every registered tool, in name order.
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools
            .values()
            .map(|tool| ToolDeclaration::function(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "returns its arguments"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn invoke(&self, arguments: Value) -> Result<Value> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn test_register_and_invoke() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.len(), 1);

        let tool = registry.get("echo").unwrap();
        let result = tool.invoke(json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[test]
    fn test_unknown_tool_lookup() {
        let registry = ToolRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_declarations_shape() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let decls = registry.declarations();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].kind, "function");
        assert_eq!(decls[0].function.name, "echo");
    }
}
