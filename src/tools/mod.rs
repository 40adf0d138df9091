//! Local tool registry and dispatch
//!
//! Tools are a closed set registered once at startup; dispatch rejects
//! unknown names instead of failing deep in a call chain. Registered tools
//! are side-effect-limited by contract (the dispatcher imposes no
//! transactional semantics).

mod date;

use crate::{Error, Result};

/// Declaration advertised to the chat service for one tool
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    /// Tool name the model calls by
    pub name: &'static str,
    /// Human-readable description the model routes on
    pub description: &'static str,
    /// JSON schema for the arguments object
    pub parameters: serde_json::Value,
}

/// Handler signature for a registered tool
type ToolFn = fn(&serde_json::Value) -> Result<String>;

/// One registered tool: declaration plus handler
struct RegisteredTool {
    declaration: ToolDeclaration,
    handler: ToolFn,
}

/// Process-wide tool registry, read-only after startup
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Registry with the built-in tools
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self { tools: Vec::new() };
        registry.register(date::declaration(), date::invoke);
        registry
    }

    /// Empty registry (tests exercise dispatch against it)
    #[must_use]
    pub const fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    fn register(&mut self, declaration: ToolDeclaration, handler: ToolFn) {
        self.tools.push(RegisteredTool {
            declaration,
            handler,
        });
    }

    /// Declarations for every registered tool, in registration order
    #[must_use]
    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(|t| t.declaration.clone()).collect()
    }

    /// Invoke a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTool`] if `name` is not registered, or the
    /// tool's own error if the invocation fails.
    pub fn invoke(&self, name: &str, arguments: &serde_json::Value) -> Result<String> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.declaration.name == name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        tracing::debug!(tool = name, args = %arguments, "invoking tool");
        (tool.handler)(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_declares_the_date_tool() {
        let registry = ToolRegistry::builtin();
        let decls = registry.declarations();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "get_today_date");
        assert_eq!(decls[0].parameters["type"], "object");
    }

    #[test]
    fn invoke_dispatches_to_the_named_tool() {
        let registry = ToolRegistry::builtin();
        let result = registry
            .invoke("get_today_date", &serde_json::json!({}))
            .unwrap();
        assert!(result.starts_with("Today is "));
    }

    #[test]
    fn unknown_name_is_rejected_at_dispatch() {
        let registry = ToolRegistry::builtin();
        let err = registry
            .invoke("launch_missiles", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTool(name) if name == "launch_missiles"));
    }

    #[test]
    fn empty_registry_rejects_everything() {
        let registry = ToolRegistry::empty();
        assert!(registry
            .invoke("get_today_date", &serde_json::json!({}))
            .is_err());
    }
}
