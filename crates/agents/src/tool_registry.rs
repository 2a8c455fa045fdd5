//! The tool catalog: an explicit, immutable name → capability table.
//!
//! Unknown tool names are a table miss handled by the loop, never an
//! exception path.

use std::{collections::BTreeMap, sync::Arc};

use {async_trait::async_trait, serde_json::Value, tracing::warn};

use parrot_providers::ToolSchema;

/// A named external capability the model may invoke.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the argument object.
    fn parameters_schema(&self) -> Value;

    /// Execute with validated arguments. Errors become failure
    /// observations, not loop terminations.
    async fn execute(&self, params: Value) -> anyhow::Result<Value>;
}

/// Immutable catalog of tools for one run, constructed at startup (or
/// per-caller when permissions narrow it).
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, Arc<dyn AgentTool>>,
}

impl ToolCatalog {
    /// Build a catalog. Duplicate names keep the first registration; a
    /// later duplicate is dropped with a warning rather than overwriting
    /// a capability already visible to in-flight conversations.
    #[must_use]
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn AgentTool>>) -> Self {
        let mut map: BTreeMap<String, Arc<dyn AgentTool>> = BTreeMap::new();
        for tool in tools {
            let name = tool.name().to_string();
            if map.contains_key(&name) {
                warn!(tool = %name, "duplicate tool registration dropped");
                continue;
            }
            map.insert(name, tool);
        }
        Self { tools: map }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn AgentTool>> {
        self.tools.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declared schemas, in stable (name) order, as sent to the model.
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// Narrow the catalog to the named tools. Names not present are
    /// ignored: a subset can never widen access.
    #[must_use]
    pub fn subset(&self, names: &[String]) -> Self {
        let tools = self
            .tools
            .iter()
            .filter(|(name, _)| names.iter().any(|n| n == *name))
            .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
            .collect();
        Self { tools }
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use {serde_json::json, super::*};

    /// Minimal tool returning a fixed value, for catalog tests.
    pub(crate) struct StaticTool {
        pub name: &'static str,
        pub value: Value,
    }

    #[async_trait]
    impl AgentTool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "static test tool"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(&self, _params: Value) -> anyhow::Result<Value> {
            Ok(self.value.clone())
        }
    }

    fn catalog() -> ToolCatalog {
        ToolCatalog::from_tools([
            Arc::new(StaticTool {
                name: "alpha",
                value: json!(1),
            }) as Arc<dyn AgentTool>,
            Arc::new(StaticTool {
                name: "beta",
                value: json!(2),
            }),
        ])
    }

    #[test]
    fn lookup_is_a_table_hit_or_miss() {
        let catalog = catalog();
        assert!(catalog.get("alpha").is_some());
        assert!(catalog.get("nonexistent_tool").is_none());
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        let catalog = ToolCatalog::from_tools([
            Arc::new(StaticTool {
                name: "alpha",
                value: json!("first"),
            }) as Arc<dyn AgentTool>,
            Arc::new(StaticTool {
                name: "alpha",
                value: json!("second"),
            }),
        ]);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn schemas_are_name_ordered() {
        let schemas = catalog().schemas();
        let names: Vec<&str> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn subset_ignores_unknown_names() {
        let subset = catalog().subset(&["beta".into(), "ghost".into()]);
        assert_eq!(subset.len(), 1);
        assert!(subset.contains("beta"));
    }
}
