//! Tool Registry
//!
//! An explicit, statically constructed name→capability map. Built once at
//! startup and read-only thereafter, so an unresolvable name is a typed,
//! catchable condition rather than a reflection failure.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::Tool;
use crate::types::ToolSchemaDef;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate tool name '{name}'")]
    DuplicateName { name: String },

    /// Carries the full registered-name list so a registry/request mismatch
    /// can be diagnosed from the error alone.
    #[error("unknown tool '{requested}'; registered tools: {registered:?}")]
    UnknownTool {
        requested: String,
        registered: Vec<String>,
    },
}

/// Immutable lookup table from tool name to capability. Registration order is
/// preserved and is the order tools are presented to the model.
#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Build a registry from a fixed tool set. Fails on the first duplicate
    /// name; the registry is never mutated after this returns.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut registry = Self {
            tools: Vec::with_capacity(tools.len()),
            by_name: HashMap::with_capacity(tools.len()),
        };
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Add one tool during construction.
    fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Look up a tool by name. The error payload enumerates every registered
    /// name; enumerating never throws.
    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn Tool>, RegistryError> {
        match self.by_name.get(name) {
            Some(&index) => Ok(&self.tools[index]),
            None => Err(RegistryError::UnknownTool {
                requested: name.to_string(),
                registered: self.names(),
            }),
        }
    }

    /// All registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Function-calling definitions for the inference client, in
    /// registration order.
    pub fn schema_defs(&self) -> Vec<ToolSchemaDef> {
        self.tools.iter().map(|t| t.schema_def()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
