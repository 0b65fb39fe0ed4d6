// crates/shared/src/registry/mod.rs
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::RegistryError;
use crate::schemas::{ToolDescriptor, ToolSpec};

/// Name → tool lookup. Built up front and handed to the loop behind an
/// `Arc`; nothing mutates it while a conversation runs.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<ToolSpec>>,
    order: Vec<&'static str>,
    toolbelts: Vec<Toolbelt>,
}

/// A named group of tools registered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolbelt {
    pub description: &'static str,
    pub tools: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) -> Result<(), RegistryError> {
        let name = spec.name();
        if self.tools.contains_key(name) {
            return Err(RegistryError::DuplicateTool(name.to_string()));
        }

        self.tools.insert(name, Arc::new(spec));
        self.order.push(name);
        Ok(())
    }

    pub fn register_all(&mut self, specs: impl IntoIterator<Item = ToolSpec>) -> Result<(), RegistryError> {
        for spec in specs {
            self.register(spec)?;
        }
        Ok(())
    }

    /// Registers every spec under one toolbelt heading. Nothing is
    /// registered if any name is already taken.
    pub fn register_toolbelt(&mut self, description: &'static str, specs: Vec<ToolSpec>) -> Result<(), RegistryError> {
        let mut names: Vec<&'static str> = Vec::with_capacity(specs.len());
        for spec in &specs {
            let name = spec.name();
            if self.tools.contains_key(name) || names.contains(&name) {
                return Err(RegistryError::DuplicateTool(name.to_string()));
            }
            names.push(name);
        }

        self.register_all(specs)?;
        self.toolbelts.push(Toolbelt {
            description,
            tools: names,
        });
        Ok(())
    }

    pub fn toolbelts(&self) -> &[Toolbelt] {
        &self.toolbelts
    }

    /// Tools registered on their own, outside any toolbelt.
    pub fn loose_specs(&self) -> impl Iterator<Item = &Arc<ToolSpec>> {
        self.specs()
            .filter(|spec| !self.toolbelts.iter().any(|belt| belt.tools.contains(&spec.name())))
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<ToolSpec>, RegistryError> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Tool descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|spec| spec.descriptor())
            .collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &Arc<ToolSpec>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
