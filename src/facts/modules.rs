//! Nested deployment resolution.
//!
//! Module nodes in the deployment graph are matched by name to the
//! nested-deployment resources of the compiled template. The graph supplies
//! the relative path; the template supplies the fallback link, the condition
//! and the scope.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::facts::arm::{is_deployment_resource, is_truthy, Template};
use crate::facts::model::{Module, ModuleCondition};
use crate::facts::scope::module_scope;
use crate::rpc::protocol::DeploymentGraph;

/// Resolved modules plus the names of those without a usable path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleResolution {
    /// Sorted by name.
    pub modules: Vec<Module>,
    /// In graph order.
    pub omitted: Vec<String>,
}

impl ModuleResolution {
    /// Summary note for omitted modules, if any were omitted.
    pub fn omission_note(&self) -> Option<String> {
        if self.omitted.is_empty() {
            None
        } else {
            Some(format!(
                "Omitted {} module(s) without resolvable path.",
                self.omitted.len()
            ))
        }
    }
}

pub fn resolve_modules(template: &Template, graph: &DeploymentGraph) -> ModuleResolution {
    let resources = template.all_resources();
    let deployments: HashMap<&str, &Value> = resources
        .into_iter()
        .filter(|r| is_deployment_resource(r))
        .filter_map(|r| r.get("name").and_then(Value::as_str).map(|name| (name, r)))
        .collect();

    let mut resolution = ModuleResolution::default();
    let mut seen = HashSet::new();

    for node in graph.nodes.iter().filter(|n| n.is_module()) {
        if !seen.insert(node.name.as_str()) {
            continue;
        }

        let resource = deployments.get(node.name.as_str()).copied();
        let path = match &node.relative_path {
            Some(relative) => Some(relative.as_str()),
            None => resource.and_then(template_link_uri),
        };

        let Some(path) = path.filter(|p| !p.is_empty()) else {
            resolution.omitted.push(node.name.clone());
            continue;
        };

        resolution.modules.push(Module {
            name: node.name.clone(),
            path: path.to_string(),
            scope: module_scope(resource),
            condition: module_condition(resource),
        });
    }

    resolution.modules.sort_by(|a, b| a.name.cmp(&b.name));
    resolution
}

fn template_link_uri(resource: &Value) -> Option<&str> {
    resource
        .get("properties")
        .and_then(|p| p.get("templateLink"))
        .and_then(|l| l.get("uri"))
        .and_then(Value::as_str)
}

/// Iteration wins over a condition.
pub fn module_condition(resource: Option<&Value>) -> ModuleCondition {
    let copy = resource.and_then(|r| r.get("copy"));
    if is_truthy(copy) {
        return ModuleCondition::ForEach(copy.cloned().unwrap_or_default());
    }
    let condition = resource.and_then(|r| r.get("condition"));
    if is_truthy(condition) {
        return ModuleCondition::Conditional(condition.cloned().unwrap_or_default());
    }
    ModuleCondition::Always
}
