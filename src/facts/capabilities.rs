//! Capability classification from resource provider namespaces.

use std::collections::{BTreeSet, HashMap};

use crate::facts::model::{Capabilities, Category};
use crate::rpc::protocol::DeploymentGraph;

/// Provider namespace (lowercase) to category.
const PROVIDER_CATEGORIES: &[(&str, Category)] = &[
    ("microsoft.network", Category::Networking),
    ("microsoft.compute", Category::Compute),
    ("microsoft.containerservice", Category::Compute),
    ("microsoft.containerregistry", Category::Compute),
    ("microsoft.web", Category::Compute),
    ("microsoft.storage", Category::Data),
    ("microsoft.sql", Category::Data),
    ("microsoft.documentdb", Category::Data),
    ("microsoft.dbformysql", Category::Data),
    ("microsoft.dbforpostgresql", Category::Data),
    ("microsoft.keyvault", Category::Security),
    ("microsoft.authorization", Category::Security),
    ("microsoft.eventhub", Category::Messaging),
    ("microsoft.servicebus", Category::Messaging),
    ("microsoft.apimanagement", Category::Integration),
    ("microsoft.cognitiveservices", Category::Ai),
    ("microsoft.machinelearningservices", Category::Ai),
];

/// Distinct declared resource types in the graph, sorted. Module nodes and
/// untyped nodes are skipped.
pub fn resource_types(graph: &DeploymentGraph) -> Vec<String> {
    graph
        .nodes
        .iter()
        .filter(|n| !n.node_type.is_empty() && !n.is_module())
        .map(|n| n.node_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Category of one resource type, by the namespace before the first `/`.
pub fn category_for_type(resource_type: &str) -> Category {
    let provider = resource_type
        .split('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    PROVIDER_CATEGORIES
        .iter()
        .find(|(namespace, _)| *namespace == provider)
        .map_or(Category::Unknown, |(_, category)| *category)
}

/// Majority category of `resource_types`, ties going to the alphabetically
/// first category name. `resource_types` must already be sorted.
pub fn classify(resource_types: &[String]) -> Capabilities {
    if resource_types.is_empty() {
        return Capabilities {
            category: Category::Unknown,
            features: None,
        };
    }

    let mut counts: HashMap<Category, usize> = HashMap::new();
    for resource_type in resource_types {
        *counts.entry(category_for_type(resource_type)).or_default() += 1;
    }

    let category = counts
        .into_iter()
        .min_by(|(a, a_count), (b, b_count)| {
            b_count.cmp(a_count).then_with(|| a.as_str().cmp(b.as_str()))
        })
        .map_or(Category::Unknown, |(category, _)| category);

    Capabilities {
        category,
        features: Some(resource_types.to_vec()),
    }
}
