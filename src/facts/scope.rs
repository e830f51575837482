//! Deployment scope inference.

use serde_json::Value;

use crate::facts::arm::is_truthy;
use crate::facts::model::Scope;

/// Target scope of a template from its `$schema` URL. Defaults to
/// resource group.
pub fn scope_from_schema(schema_url: Option<&str>) -> Scope {
    let Some(url) = schema_url else {
        return Scope::ResourceGroup;
    };
    let url = url.to_ascii_lowercase();
    if url.contains("subscriptiondeploymenttemplate") {
        Scope::Subscription
    } else if url.contains("managementgroupdeploymenttemplate") {
        Scope::ManagementGroup
    } else if url.contains("tenantdeploymenttemplate") {
        Scope::Tenant
    } else {
        Scope::ResourceGroup
    }
}

/// Scope named by a scope expression such as `[subscription()]`.
pub fn scope_from_expression(expression: &str) -> Option<Scope> {
    let expression = expression.to_ascii_lowercase();
    if expression.contains("subscription()") {
        Some(Scope::Subscription)
    } else if expression.contains("resourcegroup()") {
        Some(Scope::ResourceGroup)
    } else if expression.contains("managementgroup()") {
        Some(Scope::ManagementGroup)
    } else if expression.contains("tenant()") {
        Some(Scope::Tenant)
    } else {
        None
    }
}

/// Scope of a nested deployment resource.
///
/// An explicit scope expression wins, then an explicit subscription id, then
/// an explicit resource group.
pub fn module_scope(resource: Option<&Value>) -> Option<Scope> {
    let resource = resource.filter(|r| r.is_object())?;

    if let Some(scope) = resource
        .get("scope")
        .and_then(Value::as_str)
        .and_then(scope_from_expression)
    {
        return Some(scope);
    }
    if is_truthy(resource.get("subscriptionId")) {
        return Some(Scope::Subscription);
    }
    if is_truthy(resource.get("resourceGroup")) {
        return Some(Scope::ResourceGroup);
    }
    None
}
