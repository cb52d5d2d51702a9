//! Applying and deleting rendered manifests
//!
//! [`ResourceManager`] is the cluster-backed [`ManifestApplier`]: it resolves
//! each document through API discovery and uses Server-Side Apply, so
//! re-applying the same release is idempotent. [`MockApplier`] records calls
//! instead, for tests.

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PropagationPolicy},
    core::{GroupVersionKind, TypeMeta},
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope},
};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use crate::error::{KubeError, Result};

/// Field manager name for Server-Side Apply
const FIELD_MANAGER: &str = "berth";

/// Annotation keeping a resource in place on delete
const RESOURCE_POLICY_ANNOTATION: &str = "berth.io/resource-policy";
const RESOURCE_POLICY_KEEP: &str = "keep";

/// Summary of apply/delete operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSummary {
    /// Successfully processed resources
    pub succeeded: Vec<String>,
    /// Failed resources with errors
    pub failed: Vec<(String, String)>,
    /// Skipped resources with the reason
    pub skipped: Vec<(String, String)>,
}

impl OperationSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if !self.succeeded.is_empty() {
            parts.push(format!("{} succeeded", self.succeeded.len()));
        }
        if !self.failed.is_empty() {
            parts.push(format!("{} failed", self.failed.len()));
        }
        if !self.skipped.is_empty() {
            parts.push(format!("{} skipped", self.skipped.len()));
        }
        if parts.is_empty() {
            "No resources processed".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Failures joined into one line, for error messages
    pub fn failure_message(&self) -> String {
        self.failed
            .iter()
            .map(|(name, err)| format!("{}: {}", name, err))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Something that can push a multi-document manifest into a cluster
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    /// Create or update every resource in `manifest`
    async fn apply(&self, namespace: &str, manifest: &str) -> Result<OperationSummary>;

    /// Delete every resource in `manifest`
    async fn delete(&self, namespace: &str, manifest: &str) -> Result<OperationSummary>;
}

/// Split a YAML stream into its non-empty documents
///
/// Only a line consisting of `---` separates documents. Documents holding
/// nothing but comments are dropped.
pub fn split_documents(manifest: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in manifest.lines() {
        if line.trim_end() == "---" {
            documents.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    documents.push(current);

    documents
        .into_iter()
        .filter(|doc| {
            doc.lines()
                .any(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        })
        .collect()
}

/// Creation rank of a kind; lower applies first, deletes last
fn apply_rank(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "ServiceAccount" | "Role" | "RoleBinding" | "ClusterRole" | "ClusterRoleBinding" => 1,
        "ConfigMap" | "Secret" | "PersistentVolumeClaim" => 2,
        "Service" => 3,
        "Deployment" | "StatefulSet" | "DaemonSet" | "Job" | "CronJob" | "Pod" => 4,
        "Ingress" | "HorizontalPodAutoscaler" | "PodDisruptionBudget" => 5,
        _ => 6,
    }
}

/// Parsed resource ready for Kubernetes operations
#[derive(Debug, Clone)]
struct ParsedResource {
    obj: DynamicObject,
    gvk: GroupVersionKind,
    api_resource: ApiResource,
    capabilities: ApiCapabilities,
}

impl ParsedResource {
    fn display_name(&self) -> String {
        let name = self.obj.metadata.name.as_deref().unwrap_or("unnamed");
        match &self.obj.metadata.namespace {
            Some(ns) => format!("{}/{}/{}", ns, self.gvk.kind, name),
            None => format!("{}/{}", self.gvk.kind, name),
        }
    }

    fn has_keep_policy(&self) -> bool {
        self.obj
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(RESOURCE_POLICY_ANNOTATION))
            .is_some_and(|v| v == RESOURCE_POLICY_KEEP)
    }

    fn name(&self) -> Result<&str> {
        self.obj
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| KubeError::InvalidManifest(format!("{} is missing metadata.name", self.gvk.kind)))
    }
}

/// Cluster-backed manifest applier
pub struct ResourceManager {
    client: Client,
    discovery: Discovery,
}

impl ResourceManager {
    /// Create a manager, running API discovery once
    pub async fn new(client: Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone()).run().await?;
        Ok(Self { client, discovery })
    }

    /// Create from the default kubeconfig
    pub async fn try_default() -> Result<Self> {
        Self::new(Client::try_default().await?).await
    }

    fn parse_manifest(&self, manifest: &str, default_namespace: &str) -> Result<Vec<ParsedResource>> {
        split_documents(manifest)
            .iter()
            .enumerate()
            .map(|(index, doc)| {
                self.parse_document(doc, default_namespace).map_err(|e| {
                    KubeError::InvalidManifest(format!("document {}: {}", index, e))
                })
            })
            .collect()
    }

    fn parse_document(&self, doc: &str, default_namespace: &str) -> Result<ParsedResource> {
        let mut obj: DynamicObject = serde_yaml::from_str(doc)?;

        let type_meta = obj
            .types
            .as_ref()
            .ok_or_else(|| KubeError::InvalidManifest("resource missing apiVersion or kind".to_string()))?;
        let gvk = gvk_from_type_meta(type_meta);

        let (api_resource, capabilities) = self.discovery.resolve_gvk(&gvk).ok_or_else(|| {
            KubeError::InvalidManifest(format!(
                "unknown resource type {}/{}",
                type_meta.api_version, type_meta.kind
            ))
        })?;

        if capabilities.scope == Scope::Namespaced && obj.metadata.namespace.is_none() {
            obj.metadata.namespace = Some(default_namespace.to_string());
        }

        Ok(ParsedResource {
            obj,
            gvk,
            api_resource,
            capabilities,
        })
    }

    fn api_for(&self, resource: &ParsedResource) -> Api<DynamicObject> {
        if resource.capabilities.scope == Scope::Namespaced {
            let ns = resource.obj.metadata.namespace.as_deref().unwrap_or("default");
            Api::namespaced_with(self.client.clone(), ns, &resource.api_resource)
        } else {
            Api::all_with(self.client.clone(), &resource.api_resource)
        }
    }

    async fn apply_one(&self, resource: &ParsedResource) -> Result<bool> {
        let name = resource.name()?;
        let api = self.api_for(resource);

        let exists = api.get_opt(name).await?.is_some();

        let mut params = PatchParams::apply(FIELD_MANAGER);
        params.force = true;
        api.patch(name, &params, &Patch::Apply(&resource.obj)).await?;

        Ok(!exists)
    }

    async fn delete_one(&self, resource: &ParsedResource) -> Result<bool> {
        let name = resource.name()?;
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };

        match self.api_for(resource).delete(name, &params).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ManifestApplier for ResourceManager {
    async fn apply(&self, namespace: &str, manifest: &str) -> Result<OperationSummary> {
        let mut resources = self.parse_manifest(manifest, namespace)?;
        resources.sort_by_key(|r| apply_rank(&r.gvk.kind));

        let mut summary = OperationSummary::default();
        for resource in &resources {
            let name = resource.display_name();
            tracing::debug!(resource = %name, "applying");

            match self.apply_one(resource).await {
                Ok(true) => summary.succeeded.push(format!("{} (created)", name)),
                Ok(false) => summary.succeeded.push(format!("{} (configured)", name)),
                Err(e) => summary.failed.push((name, e.to_string())),
            }
        }

        Ok(summary)
    }

    async fn delete(&self, namespace: &str, manifest: &str) -> Result<OperationSummary> {
        let mut resources = self.parse_manifest(manifest, namespace)?;
        resources.sort_by_key(|r| std::cmp::Reverse(apply_rank(&r.gvk.kind)));

        let mut summary = OperationSummary::default();
        for resource in &resources {
            let name = resource.display_name();

            if resource.has_keep_policy() {
                summary.skipped.push((name, "resource-policy: keep".to_string()));
                continue;
            }

            match self.delete_one(resource).await {
                Ok(true) => summary.succeeded.push(format!("{} (deleted)", name)),
                Ok(false) => summary.skipped.push((name, "not found".to_string())),
                Err(e) => summary.failed.push((name, e.to_string())),
            }
        }

        Ok(summary)
    }
}

/// Cluster applier that connects and runs discovery on first use
///
/// Commands that only read release records never reach the API server.
#[derive(Default)]
pub struct ClusterApplier {
    manager: OnceCell<ResourceManager>,
}

impl ClusterApplier {
    pub fn new() -> Self {
        Self::default()
    }

    async fn manager(&self) -> Result<&ResourceManager> {
        self.manager.get_or_try_init(ResourceManager::try_default).await
    }
}

#[async_trait]
impl ManifestApplier for ClusterApplier {
    async fn apply(&self, namespace: &str, manifest: &str) -> Result<OperationSummary> {
        self.manager().await?.apply(namespace, manifest).await
    }

    async fn delete(&self, namespace: &str, manifest: &str) -> Result<OperationSummary> {
        self.manager().await?.delete(namespace, manifest).await
    }
}

/// Convert TypeMeta to GroupVersionKind
///
/// `apps/v1` gives group `apps`, `v1` gives the core group.
fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = match tm.api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), tm.api_version.clone()),
    };

    GroupVersionKind {
        group,
        version,
        kind: tm.kind.clone(),
    }
}

/// Which applier operation was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedAction {
    Apply,
    Delete,
}

/// One recorded call on [`MockApplier`]
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCall {
    pub action: AppliedAction,
    pub namespace: String,
    pub manifest: String,
}

/// Applier that records calls instead of touching a cluster
#[derive(Clone, Default)]
pub struct MockApplier {
    calls: Arc<Mutex<Vec<AppliedCall>>>,
    failure: Option<String>,
}

impl MockApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applier whose every document fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: Arc::default(),
            failure: Some(message.into()),
        }
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<AppliedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, action: AppliedAction, namespace: &str, manifest: &str) -> OperationSummary {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(AppliedCall {
                action,
                namespace: namespace.to_string(),
                manifest: manifest.to_string(),
            });

        let mut summary = OperationSummary::default();
        for index in 0..split_documents(manifest).len() {
            let name = format!("{}/document-{}", namespace, index);
            match &self.failure {
                Some(message) => summary.failed.push((name, message.clone())),
                None => summary.succeeded.push(name),
            }
        }
        summary
    }
}

#[async_trait]
impl ManifestApplier for MockApplier {
    async fn apply(&self, namespace: &str, manifest: &str) -> Result<OperationSummary> {
        Ok(self.record(AppliedAction::Apply, namespace, manifest))
    }

    async fn delete(&self, namespace: &str, manifest: &str) -> Result<OperationSummary> {
        Ok(self.record(AppliedAction::Delete, namespace, manifest))
    }
}
