//! Create-or-update reconciliation over descriptor lists
//!
//! For every document a descriptor renders to: fetch the live object, create
//! it when absent, otherwise merge desired into live state and write it back.
//! Descriptors are applied strictly in order so callers can express
//! dependencies (credentials before the objects that reference them).

use std::borrow::Cow;
use std::collections::BTreeMap;

use tracing::{debug, info};

use super::client::{ApiError, ResourceClient};
use crate::merge::{merge, LockedFields};
use crate::object::{Document, FieldError, Gvr};
use crate::template::TemplateEngine;
use crate::variables::Variables;
use crate::Error;

/// A template plus how to apply what it renders
#[derive(Clone, Debug)]
pub struct Descriptor {
    /// Short name used in error context
    pub name: Cow<'static, str>,
    /// Template text, possibly multi-document
    pub template: Cow<'static, str>,
    /// Resource type for every rendered document, inferred from kind when unset
    pub resource: Option<Gvr>,
    /// Paths whose live value always survives a merge
    pub locked: LockedFields,
}

impl Descriptor {
    /// Descriptor for a built-in template
    pub const fn builtin(name: &'static str, template: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            template: Cow::Borrowed(template),
            resource: None,
            locked: LockedFields::EMPTY,
        }
    }

    /// Descriptor for user-supplied template text
    pub fn inline(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            template: Cow::Owned(template.into()),
            resource: None,
            locked: LockedFields::new(),
        }
    }

    /// Pin the resource type instead of inferring it
    pub fn with_resource(mut self, resource: Gvr) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Replace the locked paths
    pub fn with_locked(mut self, locked: LockedFields) -> Self {
        self.locked = locked;
        self
    }

    pub(crate) fn resource_for(&self, doc: &Document) -> Gvr {
        self.resource.clone().unwrap_or_else(|| doc.gvr())
    }
}

/// Documents applied during one pass, grouped by resource type
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconcileResult {
    applied: BTreeMap<Gvr, Vec<Document>>,
}

impl ReconcileResult {
    /// Record an applied document
    pub fn add(&mut self, resource: Gvr, doc: Document) {
        self.applied.entry(resource).or_default().push(doc);
    }

    /// Fold another pass's documents into this one
    pub fn merge(&mut self, other: ReconcileResult) {
        for (resource, docs) in other.applied {
            self.applied.entry(resource).or_default().extend(docs);
        }
    }

    /// Documents applied for a resource type
    pub fn get(&self, resource: &Gvr) -> &[Document] {
        self.applied.get(resource).map(Vec::as_slice).unwrap_or_default()
    }

    /// Names applied for a resource type
    pub fn names(&self, resource: &Gvr) -> Vec<&str> {
        self.get(resource).iter().map(Document::name).collect()
    }

    /// Iterate (resource type, documents) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&Gvr, &[Document])> {
        self.applied.iter().map(|(gvr, docs)| (gvr, docs.as_slice()))
    }

    /// Total documents applied
    pub fn len(&self) -> usize {
        self.applied.values().map(Vec::len).sum()
    }

    /// True when nothing was applied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Applies descriptors against one API endpoint
pub struct Reconciler<'a> {
    client: &'a dyn ResourceClient,
    engine: &'a TemplateEngine,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over an explicit client and engine
    pub fn new(client: &'a dyn ResourceClient, engine: &'a TemplateEngine) -> Self {
        Self { client, engine }
    }

    /// Render a descriptor into its documents without touching the API
    pub fn render(&self, descriptor: &Descriptor, vars: &Variables) -> Result<Vec<Document>, Error> {
        self.engine
            .render_documents(&descriptor.template, vars)
            .map_err(|source| Error::Render {
                descriptor: descriptor.name.to_string(),
                source,
            })
    }

    /// Reconcile an ordered descriptor list, stopping at the first failure
    pub async fn reconcile_all(
        &self,
        descriptors: &[Descriptor],
        vars: &Variables,
    ) -> Result<ReconcileResult, Error> {
        let mut result = ReconcileResult::default();
        for descriptor in descriptors {
            result.merge(self.reconcile(descriptor, vars).await?);
        }
        Ok(result)
    }

    /// Reconcile one descriptor
    pub async fn reconcile(
        &self,
        descriptor: &Descriptor,
        vars: &Variables,
    ) -> Result<ReconcileResult, Error> {
        self.reconcile_with(descriptor, vars, |_| Ok(())).await
    }

    /// Reconcile one descriptor, adjusting merged objects before update
    ///
    /// `adjust` only runs for objects that already exist.
    pub async fn reconcile_with<F>(
        &self,
        descriptor: &Descriptor,
        vars: &Variables,
        adjust: F,
    ) -> Result<ReconcileResult, Error>
    where
        F: Fn(&mut Document) -> Result<(), FieldError> + Send + Sync,
    {
        // Render everything first so a template failure applies nothing
        let docs = self.render(descriptor, vars)?;

        let mut result = ReconcileResult::default();
        for doc in docs {
            let resource = descriptor.resource_for(&doc);
            let applied = self
                .apply_with(doc, &resource, &descriptor.locked, &adjust)
                .await?;
            result.add(resource, applied);
        }
        Ok(result)
    }

    /// Create or merge-update a single pre-built document
    pub async fn apply(
        &self,
        doc: Document,
        resource: &Gvr,
        locked: &LockedFields,
    ) -> Result<Document, Error> {
        self.apply_with(doc, resource, locked, &|_: &mut Document| Ok(()))
            .await
    }

    async fn apply_with<F>(
        &self,
        desired: Document,
        resource: &Gvr,
        locked: &LockedFields,
        adjust: &F,
    ) -> Result<Document, Error>
    where
        F: Fn(&mut Document) -> Result<(), FieldError> + Send + Sync,
    {
        let name = desired.name().to_string();
        let namespace = desired.namespace().to_string();

        let existing = match self.client.get(resource, &namespace, &name).await {
            Ok(existing) => existing,
            Err(ApiError::NotFound) => {
                match self.client.create(resource, &desired).await {
                    Ok(_) => info!(resource = %resource, namespace = %namespace, name = %name, "Created object"),
                    Err(ApiError::AlreadyExists) => {
                        debug!(resource = %resource, namespace = %namespace, name = %name, "Object created concurrently")
                    }
                    Err(source) => {
                        return Err(Error::Create {
                            resource: resource.clone(),
                            name,
                            source,
                        })
                    }
                }
                return Ok(desired);
            }
            Err(source) => {
                return Err(Error::Fetch {
                    resource: resource.clone(),
                    name,
                    source,
                })
            }
        };

        let merged = merge(existing.as_value(), desired.as_value(), locked).map_err(|source| {
            Error::Merge {
                resource: resource.clone(),
                name: name.clone(),
                source,
            }
        })?;
        let mut merged = Document::from_value(merged)?;
        adjust(&mut merged).map_err(|source| Error::Adjust {
            resource: resource.clone(),
            name: name.clone(),
            source,
        })?;

        if merged == existing {
            debug!(resource = %resource, namespace = %namespace, name = %name, "Object unchanged");
            return Ok(desired);
        }

        self.client
            .update(resource, &merged)
            .await
            .map_err(|source| Error::Update {
                resource: resource.clone(),
                name: name.clone(),
                source,
            })?;
        info!(resource = %resource, namespace = %namespace, name = %name, "Updated object");
        Ok(desired)
    }

    /// Delete every document a descriptor renders to
    ///
    /// Returns the number of objects that existed and were deleted.
    pub async fn delete_rendered(
        &self,
        descriptor: &Descriptor,
        vars: &Variables,
    ) -> Result<usize, Error> {
        let mut deleted = 0;
        for doc in self.render(descriptor, vars)? {
            let resource = descriptor.resource_for(&doc);
            if delete_if_exists(self.client, &resource, doc.namespace(), doc.name()).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Delete an object, treating "already gone" as success
///
/// Returns `true` when the object existed.
pub async fn delete_if_exists(
    client: &dyn ResourceClient,
    resource: &Gvr,
    namespace: &str,
    name: &str,
) -> Result<bool, Error> {
    match client.delete(resource, namespace, name).await {
        Ok(()) => {
            info!(resource = %resource, namespace, name, "Deleted object");
            Ok(true)
        }
        Err(ApiError::NotFound) => Ok(false),
        Err(source) => Err(Error::Delete {
            resource: resource.clone(),
            name: name.to_string(),
            source,
        }),
    }
}
