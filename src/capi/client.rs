//! Resource client for reading and writing arbitrary API objects
//!
//! Provides a trait-based abstraction over dynamic API access, allowing tests
//! to substitute an in-memory or mocked backend while production code goes
//! through kube-rs.

use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, PostParams};
use kube::Client;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::object::{Document, Gvr};

/// Classified API failure
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Object does not exist
    #[error("not found")]
    NotFound,

    /// Object already exists (create race)
    #[error("already exists")]
    AlreadyExists,

    /// Resource-version or other write conflict
    #[error("conflict: {0}")]
    Conflict(String),

    /// Anything else, including transport failures
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// True for [`ApiError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// True for [`ApiError::AlreadyExists`]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists)
    }
}

impl From<kube::Error> for ApiError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound,
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict(ae.message.clone()),
            other => Self::Other(other.to_string()),
        }
    }
}

/// Trait abstracting generic API object operations
///
/// An empty `namespace` addresses cluster-scoped objects, or all namespaces
/// when listing. An empty `label_selector` lists everything.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch one object
    async fn get(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<Document, ApiError>;

    /// Create an object; the namespace is taken from the document
    async fn create(&self, gvr: &Gvr, doc: &Document) -> Result<Document, ApiError>;

    /// Replace an object; the document must carry its resourceVersion
    async fn update(&self, gvr: &Gvr, doc: &Document) -> Result<Document, ApiError>;

    /// Delete one object
    async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), ApiError>;

    /// List objects, optionally filtered by label selector
    async fn list(
        &self,
        gvr: &Gvr,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Document>, ApiError>;
}

/// Real client implementation using DynamicObject for untyped resources
pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    /// Create a new KubeResourceClient
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, gvr: &Gvr, kind: &str, namespace: &str) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(&gvr.group, &gvr.version, kind);
        let ar = ApiResource::from_gvk_with_plural(&gvk, &gvr.resource);
        if namespace.is_empty() {
            Api::all_with(self.client.clone(), &ar)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        }
    }
}

fn to_dynamic(doc: &Document) -> Result<DynamicObject, ApiError> {
    serde_json::from_value(doc.as_value().clone())
        .map_err(|e| ApiError::Other(format!("invalid object: {e}")))
}

fn to_document(obj: DynamicObject) -> Result<Document, ApiError> {
    let value =
        serde_json::to_value(obj).map_err(|e| ApiError::Other(format!("invalid object: {e}")))?;
    Document::from_value(value).map_err(|e| ApiError::Other(e.to_string()))
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn get(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<Document, ApiError> {
        debug!(resource = %gvr, namespace, name, "Getting object");
        let obj = self.api(gvr, "", namespace).get(name).await?;
        to_document(obj)
    }

    async fn create(&self, gvr: &Gvr, doc: &Document) -> Result<Document, ApiError> {
        debug!(resource = %gvr, namespace = doc.namespace(), name = doc.name(), "Creating object");
        let obj = to_dynamic(doc)?;
        let created = self
            .api(gvr, doc.kind(), doc.namespace())
            .create(&PostParams::default(), &obj)
            .await?;
        to_document(created)
    }

    async fn update(&self, gvr: &Gvr, doc: &Document) -> Result<Document, ApiError> {
        debug!(resource = %gvr, namespace = doc.namespace(), name = doc.name(), "Updating object");
        let obj = to_dynamic(doc)?;
        let updated = self
            .api(gvr, doc.kind(), doc.namespace())
            .replace(doc.name(), &PostParams::default(), &obj)
            .await?;
        to_document(updated)
    }

    async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), ApiError> {
        debug!(resource = %gvr, namespace, name, "Deleting object");
        self.api(gvr, "", namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn list(
        &self,
        gvr: &Gvr,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Document>, ApiError> {
        let mut params = ListParams::default();
        if !label_selector.is_empty() {
            params = params.labels(label_selector);
        }
        let list = self.api(gvr, "", namespace).list(&params).await?;
        list.items.into_iter().map(to_document).collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory backend keyed by (resource, namespace, name)

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    type Key = (String, String, String);

    /// Stateful fake that behaves like an API server for create/get/update
    #[derive(Default)]
    pub struct InMemoryClient {
        objects: Mutex<BTreeMap<Key, Document>>,
        writes: Mutex<Vec<(&'static str, Key)>>,
    }

    impl InMemoryClient {
        pub fn new() -> Self {
            Self::default()
        }

        fn key(gvr: &Gvr, namespace: &str, name: &str) -> Key {
            (gvr.to_string(), namespace.to_string(), name.to_string())
        }

        /// Seed an object as if someone else created it
        pub fn insert(&self, gvr: &Gvr, doc: Document) {
            let key = Self::key(gvr, doc.namespace(), doc.name());
            self.objects.lock().unwrap().insert(key, doc);
        }

        /// Current stored object
        pub fn stored(&self, gvr: &Gvr, namespace: &str, name: &str) -> Option<Document> {
            self.objects
                .lock()
                .unwrap()
                .get(&Self::key(gvr, namespace, name))
                .cloned()
        }

        /// Every write performed, in order
        pub fn writes(&self) -> Vec<(&'static str, Key)> {
            self.writes.lock().unwrap().clone()
        }

        /// Number of stored objects
        pub fn len(&self) -> usize {
            self.objects.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ResourceClient for InMemoryClient {
        async fn get(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<Document, ApiError> {
            self.stored(gvr, namespace, name).ok_or(ApiError::NotFound)
        }

        async fn create(&self, gvr: &Gvr, doc: &Document) -> Result<Document, ApiError> {
            let key = Self::key(gvr, doc.namespace(), doc.name());
            let mut objects = self.objects.lock().unwrap();
            if objects.contains_key(&key) {
                return Err(ApiError::AlreadyExists);
            }
            objects.insert(key.clone(), doc.clone());
            self.writes.lock().unwrap().push(("create", key));
            Ok(doc.clone())
        }

        async fn update(&self, gvr: &Gvr, doc: &Document) -> Result<Document, ApiError> {
            let key = Self::key(gvr, doc.namespace(), doc.name());
            let mut objects = self.objects.lock().unwrap();
            if !objects.contains_key(&key) {
                return Err(ApiError::NotFound);
            }
            objects.insert(key.clone(), doc.clone());
            self.writes.lock().unwrap().push(("update", key));
            Ok(doc.clone())
        }

        async fn delete(&self, gvr: &Gvr, namespace: &str, name: &str) -> Result<(), ApiError> {
            let key = Self::key(gvr, namespace, name);
            let removed = self.objects.lock().unwrap().remove(&key);
            match removed {
                Some(_) => {
                    self.writes.lock().unwrap().push(("delete", key));
                    Ok(())
                }
                None => Err(ApiError::NotFound),
            }
        }

        async fn list(
            &self,
            gvr: &Gvr,
            namespace: &str,
            label_selector: &str,
        ) -> Result<Vec<Document>, ApiError> {
            let resource = gvr.to_string();
            let wanted: Vec<(&str, &str)> = label_selector
                .split(',')
                .filter_map(|kv| kv.split_once('='))
                .collect();
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .filter(|((r, ns, _), _)| *r == resource && (namespace.is_empty() || ns == namespace))
                .filter(|(_, doc)| {
                    wanted.iter().all(|(k, v)| {
                        doc.str_field(&["metadata", "labels", *k]).ok() == Some(*v)
                    })
                })
                .map(|(_, doc)| doc.clone())
                .collect())
        }
    }
}
