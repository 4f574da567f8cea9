//! Cumulus provider capabilities: what to list (`Fetcher`) and how to show it (`Renderer`).
//!
//! One engine instance is generic over these two capabilities; each resource type supplies its
//! own pair. Built-in renderers live in [`render`], fetchers in [`fetch`].

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cumulus_core::{tone, Header, Row, RowEvent, RowTone};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

pub mod fetch;
pub mod render;

pub use fetch::{CachedFetcher, FileFetcher, StaticFetcher};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no renderer for resource: {0}")]
    UnknownResource(String),
    #[error("invalid resource id format: {0:?} (expected service/resource)")]
    InvalidResourceId(String),
    #[error("render {id}: {reason}")]
    Render { id: String, reason: String },
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("fetch cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn render(id: impl Into<String>, reason: impl Into<String>) -> Self {
        ProviderError::Render { id: id.into(), reason: reason.into() }
    }
}

/// `service/resource`, e.g. `ec2/instance`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub service: String,
    pub resource: String,
}

impl ResourceId {
    pub fn new(service: impl Into<String>, resource: impl Into<String>) -> Self {
        Self { service: service.into(), resource: resource.into() }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.resource)
    }
}

impl FromStr for ResourceId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((svc, res)) if !svc.is_empty() && !res.is_empty() && !res.contains('/') => {
                Ok(ResourceId::new(svc.to_ascii_lowercase(), res.to_ascii_lowercase()))
            }
            _ => Err(ProviderError::InvalidResourceId(s.to_string())),
        }
    }
}

/// Fetch boundary for one refresh cycle: a region, or the all-regions sentinel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub const ALL: &'static str = "all";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn all() -> Self {
        Self(Self::ALL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_all(&self) -> bool {
        matches!(self.0.trim(), "" | "*") || self.0.trim().eq_ignore_ascii_case(Self::ALL)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            f.write_str(Self::ALL)
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for Scope {
    fn from(s: &str) -> Self {
        Scope::new(s)
    }
}

impl From<String> for Scope {
    fn from(s: String) -> Self {
        Scope(s)
    }
}

/// A provider-shaped object as returned by a listing call.
///
/// `raw` keeps the provider's own JSON; renderers read service-specific fields out of it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudObject {
    pub id: String,
    pub arn: Option<String>,
    pub name: String,
    pub region: String,
    pub tags: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
}

impl CloudObject {
    pub fn new(id: impl Into<String>, region: impl Into<String>) -> Self {
        Self { id: id.into(), region: region.into(), ..Default::default() }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Lists provider objects for a scope.
///
/// Must be safe to call repeatedly. Long calls should watch `cancel` and return
/// [`ProviderError::Cancelled`] once it fires.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, scope: &Scope, cancel: &CancellationToken) -> Result<Vec<CloudObject>, ProviderError>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, scope: &Scope, cancel: &CancellationToken) -> Result<Vec<CloudObject>, ProviderError> {
        (**self).fetch(scope, cancel).await
    }
}

/// Turns provider objects into table rows.
///
/// `render` must fill every column `header` declares, with a placeholder where no value exists.
pub trait Renderer: Send + Sync {
    fn header(&self, scope: &Scope) -> Header;

    fn render(&self, obj: &CloudObject, scope: &Scope) -> Result<Row, ProviderError>;

    fn tone(&self, header: &Header, re: &RowEvent) -> RowTone {
        tone::default_tone(header, re)
    }
}

/// Built-in resource ids, in display order.
pub const BUILTIN_RESOURCES: &[(&str, &str)] = &[
    ("ec2", "instance"),
    ("ec2", "volume"),
    ("s3", "bucket"),
    ("iam", "user"),
    ("eks", "cluster"),
];

pub fn builtin_resources() -> Vec<ResourceId> {
    BUILTIN_RESOURCES.iter().map(|(s, r)| ResourceId::new(*s, *r)).collect()
}

/// Resolve the built-in renderer for `rid`.
pub fn renderer_for(rid: &ResourceId) -> Result<Arc<dyn Renderer>, ProviderError> {
    let r: Arc<dyn Renderer> = match (rid.service.as_str(), rid.resource.as_str()) {
        ("ec2", "instance") => Arc::new(render::Ec2Instance),
        ("ec2", "volume") => Arc::new(render::Ec2Volume),
        ("s3", "bucket") => Arc::new(render::S3Bucket),
        ("iam", "user") => Arc::new(render::IamUser),
        ("eks", "cluster") => Arc::new(render::EksCluster),
        _ => return Err(ProviderError::UnknownResource(rid.to_string())),
    };
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_parse_and_display() {
        let rid: ResourceId = "EC2/Instance".parse().unwrap();
        assert_eq!(rid, ResourceId::new("ec2", "instance"));
        assert_eq!(rid.to_string(), "ec2/instance");
        for bad in ["ec2", "/instance", "ec2/", "a/b/c", ""] {
            assert!(matches!(bad.parse::<ResourceId>(), Err(ProviderError::InvalidResourceId(_))), "{bad}");
        }
    }

    #[test]
    fn scope_sentinels() {
        assert!(Scope::all().is_all());
        assert!(Scope::new("*").is_all());
        assert!(Scope::new("").is_all());
        assert!(Scope::new("ALL").is_all());
        assert!(!Scope::new("us-east-1").is_all());
        assert_eq!(Scope::new("*").to_string(), "all");
    }

    #[test]
    fn every_builtin_resolves() {
        for rid in builtin_resources() {
            assert!(renderer_for(&rid).is_ok(), "{rid}");
        }
        assert!(matches!(
            renderer_for(&ResourceId::new("ec2", "nope")),
            Err(ProviderError::UnknownResource(s)) if s == "ec2/nope"
        ));
    }

    #[test]
    fn cloud_object_deserializes_with_defaults() {
        let obj: CloudObject = serde_json::from_value(serde_json::json!({
            "id": "i-1", "region": "us-east-1", "created_at": "2024-01-02T03:04:05Z"
        }))
        .unwrap();
        assert_eq!(obj.id, "i-1");
        assert!(obj.tags.is_empty());
        assert!(obj.raw.is_null());
        assert!(obj.created_at.is_some());
    }
}
