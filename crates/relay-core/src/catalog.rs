//! Lookup of per-API settings.
use std::{collections::HashMap, sync::Arc};

use relay_model::{ApiName, ApiSpec};

/// Source of [`ApiSpec`] entries. A missing API is `None`, never an error.
pub trait ApiCatalog: Send + Sync + 'static {
    fn lookup(&self, api: &str) -> Option<ApiSpec>;

    /// Names of every known API.
    fn names(&self) -> Vec<ApiName>;
}

pub type CatalogHandle = Arc<dyn ApiCatalog>;

/// Catalog fixed at construction time.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    apis: HashMap<ApiName, ApiSpec>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api(mut self, spec: ApiSpec) -> Self {
        self.insert(spec);
        self
    }

    pub fn insert(&mut self, spec: ApiSpec) {
        self.apis.insert(spec.name.clone(), spec);
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

impl FromIterator<ApiSpec> for StaticCatalog {
    fn from_iter<I: IntoIterator<Item = ApiSpec>>(iter: I) -> Self {
        let mut out = StaticCatalog::new();
        for spec in iter {
            out.insert(spec);
        }
        out
    }
}

impl ApiCatalog for StaticCatalog {
    fn lookup(&self, api: &str) -> Option<ApiSpec> {
        self.apis.get(api).cloned()
    }

    fn names(&self) -> Vec<ApiName> {
        let mut names: Vec<_> = self.apis.keys().cloned().collect();
        names.sort();
        names
    }
}
