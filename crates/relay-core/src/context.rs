use std::{fmt, sync::Arc};

use crate::{
    catalog::{CatalogHandle, StaticCatalog},
    launcher::{LauncherHandle, external_workers},
    metrics::MetricsHandle,
};

/// Shared collaborators of a [`crate::Dispatcher`].
#[derive(Clone)]
pub struct DispatchContext {
    catalog: CatalogHandle,
    metrics: MetricsHandle,
    launcher: LauncherHandle,
}

impl DispatchContext {
    /// Create a new context with the given params.
    pub fn new(catalog: CatalogHandle, metrics: MetricsHandle) -> Self {
        Self {
            catalog,
            metrics,
            launcher: external_workers(),
        }
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }

    pub fn launcher(&self) -> &LauncherHandle {
        &self.launcher
    }

    /// Replace the catalog and return updated context.
    pub fn with_catalog(mut self, catalog: CatalogHandle) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the metrics backend and return updated context.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the worker launcher and return updated context.
    pub fn with_launcher(mut self, launcher: LauncherHandle) -> Self {
        self.launcher = launcher;
        self
    }
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self {
            catalog: Arc::new(StaticCatalog::new()),
            metrics: crate::metrics::noop_metrics(),
            launcher: external_workers(),
        }
    }
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("apis", &self.catalog.names().len())
            .field("metrics", &"<handle>")
            .finish()
    }
}
