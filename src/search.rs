//! Search orchestration: picks the backend chosen at startup, runs the
//! containment search, and shapes both backends' output into one result.
//!
//! The sample CSV and the PostGIS store are independent data sources. They are
//! never reconciled; which one answers is fixed for the life of the process.

use crate::columns::ColumnRegistry;
use crate::config::{AppConfig, BackendChoice};
use crate::data::DatasetCache;
use crate::error::{GeometryError, SearchError, StoreError};
use crate::geometry;
use crate::presets;
use crate::scan;
use crate::store::{IndexedEngine, PgStore};
use crate::types::{ColumnsResult, EstablishmentPoint, SearchResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub enum Backend {
    /// In-memory linear scan over the sample CSV.
    Sample(DatasetCache),
    /// Spatially indexed store.
    Indexed(IndexedEngine),
}

pub struct SearchService {
    backend: Backend,
    columns: ColumnRegistry,
    cap: usize,
}

impl SearchService {
    pub fn sample(cache: DatasetCache, cap: usize) -> Self {
        Self {
            backend: Backend::Sample(cache),
            columns: ColumnRegistry::new(),
            cap,
        }
    }

    pub fn indexed(engine: IndexedEngine) -> Self {
        let cap = engine.cap();
        Self {
            backend: Backend::Indexed(engine),
            columns: ColumnRegistry::new(),
            cap,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let cap = config.search.result_cap;
        Ok(match config.backend() {
            BackendChoice::Sample => Self::sample(
                DatasetCache::new(
                    &config.input.data_csv,
                    &config.input.geo_column,
                    config.delimiter_byte(),
                ),
                cap,
            ),
            BackendChoice::Indexed { url } => {
                let store = PgStore::connect_lazy(&url, config.database.max_connections)?;
                Self::indexed(IndexedEngine::new(Arc::new(store), cap))
            }
        })
    }

    pub fn is_sample_source(&self) -> bool {
        matches!(self.backend, Backend::Sample(_))
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Sample(_) => "sample",
            Backend::Indexed(_) => "indexed",
        }
    }

    /// Load the sample dataset up front so a broken source stops startup.
    /// The indexed backend has nothing to preload.
    pub async fn preload(&self) -> Result<(), SearchError> {
        if let Backend::Sample(cache) = &self.backend {
            let dataset = cache.get_or_load().await?;
            self.columns.publish(dataset.columns.clone());
        }
        Ok(())
    }

    /// Column list of the active backend, without running a search.
    pub async fn columns(&self) -> Result<ColumnsResult, SearchError> {
        Ok(ColumnsResult {
            columns: self.column_list(None).await?,
            is_sample_source: self.is_sample_source(),
        })
    }

    async fn column_list(
        &self,
        first: Option<&EstablishmentPoint>,
    ) -> Result<Arc<[String]>, SearchError> {
        if let Some(columns) = self.columns.get() {
            return Ok(columns);
        }

        let columns = match (&self.backend, first) {
            (Backend::Sample(cache), _) => cache.get_or_load().await?.columns.clone(),
            (Backend::Indexed(_), Some(point)) => point.fields.keys().clone(),
            (Backend::Indexed(engine), None) => engine.columns().await?,
        };
        Ok(self.columns.publish(columns))
    }

    pub async fn run_search<S: AsRef<str>>(
        &self,
        geometry: Option<&Value>,
        filters: &[S],
    ) -> Result<SearchResult, SearchError> {
        let geometry = match geometry::validate(geometry) {
            Ok(geometry) => geometry,
            Err(GeometryError::Missing) => {
                // Clearing the selection never fails, even with the backend down.
                let columns = self.column_list(None).await.unwrap_or_else(|err| {
                    warn!("column lookup failed for an empty search: {err}");
                    Arc::from(Vec::new())
                });
                return Ok(SearchResult {
                    points: Vec::new(),
                    columns,
                    is_sample_source: self.is_sample_source(),
                });
            }
            Err(err) => return Err(SearchError::MalformedGeometry(err)),
        };
        let active = presets::resolve(filters).map_err(SearchError::UnknownFilter)?;

        let started = Instant::now();
        let mut points = match &self.backend {
            Backend::Sample(cache) => {
                let dataset = cache.get_or_load().await?;
                tokio::task::spawn_blocking(move || scan::search(&dataset.points, &geometry))
                    .await
                    .map_err(|e| SearchError::TaskFailed(e.to_string()))?
            }
            Backend::Indexed(engine) => engine.search(&geometry).await.map_err(|err| {
                warn!("indexed search failed: {err}");
                err
            })?,
        };

        let columns = self.column_list(points.first()).await?;
        let matched = points.len();
        points = presets::apply(points, &active);
        points.truncate(self.cap);

        info!(
            backend = self.backend_name(),
            matched,
            returned = points.len(),
            filters = active.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search complete"
        );

        Ok(SearchResult {
            points,
            columns,
            is_sample_source: self.is_sample_source(),
        })
    }
}
