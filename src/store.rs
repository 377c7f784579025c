//! Indexed spatial query engine backed by PostgreSQL/PostGIS.
//!
//! The `establishments` table is filled by the `import` subcommand; this side
//! only reads it.

use crate::error::StoreError;
use crate::geometry::{self, ValidGeometry};
use crate::scan;
use crate::types::{EstablishmentPoint, Fields};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// WGS84, the only spatial reference the store holds.
pub const SRID_WGS84: i32 = 4326;

const SEARCH_SQL: &str = "\
    SELECT lat, lon, fields \
    FROM establishments \
    WHERE ST_Within(geom, ST_SetSRID(ST_GeomFromGeoJSON($1), $2)) \
    LIMIT $3";

const FIRST_FIELDS_SQL: &str = "SELECT fields FROM establishments LIMIT 1";

/// A persistent store able to answer containment queries.
#[async_trait]
pub trait SpatialStore: Send + Sync {
    /// Rows whose point lies within `geojson` (a WGS84 GeoJSON geometry), at most `limit`.
    async fn fetch_within(
        &self,
        geojson: &str,
        limit: usize,
    ) -> Result<Vec<EstablishmentPoint>, StoreError>;

    /// Fields of any one stored row, used to derive the column list.
    async fn first_fields(&self) -> Result<Option<Fields>, StoreError>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Build a bounded pool without connecting; connections open on first use.
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(url)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SpatialStore for PgStore {
    async fn fetch_within(
        &self,
        geojson: &str,
        limit: usize,
    ) -> Result<Vec<EstablishmentPoint>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        // The pool hands the connection back when the query future completes or is dropped.
        let rows: Vec<(f64, f64, Json<Fields>)> = sqlx::query_as(SEARCH_SQL)
            .bind(geojson)
            .bind(SRID_WGS84)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(latitude, longitude, Json(fields))| EstablishmentPoint {
                latitude,
                longitude,
                fields,
            })
            .collect())
    }

    async fn first_fields(&self) -> Result<Option<Fields>, StoreError> {
        let row: Option<(Json<Fields>,)> = sqlx::query_as(FIRST_FIELDS_SQL)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(fields),)| fields))
    }
}

/// In-process store over a fixed point set, answering with the same
/// containment rules as the linear scan. Lets the indexed path run without PostGIS.
pub struct MemoryStore {
    points: Vec<EstablishmentPoint>,
}

impl MemoryStore {
    pub fn new(points: Vec<EstablishmentPoint>) -> Self {
        Self { points }
    }
}

#[async_trait]
impl SpatialStore for MemoryStore {
    async fn fetch_within(
        &self,
        geojson: &str,
        limit: usize,
    ) -> Result<Vec<EstablishmentPoint>, StoreError> {
        let value: serde_json::Value = serde_json::from_str(geojson)?;
        let geometry = geometry::validate(Some(&value))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut found = scan::search(&self.points, &geometry);
        found.truncate(limit);
        Ok(found)
    }

    async fn first_fields(&self) -> Result<Option<Fields>, StoreError> {
        Ok(self.points.first().map(|p| p.fields.clone()))
    }
}

/// Containment search against a [`SpatialStore`] with a hard row cap.
pub struct IndexedEngine {
    store: Arc<dyn SpatialStore>,
    cap: usize,
}

impl IndexedEngine {
    pub fn new(store: Arc<dyn SpatialStore>, cap: usize) -> Self {
        Self { store, cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Errors are returned as-is; nothing here retries.
    pub async fn search(
        &self,
        geometry: &ValidGeometry,
    ) -> Result<Vec<EstablishmentPoint>, StoreError> {
        // Rings that enclose nothing match nothing; the database would reject them.
        let geometry = geometry.areal();
        if geometry.bounds().is_none() {
            return Ok(Vec::new());
        }

        let literal = geometry.to_geojson()?;
        let mut rows = self.store.fetch_within(&literal, self.cap).await?;
        if rows.len() > self.cap {
            debug!(returned = rows.len(), cap = self.cap, "store ignored the row limit");
            rows.truncate(self.cap);
        }
        Ok(rows)
    }

    pub async fn columns(&self) -> Result<Arc<[String]>, StoreError> {
        Ok(self
            .store
            .first_fields()
            .await?
            .map(|fields| fields.keys().clone())
            .unwrap_or_else(|| Arc::from(Vec::new())))
    }
}
