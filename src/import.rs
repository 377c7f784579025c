//! Bulk loader for the indexed store.
//!
//! Streams the flat source with the same row rules as the sample loader and
//! upserts batches keyed by SIRET (last write wins).

use crate::data::{csv_reader, RowLayout};
use crate::error::DatasetError;
use crate::store::SRID_WGS84;
use crate::types::EstablishmentPoint;
use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

pub const BATCH_SIZE: usize = 1000;

const SCHEMA: [&str; 3] = [
    "CREATE EXTENSION IF NOT EXISTS postgis",
    "CREATE TABLE IF NOT EXISTS establishments (
        siret  TEXT PRIMARY KEY,
        lat    DOUBLE PRECISION NOT NULL,
        lon    DOUBLE PRECISION NOT NULL,
        geom   geometry(Point, 4326) NOT NULL,
        fields JSONB NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS establishments_geom_idx ON establishments USING GIST (geom)",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub upserted: usize,
    pub skipped: usize,
}

#[derive(Debug)]
struct Batch {
    rows: Vec<(String, EstablishmentPoint)>,
    skipped: usize,
}

pub async fn run_import(
    url: &str,
    source: &Path,
    geo_column: &str,
    delimiter: u8,
) -> Result<ImportStats> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(url)
        .await
        .context("Failed to connect to the database")?;
    info!("Database connected.");

    ensure_schema(&pool).await.context("Failed to prepare the establishments table")?;

    let (tx, mut rx) = mpsc::channel::<Batch>(4);
    let reader = spawn_reader(source.to_path_buf(), geo_column.to_string(), delimiter, tx);

    let mut stats = ImportStats::default();
    while let Some(batch) = rx.recv().await {
        stats.skipped += batch.skipped;
        let rows = collapse_duplicates(batch.rows);
        if !rows.is_empty() {
            let count = rows.len();
            upsert_batch(&pool, rows).await.context("Insert failed")?;
            stats.upserted += count;
            info!("Upserted {} rows...", stats.upserted);
        }
    }

    reader
        .await
        .context("CSV reader task panicked")?
        .with_context(|| format!("Failed to read {:?}", source))?;

    info!(
        "Done. Inserted/updated {} rows, skipped {} (missing coordinates or SIRET).",
        stats.upserted, stats.skipped
    );
    pool.close().await;
    Ok(stats)
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

fn spawn_reader(
    source: PathBuf,
    geo_column: String,
    delimiter: u8,
    tx: mpsc::Sender<Batch>,
) -> tokio::task::JoinHandle<Result<(), DatasetError>> {
    tokio::task::spawn_blocking(move || {
        info!("Reading: {:?}", source);
        let file = File::open(&source).map_err(|e| DatasetError::Open {
            path: source.clone(),
            source: e,
        })?;
        let mut rdr = csv_reader(file, delimiter);
        let layout = RowLayout::from_headers(&rdr.headers()?.clone(), &geo_column)?;

        let mut batch = Batch {
            rows: Vec::with_capacity(BATCH_SIZE),
            skipped: 0,
        };
        for result in rdr.records() {
            let record = result?;
            match layout.parse_row(&record).and_then(keyed) {
                Some(row) => batch.rows.push(row),
                None => batch.skipped += 1,
            }

            if batch.rows.len() >= BATCH_SIZE {
                let full = std::mem::replace(
                    &mut batch,
                    Batch {
                        rows: Vec::with_capacity(BATCH_SIZE),
                        skipped: 0,
                    },
                );
                // Receiver gone means the writer failed; it reports the error.
                if tx.blocking_send(full).is_err() {
                    return Ok(());
                }
            }
        }
        let _ = tx.blocking_send(batch);
        Ok(())
    })
}

fn keyed(point: EstablishmentPoint) -> Option<(String, EstablishmentPoint)> {
    let siret = point.siret()?.trim().to_string();
    if siret.is_empty() {
        return None;
    }
    Some((siret, point))
}

/// Keep only the last row per SIRET, in first-seen order. Postgres rejects an
/// upsert that touches the same key twice in one statement.
fn collapse_duplicates(
    rows: Vec<(String, EstablishmentPoint)>,
) -> Vec<(String, EstablishmentPoint)> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut unique: Vec<(String, EstablishmentPoint)> = Vec::with_capacity(rows.len());
    for (siret, point) in rows {
        match slots.get(&siret) {
            Some(&i) => unique[i].1 = point,
            None => {
                slots.insert(siret.clone(), unique.len());
                unique.push((siret, point));
            }
        }
    }
    unique
}

fn upsert_query(rows: Vec<(String, EstablishmentPoint)>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("INSERT INTO establishments (siret, lat, lon, geom, fields) ");
    qb.push_values(rows, |mut b, (siret, point)| {
        b.push_bind(siret)
            .push_bind(point.latitude)
            .push_bind(point.longitude)
            .push("ST_SetSRID(ST_MakePoint(")
            .push_bind_unseparated(point.longitude)
            .push_unseparated(", ")
            .push_bind_unseparated(point.latitude)
            .push_unseparated(format!("), {SRID_WGS84})"))
            .push_bind(Json(point.fields));
    });
    qb.push(
        " ON CONFLICT (siret) DO UPDATE SET \
         lat = EXCLUDED.lat, lon = EXCLUDED.lon, geom = EXCLUDED.geom, fields = EXCLUDED.fields",
    );
    qb
}

async fn upsert_batch(
    pool: &PgPool,
    rows: Vec<(String, EstablishmentPoint)>,
) -> Result<(), sqlx::Error> {
    upsert_query(rows).build().execute(pool).await?;
    Ok(())
}
