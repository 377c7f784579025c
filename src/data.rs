use crate::error::DatasetError;
use crate::types::{EstablishmentPoint, Fields};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Establishments parsed from the flat source, immutable once built.
#[derive(Debug)]
pub struct Dataset {
    pub points: Vec<EstablishmentPoint>,
    /// Header order without the combined geo column.
    pub columns: Arc<[String]>,
    pub skipped: usize,
}

/// Where the geo column sits in a header, and which columns become `fields`.
#[derive(Debug, Clone)]
pub struct RowLayout {
    geo_idx: usize,
    field_indices: Vec<usize>,
    keys: Arc<[String]>,
}

impl RowLayout {
    pub fn from_headers(headers: &StringRecord, geo_column: &str) -> Result<Self, DatasetError> {
        let geo_idx = headers
            .iter()
            .position(|h| h == geo_column)
            .ok_or_else(|| DatasetError::MissingGeoColumn(geo_column.to_string()))?;

        let (field_indices, keys): (Vec<usize>, Vec<String>) = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != geo_idx)
            .map(|(i, h)| (i, h.to_string()))
            .unzip();

        Ok(Self {
            geo_idx,
            field_indices,
            keys: keys.into(),
        })
    }

    pub fn columns(&self) -> &Arc<[String]> {
        &self.keys
    }

    /// `None` when the row's geo column is blank or unparsable.
    pub fn parse_row(&self, record: &StringRecord) -> Option<EstablishmentPoint> {
        let (latitude, longitude) = parse_lat_lon(record.get(self.geo_idx)?)?;
        let values = self
            .field_indices
            .iter()
            .map(|&i| record.get(i).unwrap_or("").to_string())
            .collect();

        Some(EstablishmentPoint {
            latitude,
            longitude,
            fields: Fields::new(self.keys.clone(), values),
        })
    }
}

/// Parse a combined `"lat,lon"` cell. Extra comma-separated parts are ignored.
pub fn parse_lat_lon(raw: &str) -> Option<(f64, f64)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut parts = raw.split(',');
    let lat: f64 = parts.next()?.trim().parse().ok()?;
    let lon: f64 = parts.next()?.trim().parse().ok()?;
    if lat.is_finite() && lon.is_finite() {
        Some((lat, lon))
    } else {
        None
    }
}

pub fn csv_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader)
}

pub fn load_dataset(path: &Path, geo_column: &str, delimiter: u8) -> Result<Dataset, DatasetError> {
    info!("Loading dataset from {:?}...", path);
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = read_dataset(file, geo_column, delimiter)?;
    info!(
        "Loaded {} establishments ({} rows skipped without usable coordinates)",
        dataset.points.len(),
        dataset.skipped
    );
    Ok(dataset)
}

pub fn read_dataset<R: Read>(
    reader: R,
    geo_column: &str,
    delimiter: u8,
) -> Result<Dataset, DatasetError> {
    let mut rdr = csv_reader(reader, delimiter);
    let headers = rdr.headers()?.clone();
    let layout = RowLayout::from_headers(&headers, geo_column)?;

    let mut points = Vec::new();
    let mut skipped = 0;
    for result in rdr.records() {
        let record = result?;
        match layout.parse_row(&record) {
            Some(point) => points.push(point),
            None => {
                skipped += 1;
                let line = record.position().map(|p| p.line());
                debug!(line = ?line, "skipping row without coordinates");
            }
        }
    }

    Ok(Dataset {
        points,
        columns: layout.columns().clone(),
        skipped,
    })
}

/// Process-lifetime cache of the sample dataset.
///
/// The dataset is computed outside the cell and published only if nothing
/// else got there first, so racing first calls never corrupt it.
#[derive(Debug)]
pub struct DatasetCache {
    source: PathBuf,
    geo_column: String,
    delimiter: u8,
    cell: OnceLock<Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new(source: impl Into<PathBuf>, geo_column: impl Into<String>, delimiter: u8) -> Self {
        Self {
            source: source.into(),
            geo_column: geo_column.into(),
            delimiter,
            cell: OnceLock::new(),
        }
    }

    pub fn cached(&self) -> Option<Arc<Dataset>> {
        self.cell.get().cloned()
    }

    pub async fn get_or_load(&self) -> Result<Arc<Dataset>, DatasetError> {
        if let Some(dataset) = self.cached() {
            return Ok(dataset);
        }

        let source = self.source.clone();
        let geo_column = self.geo_column.clone();
        let delimiter = self.delimiter;
        let dataset =
            tokio::task::spawn_blocking(move || load_dataset(&source, &geo_column, delimiter))
                .await
                .map_err(|e| DatasetError::Join(e.to_string()))??;

        Ok(self.publish(dataset))
    }

    fn publish(&self, dataset: Dataset) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        match self.cell.set(dataset.clone()) {
            Ok(()) => dataset,
            Err(_) => self.cached().unwrap_or(dataset),
        }
    }
}
