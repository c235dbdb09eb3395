//! Static beach directory.
//!
//! The beach list is a data file, not an upstream: it is parsed once at
//! startup and held immutable for the life of the process. The dataset
//! keeps its own field names, which follow the upstream ids it points
//! at (AEMET beach codes, Cruz Roja beach ids).

use std::collections::HashMap;
use std::path::Path;

use common::{Beach, Error, Result};
use serde::Deserialize;
use tracing::info;

/// One record of `data/beaches.json`.
#[derive(Debug, Deserialize)]
struct RawBeach {
    codigo: String,
    nombre: String,
    municipio: String,
    lat: f64,
    lon: f64,
    /// Zero or negative means the beach has no surveillance post.
    #[serde(rename = "idCruzRoja", default)]
    id_cruz_roja: i64,
}

/// In-memory, id-indexed beach list.
#[derive(Debug)]
pub struct BeachDirectory {
    beaches: Vec<Beach>,
    index: HashMap<String, usize>,
}

impl BeachDirectory {
    /// Load and index the dataset. A missing or malformed file is a
    /// startup error; there is no runtime fallback for the directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read beach dataset {}: {}",
                path.display(),
                e
            ))
        })?;
        let raw: Vec<RawBeach> = serde_json::from_str(&contents)?;
        if raw.is_empty() {
            return Err(Error::Config(format!(
                "beach dataset {} has no entries",
                path.display()
            )));
        }

        let directory = Self::from_beaches(raw.into_iter().map(beach_from_raw).collect());
        info!(
            "Loaded {} beaches from {}",
            directory.beaches.len(),
            path.display()
        );
        Ok(directory)
    }

    /// Build a directory from already-constructed records.
    pub fn from_beaches(beaches: Vec<Beach>) -> Self {
        let index = beaches
            .iter()
            .enumerate()
            .map(|(position, beach)| (beach.id.clone(), position))
            .collect();
        Self { beaches, index }
    }

    pub fn all(&self) -> &[Beach] {
        &self.beaches
    }

    pub fn by_id(&self, id: &str) -> Option<&Beach> {
        self.index.get(id).map(|&position| &self.beaches[position])
    }

    pub fn len(&self) -> usize {
        self.beaches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beaches.is_empty()
    }
}

fn beach_from_raw(raw: RawBeach) -> Beach {
    Beach {
        id: raw.codigo.clone(),
        name: raw.nombre,
        municipality: raw.municipio,
        forecast_code: raw.codigo,
        latitude: raw.lat,
        longitude: raw.lon,
        red_cross_id: u32::try_from(raw.id_cruz_roja).ok().filter(|id| *id > 0),
    }
}
