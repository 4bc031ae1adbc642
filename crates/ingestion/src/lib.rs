//! Vis4T Ingestion
//!
//! Roster and score ingestion:
//! 1. `loader` reads an `.xlsx`/`.csv` export and cuts the template banner
//! 2. `normalizer` turns the table into roster rows with derived emails
//! 3. `reconciler` attaches per-subject scores to a class's students
//!
//! `seed` holds the JSON reference data imports used by the `vis4t-ingest`
//! maintenance binary.

pub mod errors;
pub mod loader;
pub mod normalizer;
pub mod reconciler;
pub mod seed;

pub use errors::IngestionError;
pub use loader::{Loader, Table, TemplateLayout};
pub use normalizer::{Normalizer, RosterRow};
pub use reconciler::{ReconcileReport, Reconciler, ScoreStore};

use std::path::Path;
use vis4t_common::config::IngestionConfig;

/// Load and normalize a roster file in one step
pub fn read_roster(path: &Path, config: &IngestionConfig) -> Result<Vec<RosterRow>, IngestionError> {
    let table = Loader::new(TemplateLayout::from(config)).load(path)?;
    Normalizer::from(config).normalize(&table)
}
