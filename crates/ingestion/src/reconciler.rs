//! Score reconciler
//!
//! Attaches per-subject scores to a class's students. Score exports name
//! subjects in free text, so every observation is resolved against the
//! subject catalog through an ordered chain of [`SubjectMatcher`]s before
//! it is written. Writes only ever add rows: a (student, subject) pair that
//! already has a score is left alone.

use crate::errors::IngestionError;
use crate::normalizer::canonical_student_id;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, error, info, instrument, warn};
use vis4t_common::config::IngestionConfig;
use vis4t_common::db::models::{Subject, SubjectScore};
use vis4t_common::db::Repository;
use vis4t_common::metrics;

/// Score value marking a subject the student has not sat yet
pub const UNEXAMINED: f64 = -1.0;

/// One subject score as exported for a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreObservation {
    pub subject_name: String,
    #[serde(default = "unexamined", deserialize_with = "score_or_unexamined")]
    pub score_10: f64,
}

fn unexamined() -> f64 {
    UNEXAMINED
}

fn score_or_unexamined<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(UNEXAMINED))
}

/// Score observations for one class, keyed by student ID
pub type ClassScores = HashMap<String, Vec<ScoreObservation>>;

/// Outcome of reconciling one class
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub class_name: String,
    pub created: usize,
    pub skipped_existing: usize,
    pub skipped_unexamined: usize,
    pub unresolved_subjects: Vec<String>,
    pub missing_students: Vec<String>,
    /// Set when a batch insert failed; later batches were not attempted
    pub batch_error: Option<String>,
}

/// Storage the reconciler reads from and writes to
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Subjects offered in the class
    async fn class_subjects(&self, class_name: &str) -> Result<Vec<Subject>, IngestionError>;

    /// The whole subject catalog, ordered by subject ID
    async fn catalog(&self) -> Result<Vec<Subject>, IngestionError>;

    /// IDs of the students enrolled in the class
    async fn class_student_ids(&self, class_name: &str) -> Result<Vec<String>, IngestionError>;

    async fn score_exists(&self, student_id: &str, subject_id: &str)
        -> Result<bool, IngestionError>;

    /// Insert scores, ignoring pairs that already exist; returns rows written
    async fn insert_scores(&self, scores: Vec<SubjectScore>) -> Result<u64, IngestionError>;
}

#[async_trait]
impl ScoreStore for Repository {
    async fn class_subjects(&self, class_name: &str) -> Result<Vec<Subject>, IngestionError> {
        Ok(self.list_class_subjects(class_name).await?)
    }

    async fn catalog(&self) -> Result<Vec<Subject>, IngestionError> {
        Ok(self.list_subjects().await?)
    }

    async fn class_student_ids(&self, class_name: &str) -> Result<Vec<String>, IngestionError> {
        Ok(Repository::class_student_ids(self, class_name).await?)
    }

    async fn score_exists(
        &self,
        student_id: &str,
        subject_id: &str,
    ) -> Result<bool, IngestionError> {
        Ok(Repository::score_exists(self, student_id, subject_id).await?)
    }

    async fn insert_scores(&self, scores: Vec<SubjectScore>) -> Result<u64, IngestionError> {
        Ok(Repository::insert_scores(self, scores).await?)
    }
}

// ============================================================================
// Subject matching
// ============================================================================

fn match_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Name-to-ID tables for one reconciliation pass
#[derive(Debug, Default)]
pub struct SubjectLookup {
    offerings: HashMap<String, String>,
    catalog: HashMap<String, String>,
    catalog_ordered: Vec<(String, String)>,
}

impl SubjectLookup {
    pub fn new(offerings: &[Subject], catalog: &[Subject]) -> Self {
        let mut lookup = Self::default();

        for subject in offerings {
            lookup
                .offerings
                .entry(match_key(&subject.subject_name))
                .or_insert_with(|| subject.subject_id.clone());
        }

        let mut ordered: Vec<&Subject> = catalog.iter().collect();
        ordered.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        for subject in ordered {
            let key = match_key(&subject.subject_name);
            lookup
                .catalog
                .entry(key.clone())
                .or_insert_with(|| subject.subject_id.clone());
            lookup.catalog_ordered.push((key, subject.subject_id.clone()));
        }

        lookup
    }
}

/// One strategy for resolving an observed subject name to a subject ID
pub trait SubjectMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// `observed` is already trimmed and lower-cased
    fn resolve(&self, observed: &str, lookup: &SubjectLookup) -> Option<String>;
}

/// Exact name among the class's own offerings
pub struct OfferingExactMatcher;

impl SubjectMatcher for OfferingExactMatcher {
    fn name(&self) -> &'static str {
        "offering_exact"
    }

    fn resolve(&self, observed: &str, lookup: &SubjectLookup) -> Option<String> {
        lookup.offerings.get(observed).cloned()
    }
}

/// Exact name anywhere in the catalog
pub struct CatalogExactMatcher;

impl SubjectMatcher for CatalogExactMatcher {
    fn name(&self) -> &'static str {
        "catalog_exact"
    }

    fn resolve(&self, observed: &str, lookup: &SubjectLookup) -> Option<String> {
        lookup.catalog.get(observed).cloned()
    }
}

/// Either name contains the other; first catalog hit in subject ID order.
///
/// Short catalog names can capture unrelated observations.
pub struct SubstringMatcher;

impl SubjectMatcher for SubstringMatcher {
    fn name(&self) -> &'static str {
        "substring"
    }

    fn resolve(&self, observed: &str, lookup: &SubjectLookup) -> Option<String> {
        lookup
            .catalog_ordered
            .iter()
            .find(|(name, _)| {
                !name.is_empty() && (observed.contains(name.as_str()) || name.contains(observed))
            })
            .map(|(_, id)| id.clone())
    }
}

/// Offering exact, then catalog exact, then substring
pub fn default_matchers() -> Vec<Box<dyn SubjectMatcher>> {
    vec![
        Box::new(OfferingExactMatcher),
        Box::new(CatalogExactMatcher),
        Box::new(SubstringMatcher),
    ]
}

// ============================================================================
// Reconciler
// ============================================================================

pub struct Reconciler<S> {
    store: S,
    matchers: Vec<Box<dyn SubjectMatcher>>,
    batch_size: usize,
    student_id_width: usize,
}

impl<S: ScoreStore> Reconciler<S> {
    pub fn new(store: S, config: &IngestionConfig) -> Self {
        Self {
            store,
            matchers: default_matchers(),
            batch_size: config.batch_size.max(1),
            student_id_width: config.student_id_width,
        }
    }

    /// Replace the matcher chain
    pub fn with_matchers(mut self, matchers: Vec<Box<dyn SubjectMatcher>>) -> Self {
        self.matchers = matchers;
        self
    }

    /// Resolve an observed subject name; first matcher to hit wins
    pub fn resolve(&self, observed: &str, lookup: &SubjectLookup) -> Option<String> {
        let key = match_key(observed);
        if key.is_empty() {
            return None;
        }

        self.matchers.iter().find_map(|matcher| {
            let hit = matcher.resolve(&key, lookup);
            if let Some(ref subject_id) = hit {
                debug!(observed = %key, subject_id = %subject_id, matcher = matcher.name(), "Subject resolved");
            }
            hit
        })
    }

    /// Reconcile one class's score export
    #[instrument(skip(self, scores), fields(students = scores.len()))]
    pub async fn reconcile_class(
        &self,
        class_name: &str,
        scores: &ClassScores,
    ) -> Result<ReconcileReport, IngestionError> {
        let offerings = self.store.class_subjects(class_name).await?;
        let catalog = self.store.catalog().await?;
        let lookup = SubjectLookup::new(&offerings, &catalog);

        let roster: HashSet<String> = self
            .store
            .class_student_ids(class_name)
            .await?
            .into_iter()
            .collect();

        let mut report = ReconcileReport {
            class_name: class_name.to_string(),
            ..ReconcileReport::default()
        };
        let mut unresolved = BTreeSet::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut pending = Vec::new();

        let mut student_keys: Vec<&String> = scores.keys().collect();
        student_keys.sort();

        for raw_id in student_keys {
            let student_id = canonical_student_id(raw_id, self.student_id_width);
            if !roster.contains(&student_id) {
                warn!(class_name, student_id = %student_id, "Student not in class roster, skipping");
                report.missing_students.push(student_id);
                continue;
            }

            for observation in &scores[raw_id] {
                if observation.score_10 < 0.0 {
                    report.skipped_unexamined += 1;
                    continue;
                }

                let Some(subject_id) = self.resolve(&observation.subject_name, &lookup) else {
                    unresolved.insert(observation.subject_name.trim().to_string());
                    continue;
                };

                let pair = (student_id.clone(), subject_id.clone());
                if seen.contains(&pair) {
                    report.skipped_existing += 1;
                    continue;
                }
                if self.store.score_exists(&student_id, &subject_id).await? {
                    report.skipped_existing += 1;
                    seen.insert(pair);
                    continue;
                }

                pending.push(SubjectScore {
                    student_id: student_id.clone(),
                    subject_id,
                    score_10: observation.score_10,
                });
                seen.insert(pair);
            }
        }

        report.unresolved_subjects = unresolved.into_iter().collect();

        for (index, batch) in pending.chunks(self.batch_size).enumerate() {
            match self.store.insert_scores(batch.to_vec()).await {
                Ok(written) => report.created += written as usize,
                Err(e) => {
                    error!(class_name, batch = index, error = %e, "Score batch failed, abandoning remaining batches");
                    report.batch_error = Some(e.to_string());
                    break;
                }
            }
        }

        info!(
            class_name,
            created = report.created,
            skipped_existing = report.skipped_existing,
            skipped_unexamined = report.skipped_unexamined,
            unresolved = report.unresolved_subjects.len(),
            missing_students = report.missing_students.len(),
            "Class reconciled"
        );
        if !report.unresolved_subjects.is_empty() {
            warn!(class_name, subjects = ?report.unresolved_subjects, "Unresolved subject names");
        }

        metrics::record_reconcile(
            class_name,
            report.created,
            report.skipped_existing,
            report.skipped_unexamined,
            report.unresolved_subjects.len(),
        );

        Ok(report)
    }
}
