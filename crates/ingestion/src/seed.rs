//! Reference data import
//!
//! Loads the subject catalog, per-class subject offerings, JSON rosters and
//! per-class score exports. Everything here is get-or-create: running an
//! import twice changes nothing the second time.

use crate::errors::IngestionError;
use crate::normalizer::canonical_student_id;
use crate::reconciler::ClassScores;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use vis4t_common::db::{Repository, StudentFields};
use vis4t_common::errors::AppError;

/// Catalog entry in `subjects.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubjectSeed {
    pub name_code: String,
    pub name: String,
    pub credit: i32,
}

/// Offering entry in `subjects_class.json`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OfferingSeed {
    pub name_code: String,
    pub semester_id: i32,
}

/// `subjects_class.json`: class name to its offerings
pub type OfferingSeeds = HashMap<String, Vec<OfferingSeed>>;

/// Student IDs appear both as numbers and as strings in exported rosters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StudentIdValue {
    Number(i64),
    Text(String),
}

impl StudentIdValue {
    /// Stored form; numeric IDs are zero-padded
    pub fn canonical(&self, width: usize) -> String {
        match self {
            StudentIdValue::Number(n) => format!("{:0>width$}", n, width = width),
            StudentIdValue::Text(s) => canonical_student_id(s, width),
        }
    }
}

/// One student in a JSON roster
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterRecord {
    pub student_id: StudentIdValue,
    pub student_name: String,
    pub student_gmail: String,
    pub passed_credit: i32,
    pub score_10: f64,
    pub score_4: f64,
    pub score_char: String,
    #[serde(default)]
    pub rank: Option<String>,
}

impl RosterRecord {
    fn to_fields(&self) -> StudentFields {
        StudentFields {
            student_name: self.student_name.clone(),
            student_gmail: self.student_gmail.clone(),
            passed_credit: self.passed_credit,
            score_10: self.score_10,
            score_4: self.score_4,
            score_char: self.score_char.clone(),
            rank: self.rank.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeedReport {
    pub subjects_created: usize,
    pub offerings_created: usize,
    pub skipped_classes: Vec<String>,
    pub missing_subjects: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub class_name: String,
    pub created: usize,
    pub existing: usize,
    pub number_of_student: u64,
}

/// Read and parse a JSON data file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IngestionError> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| IngestionError::InvalidSeedData {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Location of a class's score export inside a data directory
pub fn score_file(data_dir: &Path, class_name: &str) -> PathBuf {
    data_dir.join(format!("{}_score.json", class_name))
}

/// Read `{class}_score.json` from the data directory
pub fn load_class_scores(data_dir: &Path, class_name: &str) -> Result<ClassScores, IngestionError> {
    read_json(&score_file(data_dir, class_name))
}

/// Seed the subject catalog, then the class offerings.
///
/// Classes that do not exist are skipped; offerings naming an unknown
/// subject code are skipped.
#[instrument(skip_all, fields(subjects = subjects.len(), classes = offerings.len()))]
pub async fn seed_subjects(
    repo: &Repository,
    subjects: &[SubjectSeed],
    offerings: &OfferingSeeds,
) -> Result<SeedReport, IngestionError> {
    let mut report = SeedReport::default();

    for seed in subjects {
        let (subject, created) = repo
            .get_or_create_subject(&seed.name_code, &seed.name, seed.credit)
            .await?;
        if created {
            info!(subject_id = %subject.subject_id, subject_name = %subject.subject_name, "Created subject");
            report.subjects_created += 1;
        }
    }

    let mut class_names: Vec<&String> = offerings.keys().collect();
    class_names.sort();

    for class_name in class_names {
        if repo.find_class(class_name).await?.is_none() {
            warn!(class_name = %class_name, "Class not found, skipping its subjects");
            report.skipped_classes.push(class_name.clone());
            continue;
        }

        for offering in &offerings[class_name] {
            if repo.find_subject(&offering.name_code).await?.is_none() {
                warn!(class_name = %class_name, subject_id = %offering.name_code, "Unknown subject code, skipping offering");
                report.missing_subjects.push(offering.name_code.clone());
                continue;
            }

            let created = repo
                .get_or_create_offering(class_name, &offering.name_code, offering.semester_id)
                .await?;
            if created {
                info!(class_name = %class_name, subject_id = %offering.name_code, "Created subject offering");
                report.offerings_created += 1;
            }
        }
    }

    Ok(report)
}

/// Create the roster's students in an existing class, leaving existing IDs untouched
#[instrument(skip(repo, records), fields(records = records.len()))]
pub async fn import_roster(
    repo: &Repository,
    class_name: &str,
    records: &[RosterRecord],
    student_id_width: usize,
) -> Result<ImportReport, IngestionError> {
    if repo.find_class(class_name).await?.is_none() {
        return Err(AppError::ClassNotFound {
            class_name: class_name.to_string(),
        }
        .into());
    }

    let mut report = ImportReport {
        class_name: class_name.to_string(),
        ..ImportReport::default()
    };

    for record in records {
        let student_id = record.student_id.canonical(student_id_width);
        if repo
            .create_student_if_absent(class_name, &student_id, record.to_fields())
            .await?
        {
            report.created += 1;
        } else {
            report.existing += 1;
        }
    }

    report.number_of_student = repo.refresh_student_count(class_name).await?;
    info!(
        class_name,
        created = report.created,
        existing = report.existing,
        "Roster imported"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::Reconciler;
    use sea_orm::Database;
    use std::io::Write;
    use tempfile::TempDir;
    use vis4t_common::config::IngestionConfig;
    use vis4t_common::db::{DbPool, NewClass, NewTeacher};

    /// SQLite-backed repository with teacher `test` owning class `KHMT16A`
    async fn sqlite_repo() -> (TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("vis4t.db").display());
        let pool = DbPool::from_connection(Database::connect(url).await.unwrap());
        pool.create_schema().await.unwrap();

        let repo = Repository::new(pool);
        repo.create_teacher(NewTeacher {
            teacher_id: "test".to_string(),
            email: "test@gmail.com".to_string(),
            password_hash: String::new(),
            full_name: String::new(),
            phone: String::new(),
        })
        .await
        .unwrap();
        repo.create_class(
            "test",
            NewClass {
                class_name: "KHMT16A".to_string(),
                number_of_student: 0,
                class_major: "Khoa Học Máy Tính".to_string(),
                teacher_note: String::new(),
                total_credit: 128,
                total_semester: 8,
            },
        )
        .await
        .unwrap();

        (dir, repo)
    }

    #[test]
    fn test_parse_subject_seeds() {
        let subjects: Vec<SubjectSeed> = serde_json::from_str(
            r#"[{"name_code": "MATH201", "name": " Giải tích ", "credit": 3}]"#,
        )
        .unwrap();
        assert_eq!(subjects[0].name_code, "MATH201");
        assert_eq!(subjects[0].credit, 3);

        let offerings: OfferingSeeds = serde_json::from_str(
            r#"{"KHDL16A": [{"name_code": "MATH201", "semester_id": 1}]}"#,
        )
        .unwrap();
        assert_eq!(offerings["KHDL16A"][0].semester_id, 1);
    }

    #[test]
    fn test_parse_roster_records() {
        let records: Vec<RosterRecord> = serde_json::from_str(
            r#"[
                {"student_id": 12345, "student_name": "Lê An", "student_gmail": "an.12345@iuh.edu.vn",
                 "passed_credit": 100, "score_10": 7.1, "score_4": 3.0, "score_char": "B", "rank": null},
                {"student_id": "20000002", "student_name": "Trần Bình", "student_gmail": "binh.20000002@iuh.edu.vn",
                 "passed_credit": 110, "score_10": 8.0, "score_4": 3.5, "score_char": "B+", "rank": "Giỏi"}
            ]"#,
        )
        .unwrap();

        assert_eq!(records[0].student_id.canonical(8), "00012345");
        assert_eq!(records[0].to_fields().rank, "");
        assert_eq!(records[1].student_id.canonical(8), "20000002");
        assert_eq!(records[1].to_fields().rank, "Giỏi");
    }

    #[test]
    fn test_load_class_scores() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(score_file(dir.path(), "KHDL16A")).unwrap();
        file.write_all(
            r#"{"20000001": [{"subject_name": "Giải tích", "score_10": 8.5}, {"subject_name": "Vật lý"}]}"#
                .as_bytes(),
        )
        .unwrap();

        let scores = load_class_scores(dir.path(), "KHDL16A").unwrap();
        assert_eq!(scores["20000001"].len(), 2);
        assert_eq!(scores["20000001"][1].score_10, -1.0);
    }

    #[test]
    fn test_missing_and_invalid_score_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_class_scores(dir.path(), "KHMT13A"),
            Err(IngestionError::Io(_))
        ));

        std::fs::write(score_file(dir.path(), "KHMT13A"), "{not json").unwrap();
        assert!(matches!(
            load_class_scores(dir.path(), "KHMT13A"),
            Err(IngestionError::InvalidSeedData { .. })
        ));
    }

    #[tokio::test]
    async fn test_seed_import_and_reconcile_against_database() {
        let (_dir, repo) = sqlite_repo().await;

        // Two catalog subjects share a name; the class only offers the second
        let subjects: Vec<SubjectSeed> = serde_json::from_str(
            r#"[
                {"name_code": "A1", "name": "Calculus I", "credit": 3},
                {"name_code": "B2", "name": "Calculus I", "credit": 3},
                {"name_code": "C3", "name": "Physics", "credit": 2}
            ]"#,
        )
        .unwrap();
        let offerings: OfferingSeeds = serde_json::from_str(
            r#"{
                "KHMT16A": [{"name_code": "B2", "semester_id": 1}, {"name_code": "ZZ9", "semester_id": 2}],
                "KHMT99Z": [{"name_code": "A1", "semester_id": 1}]
            }"#,
        )
        .unwrap();

        let report = seed_subjects(&repo, &subjects, &offerings).await.unwrap();
        assert_eq!(report.subjects_created, 3);
        assert_eq!(report.offerings_created, 1);
        assert_eq!(report.skipped_classes, vec!["KHMT99Z".to_string()]);
        assert_eq!(report.missing_subjects, vec!["ZZ9".to_string()]);

        let again = seed_subjects(&repo, &subjects, &offerings).await.unwrap();
        assert_eq!(again.subjects_created, 0);
        assert_eq!(again.offerings_created, 0);

        let records: Vec<RosterRecord> = serde_json::from_str(
            r#"[
                {"student_id": 12345, "student_name": "Lê An", "student_gmail": "an.12345@iuh.edu.vn",
                 "passed_credit": 100, "score_10": 7.1, "score_4": 3.0, "score_char": "B"},
                {"student_id": "20000002", "student_name": "Trần Bình", "student_gmail": "binh.20000002@iuh.edu.vn",
                 "passed_credit": 110, "score_10": 8.0, "score_4": 3.5, "score_char": "B+", "rank": "Giỏi"}
            ]"#,
        )
        .unwrap();
        let imported = import_roster(&repo, "KHMT16A", &records, 8).await.unwrap();
        assert_eq!(imported.created, 2);
        assert_eq!(imported.number_of_student, 2);

        let reimported = import_roster(&repo, "KHMT16A", &records, 8).await.unwrap();
        assert_eq!(reimported.created, 0);
        assert_eq!(reimported.existing, 2);

        let missing_class = import_roster(&repo, "KHMT99Z", &records, 8).await.unwrap_err();
        assert!(matches!(missing_class, IngestionError::Storage(AppError::ClassNotFound { .. })));

        let scores: ClassScores = serde_json::from_str(
            r#"{
                "12345": [{"subject_name": "calculus i ", "score_10": 8.0}, {"subject_name": "Physics"}],
                "20000002": [
                    {"subject_name": "Calculus I", "score_10": 7.5},
                    {"subject_name": "General Physics", "score_10": 6.0},
                    {"subject_name": "Chemistry", "score_10": 9.0}
                ],
                "99999999": [{"subject_name": "Calculus I", "score_10": 5.0}]
            }"#,
        )
        .unwrap();

        let reconciler = Reconciler::new(repo.clone(), &IngestionConfig::default());

        let first = reconciler.reconcile_class("KHMT16A", &scores).await.unwrap();
        assert_eq!(first.created, 3);
        assert_eq!(first.skipped_unexamined, 1);
        assert_eq!(first.unresolved_subjects, vec!["Chemistry".to_string()]);
        assert_eq!(first.missing_students.len(), 1);
        assert!(first.batch_error.is_none());

        // The class offering wins over the same-named catalog entry
        assert!(repo.score_exists("00012345", "B2").await.unwrap());
        assert!(!repo.score_exists("00012345", "A1").await.unwrap());
        assert!(repo.score_exists("20000002", "C3").await.unwrap());

        let second = reconciler.reconcile_class("KHMT16A", &scores).await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped_existing, 3);
    }
}
