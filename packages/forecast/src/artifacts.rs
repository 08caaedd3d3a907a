//! Persisted batch training artifacts.
//!
//! Written once by the trainer and loaded read-only at query time. Each
//! artifact is its own JSON file in the artifact directory:
//!
//! | File                      | Contents                                  |
//! |---------------------------|-------------------------------------------|
//! | `city_model.json`         | city-wide [`FittedModel`]                 |
//! | `region_models.json`      | region name to [`FittedModel`]            |
//! | `evaluations.json`        | [`RegionEvaluation`] per trained region   |
//! | `training_failures.json`  | [`TrainingFailure`] per failed region     |
//! | `manifest.json`           | [`Manifest`] describing the run           |
//!
//! Missing files load as empty, so a partially trained directory is still
//! usable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crash_forecast_forecast_models::{
    ConfidenceLevel, EvaluationRecord, FittedModel, SarimaOrder, TrainingFailure,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ForecastError;
use crate::trainer::{CityTraining, TrainingReport};

const CITY_MODEL_FILE: &str = "city_model.json";
const REGION_MODELS_FILE: &str = "region_models.json";
const EVALUATIONS_FILE: &str = "evaluations.json";
const FAILURES_FILE: &str = "training_failures.json";
const MANIFEST_FILE: &str = "manifest.json";

/// An evaluation record with its derived confidence level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEvaluation {
    /// Holdout error.
    #[serde(flatten)]
    pub record: EvaluationRecord,
    /// Level derived from the record.
    pub confidence: ConfidenceLevel,
}

/// Summary of the run that produced a set of artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// RFC 3339 timestamp of when training finished.
    pub trained_at: String,
    /// Orders used for every model.
    pub order: SarimaOrder,
    /// Regions with a model.
    pub regions_trained: usize,
    /// Regions excluded by the screening rules.
    pub regions_skipped: usize,
    /// Regions whose fit failed.
    pub regions_failed: usize,
}

/// All artifacts of one training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchArtifacts {
    /// City-wide model, if one was trained.
    pub city_model: Option<FittedModel>,
    /// Per-region models keyed by region name.
    pub region_models: BTreeMap<String, FittedModel>,
    /// Per-region evaluations keyed by region name.
    pub evaluations: BTreeMap<String, RegionEvaluation>,
    /// Regions whose fit failed.
    pub failures: Vec<TrainingFailure>,
    /// Run summary, if one was written.
    pub manifest: Option<Manifest>,
}

impl BatchArtifacts {
    /// Collects the output of a training run.
    #[must_use]
    pub fn from_training(
        city: Option<CityTraining>,
        report: TrainingReport,
        order: SarimaOrder,
    ) -> Self {
        let manifest = Manifest {
            trained_at: chrono::Utc::now().to_rfc3339(),
            order,
            regions_trained: report.trained.len(),
            regions_skipped: report.skipped.len(),
            regions_failed: report.failures.len(),
        };

        let mut region_models = BTreeMap::new();
        let mut evaluations = BTreeMap::new();
        for trained in report.trained {
            let region = trained.evaluation.region.clone();
            evaluations.insert(
                region.clone(),
                RegionEvaluation {
                    record: trained.evaluation,
                    confidence: trained.confidence,
                },
            );
            region_models.insert(region, trained.model);
        }

        Self {
            city_model: city.map(|c| c.model),
            region_models,
            evaluations,
            failures: report.failures,
            manifest: Some(manifest),
        }
    }

    /// Confidence level of a trained region.
    #[must_use]
    pub fn confidence(&self, region: &str) -> Option<ConfidenceLevel> {
        self.evaluations.get(region).map(|e| e.confidence)
    }
}

/// Reads and writes [`BatchArtifacts`] in a directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir`. Nothing is touched until
    /// [`Self::save`] or [`Self::load`].
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Artifact directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes every artifact, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError`] if a file cannot be serialized or written.
    pub fn save(&self, artifacts: &BatchArtifacts) -> Result<(), ForecastError> {
        std::fs::create_dir_all(&self.dir)?;

        match &artifacts.city_model {
            Some(city) => self.write_json(CITY_MODEL_FILE, city)?,
            None => self.remove(CITY_MODEL_FILE)?,
        }
        self.write_json(REGION_MODELS_FILE, &artifacts.region_models)?;
        let evaluations: Vec<&RegionEvaluation> = artifacts.evaluations.values().collect();
        self.write_json(EVALUATIONS_FILE, &evaluations)?;
        self.write_json(FAILURES_FILE, &artifacts.failures)?;
        match &artifacts.manifest {
            Some(manifest) => self.write_json(MANIFEST_FILE, manifest)?,
            None => self.remove(MANIFEST_FILE)?,
        }

        log::info!(
            "Saved {} region models and {} evaluations to {}",
            artifacts.region_models.len(),
            artifacts.evaluations.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Loads whatever artifacts exist.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError`] if an existing file cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<BatchArtifacts, ForecastError> {
        let city_model = self.read_json(CITY_MODEL_FILE)?;
        let region_models = self.read_json(REGION_MODELS_FILE)?.unwrap_or_default();
        let evaluations: Vec<RegionEvaluation> =
            self.read_json(EVALUATIONS_FILE)?.unwrap_or_default();
        let failures = self.read_json(FAILURES_FILE)?.unwrap_or_default();
        let manifest = self.read_json(MANIFEST_FILE)?;

        let artifacts = BatchArtifacts {
            city_model,
            region_models,
            evaluations: evaluations
                .into_iter()
                .map(|e| (e.record.region.clone(), e))
                .collect(),
            failures,
            manifest,
        };

        log::info!(
            "Loaded {} region models ({} city model) from {}",
            artifacts.region_models.len(),
            if artifacts.city_model.is_some() { "with" } else { "no" },
            self.dir.display()
        );
        Ok(artifacts)
    }

    /// Writes to a temporary file and renames it into place.
    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), ForecastError> {
        let path = self.dir.join(name);
        let tmp_path = self.dir.join(format!("{name}.tmp"));
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &path)?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Removes an artifact left by an earlier run.
    fn remove(&self, name: &str) -> Result<(), ForecastError> {
        let path = self.dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed stale {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ForecastError> {
        let path = self.dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::progress::NullProgress;
    use crate::sarima::test_series::periodic;
    use crate::trainer::{TrainingOptions, train_city, train_regions};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "crash_forecast_artifacts_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn trained_artifacts() -> BatchArtifacts {
        let options = TrainingOptions::default();
        let mut series = BTreeMap::new();
        series.insert("Astoria".to_string(), periodic(450));
        series.insert("Tiny".to_string(), periodic(20));
        let report = train_regions(&series, &options, &NullProgress);
        let city = train_city(&periodic(450), &options).unwrap();
        BatchArtifacts::from_training(Some(city), report, options.fit.order)
    }

    #[test]
    fn collects_training_output() {
        let artifacts = trained_artifacts();
        assert!(artifacts.city_model.is_some());
        assert_eq!(artifacts.region_models.len(), 1);
        assert_eq!(artifacts.confidence("Astoria"), Some(ConfidenceLevel::High));
        assert_eq!(artifacts.confidence("Tiny"), None);
        let manifest = artifacts.manifest.as_ref().unwrap();
        assert_eq!(manifest.regions_trained, 1);
        assert_eq!(manifest.regions_skipped, 1);
    }

    #[test]
    fn saves_and_loads_directory() {
        let dir = temp_dir("round_trip");
        let store = ArtifactStore::new(&dir);
        let artifacts = trained_artifacts();

        store.save(&artifacts).unwrap();
        assert!(dir.join("evaluations.json").exists());
        assert!(!dir.join("evaluations.json.tmp").exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.city_model, artifacts.city_model);
        assert_eq!(loaded.region_models, artifacts.region_models);
        assert_eq!(loaded.failures, artifacts.failures);
        assert_eq!(loaded.manifest, artifacts.manifest);
        assert_eq!(loaded.confidence("Astoria"), Some(ConfidenceLevel::High));
        let (before, after) = (&artifacts.evaluations["Astoria"], &loaded.evaluations["Astoria"]);
        assert!((before.record.mean_daily - after.record.mean_daily).abs() < 1e-9);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn resave_without_city_model_drops_old_one() {
        let dir = temp_dir("resave");
        let store = ArtifactStore::new(&dir);
        store.save(&trained_artifacts()).unwrap();
        assert!(store.load().unwrap().city_model.is_some());

        let retrained = BatchArtifacts {
            city_model: None,
            manifest: None,
            ..trained_artifacts()
        };
        store.save(&retrained).unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.city_model.is_none());
        assert!(loaded.manifest.is_none());
        assert!(!dir.join("city_model.json").exists());
        assert_eq!(loaded.region_models.len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_loads_empty() {
        let store = ArtifactStore::new(temp_dir("missing"));
        let loaded = store.load().unwrap();
        assert_eq!(loaded, BatchArtifacts::default());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("region_models.json"), "{not json").unwrap();

        let err = ArtifactStore::new(&dir).load().unwrap_err();
        assert!(matches!(err, ForecastError::Json(_)));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
