use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::compare::{normalize_segment, SegmentKind};
use crate::error::BenchmarkUnavailable;

pub const DEFAULT_BENCHMARK_PATH: &str = "observatorio_resumo.csv";

const REQUIRED_COLUMNS: [&str; 2] = ["dimension", "mean_score"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceStats {
    pub overall_by_dimension: BTreeMap<String, Decimal>,
    pub by_power: BTreeMap<String, Decimal>,
    pub by_sphere: BTreeMap<String, Decimal>,
}

impl ReferenceStats {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.overall_by_dimension.is_empty() && self.by_power.is_empty() && self.by_sphere.is_empty()
    }

    pub fn overall(&self, dimension: &str) -> Option<Decimal> {
        self.overall_by_dimension.get(dimension.trim()).copied()
    }

    /// Benchmark mean for a segment label; the label is normalized first.
    pub fn segment(&self, kind: SegmentKind, label: &str) -> Option<Decimal> {
        let key = normalize_segment(kind, label)?;
        match kind {
            SegmentKind::Power => self.by_power.get(&key).copied(),
            SegmentKind::Sphere => self.by_sphere.get(&key).copied(),
        }
    }

    /// Rows with a `segment` of `power` or `sphere` carry the segment label in
    /// `dimension`. Bad rows are skipped; only whole-file problems fail.
    pub fn from_csv(path: &Path) -> Result<Self, BenchmarkUnavailable> {
        #[derive(serde::Deserialize)]
        struct CsvRow {
            dimension: String,
            mean_score: String,
            #[serde(default)]
            segment: Option<String>,
        }

        if !path.exists() {
            return Err(BenchmarkUnavailable::Missing(path.to_path_buf()));
        }

        let unreadable = |source| BenchmarkUnavailable::Unreadable {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(unreadable)?;

        let headers = reader.headers().map_err(unreadable)?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|header| header == column) {
                return Err(BenchmarkUnavailable::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                });
            }
        }

        let mut stats = Self::empty();
        for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
            let line = index + 2;
            let row = match result {
                Ok(row) => row,
                Err(error) => {
                    tracing::warn!(line, %error, "Skipping malformed benchmark row");
                    continue;
                }
            };

            let Ok(mean) = Decimal::from_str(&row.mean_score) else {
                tracing::warn!(
                    line,
                    value = %row.mean_score,
                    "Skipping benchmark row with non-numeric mean_score"
                );
                continue;
            };

            let segment = row.segment.as_deref().map(str::trim).unwrap_or("");
            match segment.to_lowercase().as_str() {
                "" | "overall" => {
                    if !row.dimension.is_empty() {
                        stats.overall_by_dimension.insert(row.dimension, mean);
                    }
                }
                "power" => {
                    if let Some(key) = normalize_segment(SegmentKind::Power, &row.dimension) {
                        stats.by_power.insert(key, mean);
                    }
                }
                "sphere" => {
                    if let Some(key) = normalize_segment(SegmentKind::Sphere, &row.dimension) {
                        stats.by_sphere.insert(key, mean);
                    }
                }
                other => {
                    tracing::warn!(line, segment = other, "Skipping row with unknown segment");
                }
            }
        }

        Ok(stats)
    }

    pub fn load_or_empty(path: &Path) -> Self {
        match Self::from_csv(path) {
            Ok(stats) => {
                tracing::info!(
                    path = %path.display(),
                    dimensions = stats.overall_by_dimension.len(),
                    powers = stats.by_power.len(),
                    spheres = stats.by_sphere.len(),
                    "Loaded benchmark dataset"
                );
                stats
            }
            Err(error) => {
                tracing::warn!(%error, "Benchmark unavailable, comparisons disabled");
                Self::empty()
            }
        }
    }
}

#[derive(Debug)]
pub struct BenchmarkStore {
    path: PathBuf,
    cached: RwLock<Option<Arc<ReferenceStats>>>,
}

impl BenchmarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Arc<ReferenceStats> {
        if let Some(stats) = self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(stats);
        }

        let mut slot = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have loaded it while we waited for the write lock.
        if let Some(stats) = slot.as_ref() {
            return Arc::clone(stats);
        }
        let stats = Arc::new(ReferenceStats::load_or_empty(&self.path));
        *slot = Some(Arc::clone(&stats));
        stats
    }

    /// Drop the cached copy; the next `get` reloads from disk.
    pub fn invalidate(&self) {
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!(path = %self.path.display(), "Benchmark cache invalidated");
    }

    pub fn is_loaded(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rust_decimal_macros::dec;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_overall_and_segment_rows() {
        let file = write_csv(
            "dimension,mean_score,segment,p50\n\
             Governance,1.50,,1.4\n\
             Technology,2.00,overall,2.1\n\
             Poder Executivo,1.55,power,\n\
             Federal,1.60,sphere,\n",
        );

        let stats = ReferenceStats::from_csv(file.path()).unwrap();
        assert_eq!(stats.overall("Governance"), Some(dec!(1.50)));
        assert_eq!(stats.overall("Technology"), Some(dec!(2.00)));
        assert_eq!(stats.segment(SegmentKind::Power, "executivo"), Some(dec!(1.55)));
        assert_eq!(stats.segment(SegmentKind::Sphere, " FEDERAL "), Some(dec!(1.60)));
    }

    #[test]
    fn segment_column_is_optional() {
        let file = write_csv("dimension,mean_score\nData,1.2\n");
        let stats = ReferenceStats::from_csv(file.path()).unwrap();
        assert_eq!(stats.overall("Data"), Some(dec!(1.2)));
        assert!(stats.by_power.is_empty());
    }

    #[test]
    fn missing_column_degrades_to_empty() {
        let file = write_csv("dimension,average\nData,1.2\n");
        assert!(matches!(
            ReferenceStats::from_csv(file.path()),
            Err(BenchmarkUnavailable::MissingColumn { column: "mean_score", .. })
        ));
        assert!(ReferenceStats::load_or_empty(file.path()).is_empty());
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let path = Path::new("/nonexistent/benchmark.csv");
        assert!(matches!(
            ReferenceStats::from_csv(path),
            Err(BenchmarkUnavailable::Missing(_))
        ));
        assert!(ReferenceStats::load_or_empty(path).is_empty());
    }

    #[test]
    fn skips_rows_with_bad_numbers() {
        let file = write_csv("dimension,mean_score\nData,n/a\nPeople,0.9\n");
        let stats = ReferenceStats::from_csv(file.path()).unwrap();
        assert_eq!(stats.overall("Data"), None);
        assert_eq!(stats.overall("People"), Some(dec!(0.9)));
    }

    #[test]
    fn store_caches_until_invalidated() {
        let file = write_csv("dimension,mean_score\nData,1.0\n");
        let store = BenchmarkStore::new(file.path());
        assert!(!store.is_loaded());
        assert_eq!(store.get().overall("Data"), Some(dec!(1.0)));
        assert!(store.is_loaded());

        std::fs::write(file.path(), "dimension,mean_score\nData,2.5\n").unwrap();
        assert_eq!(store.get().overall("Data"), Some(dec!(1.0)));

        store.invalidate();
        assert!(!store.is_loaded());
        assert_eq!(store.get().overall("Data"), Some(dec!(2.5)));
    }
}
