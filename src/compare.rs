use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::aggregate::{round2, DimensionMeans, DimensionScore};
use crate::models::{non_blank, OrganizationMetadata};
use crate::reference::ReferenceStats;

const NEAR_BASE_TOLERANCE: Decimal = dec!(0.1);

const POWER_SYNONYMS: &[(&str, &str)] = &[
    ("poder executivo", "executivo"),
    ("executive", "executivo"),
    ("executive branch", "executivo"),
    ("poder legislativo", "legislativo"),
    ("legislative", "legislativo"),
    ("legislative branch", "legislativo"),
    ("poder judiciário", "judiciário"),
    ("poder judiciario", "judiciário"),
    ("judiciario", "judiciário"),
    ("judiciary", "judiciário"),
];

const SPHERE_SYNONYMS: &[(&str, &str)] = &[
    ("esfera federal", "federal"),
    ("união", "federal"),
    ("uniao", "federal"),
    ("esfera estadual", "estadual"),
    ("state", "estadual"),
    ("esfera municipal", "municipal"),
    ("município", "municipal"),
    ("municipio", "municipal"),
    ("municipality", "municipal"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Power,
    Sphere,
}

impl SegmentKind {
    fn synonyms(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Power => POWER_SYNONYMS,
            Self::Sphere => SPHERE_SYNONYMS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Sphere => "sphere",
        }
    }
}

/// Trim, lowercase and collapse known synonyms. Blank input yields `None`.
pub fn normalize_segment(kind: SegmentKind, label: &str) -> Option<String> {
    let lowered = label.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let canonical = kind
        .synonyms()
        .iter()
        .find(|(synonym, _)| *synonym == lowered)
        .map(|(_, canonical)| canonical.to_string());
    Some(canonical.unwrap_or(lowered))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    AboveBase,
    NearBase,
    BelowBase,
}

impl Classification {
    /// `diff` must already be rounded to two places.
    pub fn from_diff(diff: Decimal) -> Self {
        if diff > NEAR_BASE_TOLERANCE {
            Self::AboveBase
        } else if diff < -NEAR_BASE_TOLERANCE {
            Self::BelowBase
        } else {
            Self::NearBase
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AboveBase => "above base",
            Self::NearBase => "near base",
            Self::BelowBase => "below base",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BenchmarkOutcome {
    Compared {
        base: Decimal,
        diff: Decimal,
        classification: Classification,
    },
    /// The benchmark has a value but this organization has none to compare.
    NoData { base: Decimal },
    NoBenchmark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionComparison {
    pub label: String,
    pub score: DimensionScore,
    pub outcome: BenchmarkOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentBenchmark {
    pub kind: SegmentKind,
    pub label: String,
    pub mean: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    pub segments: Vec<SegmentBenchmark>,
    pub dimensions: Vec<DimensionComparison>,
}

impl ComparisonReport {
    pub fn dimension(&self, label: &str) -> Option<&DimensionComparison> {
        self.dimensions.iter().find(|d| d.label == label)
    }
}

pub fn compare(
    means: &DimensionMeans,
    reference: &ReferenceStats,
    org: &OrganizationMetadata,
) -> ComparisonReport {
    let mut segments = Vec::new();
    let wanted = [
        (SegmentKind::Power, org.power.as_deref()),
        (SegmentKind::Sphere, org.sphere.as_deref()),
    ];
    for (kind, label) in wanted {
        let Some(label) = non_blank(label) else {
            continue;
        };
        let Some(key) = normalize_segment(kind, label) else {
            continue;
        };
        if let Some(mean) = reference.segment(kind, &key) {
            segments.push(SegmentBenchmark {
                kind,
                label: key,
                mean,
            });
        }
    }

    let dimensions = means
        .iter()
        .map(|dimension| {
            let outcome = match (dimension.score, reference.overall(&dimension.label)) {
                (DimensionScore::Mean(mean), Some(base)) => {
                    let diff = round2(mean - base);
                    BenchmarkOutcome::Compared {
                        base,
                        diff,
                        classification: Classification::from_diff(diff),
                    }
                }
                (DimensionScore::NoData, Some(base)) => BenchmarkOutcome::NoData { base },
                (_, None) => BenchmarkOutcome::NoBenchmark,
            };
            DimensionComparison {
                label: dimension.label.clone(),
                score: dimension.score,
                outcome,
            }
        })
        .collect();

    ComparisonReport {
        segments,
        dimensions,
    }
}
