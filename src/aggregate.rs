use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::catalog::AliasTable;
use crate::models::{AnswerSet, QuestionnaireItem};

pub const DECIMAL_PLACES: u32 = 2;

/// Round to two places, ties to even (1.495 -> 1.50, 1.485 -> 1.48).
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DimensionScore {
    Mean(Decimal),
    /// No answer contributed to this dimension.
    NoData,
}

impl DimensionScore {
    pub fn mean(self) -> Option<Decimal> {
        match self {
            Self::Mean(value) => Some(value),
            Self::NoData => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionMean {
    pub label: String,
    pub score: DimensionScore,
    pub answered: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DimensionMeans {
    entries: Vec<DimensionMean>,
}

impl DimensionMeans {
    pub fn get(&self, label: &str) -> Option<&DimensionMean> {
        self.entries.iter().find(|entry| entry.label == label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionMean> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Answers for ids outside `items` are ignored. A dimension whose items have
/// no recorded answer is reported as [`DimensionScore::NoData`].
pub fn aggregate(
    items: &[QuestionnaireItem],
    answers: &AnswerSet,
    aliases: &AliasTable,
) -> DimensionMeans {
    let mut order: Vec<(String, u32, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let label = aliases.resolve(&item.dimension);
        let slot = match index.get(label) {
            Some(&slot) => slot,
            None => {
                order.push((label.to_string(), 0, 0));
                index.insert(label.to_string(), order.len() - 1);
                order.len() - 1
            }
        };

        if let Some(score) = answers.get(&item.id) {
            let entry = &mut order[slot];
            entry.1 += u32::from(score.value());
            entry.2 += 1;
        }
    }

    let entries = order
        .into_iter()
        .map(|(label, total, answered)| {
            let score = if answered == 0 {
                tracing::debug!(dimension = %label, "Dimension has no answers");
                DimensionScore::NoData
            } else {
                DimensionScore::Mean(round2(
                    Decimal::from(total) / Decimal::from(answered as u64),
                ))
            };
            DimensionMean {
                label,
                score,
                answered,
            }
        })
        .collect();

    DimensionMeans { entries }
}
