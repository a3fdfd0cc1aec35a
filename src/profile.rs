use std::fmt::{self, Write};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::aggregate::{round2, DimensionScore};
use crate::compare::{BenchmarkOutcome, ComparisonReport};
use crate::models::{non_blank, AnswerSet, OrganizationMetadata, QuestionnaireItem};

pub const NOT_INFORMED: &str = "not informed";
pub const NO_BENCHMARK: &str = "no benchmark available";
pub const NO_DATA: &str = "no data";
pub const UNANSWERED: &str = "unanswered";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Profile(String);

impl Profile {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn fixed2(value: Decimal) -> String {
    format!("{:.2}", round2(value))
}

fn signed2(value: Decimal) -> String {
    let value = round2(value);
    let sign = if value.is_sign_negative() && !value.is_zero() {
        '-'
    } else {
        '+'
    };
    format!("{sign}{:.2}", value.abs())
}

/// Collapses every whitespace run, newlines included, to one space.
fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn field(value: Option<&str>) -> String {
    non_blank(value)
        .map(single_line)
        .unwrap_or_else(|| NOT_INFORMED.to_string())
}

pub fn serialize_profile(
    org: &OrganizationMetadata,
    comparison: &ComparisonReport,
    items: &[QuestionnaireItem],
    answers: &AnswerSet,
) -> Profile {
    let mut output = String::new();

    let _ = writeln!(output, "Institution: {}", field(org.institution.as_deref()));
    let _ = writeln!(output, "Power: {}", field(org.power.as_deref()));
    let _ = writeln!(output, "Sphere: {}", field(org.sphere.as_deref()));
    let _ = writeln!(output, "State: {}", field(org.state.as_deref()));
    let _ = writeln!(output);

    for segment in &comparison.segments {
        let _ = writeln!(
            output,
            "Benchmark mean for the {} segment ({}): {}",
            segment.kind.as_str(),
            single_line(&segment.label),
            fixed2(segment.mean)
        );
    }

    let _ = writeln!(output, "Scores by dimension (scale 0 to 3):");
    for dimension in &comparison.dimensions {
        let label = single_line(&dimension.label);
        let line = match (&dimension.score, &dimension.outcome) {
            (
                DimensionScore::Mean(mean),
                BenchmarkOutcome::Compared {
                    base,
                    diff,
                    classification,
                },
            ) => format!(
                "- {}: {} (base mean: {}; status: {}, difference: {})",
                label,
                fixed2(*mean),
                fixed2(*base),
                classification,
                signed2(*diff)
            ),
            (DimensionScore::Mean(mean), _) => {
                format!("- {label}: {} ({NO_BENCHMARK})", fixed2(*mean))
            }
            (DimensionScore::NoData, BenchmarkOutcome::NoBenchmark) => {
                format!("- {label}: {NO_DATA} ({NO_BENCHMARK})")
            }
            (DimensionScore::NoData, BenchmarkOutcome::NoData { base })
            | (DimensionScore::NoData, BenchmarkOutcome::Compared { base, .. }) => {
                format!("- {label}: {NO_DATA} (base mean: {})", fixed2(*base))
            }
        };
        let _ = writeln!(output, "{line}");
    }

    let _ = writeln!(output);
    let _ = write!(output, "Detailed item notes:");
    for item in items {
        let score = answers
            .get(&item.id)
            .map(|score| format!("score {score}"))
            .unwrap_or_else(|| UNANSWERED.to_string());
        let _ = write!(
            output,
            "\n- {} | {} | '{}' -> {}",
            item.id,
            single_line(&item.dimension),
            single_line(&item.prompt),
            score
        );
    }

    Profile(output)
}
