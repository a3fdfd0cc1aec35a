use std::path::Path;

use crate::models::{ItemId, Score};

/// Read `item_id,score` rows. Scores outside the scale fail the whole file.
pub fn read_answers_csv(path: &Path) -> anyhow::Result<Vec<(ItemId, Score)>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        item_id: ItemId,
        score: Score,
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut answers = Vec::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        answers.push((row.item_id, row.score));
    }

    Ok(answers)
}

pub fn parse_answer_arg(raw: &str) -> Result<(ItemId, Score), String> {
    let (id, score) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ITEM=SCORE, got '{raw}'"))?;
    let id: ItemId = id
        .parse()
        .map_err(|_| format!("missing item id in '{raw}'"))?;
    let score: Score = score.parse().map_err(|e| format!("{e}"))?;
    Ok((id, score))
}
