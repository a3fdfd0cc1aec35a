use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BlankItemId, ScoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Trims only; catalogs reject blank ids when they are built.
    pub(crate) fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = BlankItemId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Self::new(s);
        if id.0.is_empty() {
            return Err(BlankItemId);
        }
        Ok(id)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 3;
    pub const BASELINE: Score = Score(1);

    pub fn new(value: i64) -> Result<Self, ScoreError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScoreError::OutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "Nonexistent",
            1 => "Very incipient",
            2 => "Partially structured",
            _ => "Well structured",
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Score {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| ScoreError::NotANumber(s.trim().to_string()))?;
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Score::new(value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireItem {
    pub id: ItemId,
    pub prompt: String,
    /// Catalog-side label; resolved through the alias table only when aggregating.
    pub dimension: String,
}

impl QuestionnaireItem {
    pub fn new(id: &str, prompt: &str, dimension: &str) -> Self {
        Self {
            id: ItemId::new(id),
            prompt: prompt.to_string(),
            dimension: dimension.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSet {
    entries: Vec<(ItemId, Score)>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(items: &[QuestionnaireItem]) -> Self {
        let mut answers = Self::new();
        for item in items {
            answers.set(item.id.clone(), Score::BASELINE);
        }
        answers
    }

    pub fn set(&mut self, id: ItemId, score: Score) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = score,
            None => self.entries.push((id, score)),
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<Score> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemId, Score)> {
        self.entries.iter().map(|(id, score)| (id, *score))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ItemId, Score)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (ItemId, Score)>>(iter: T) -> Self {
        let mut answers = Self::new();
        for (id, score) in iter {
            answers.set(id, score);
        }
        answers
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMetadata {
    pub institution: Option<String>,
    pub power: Option<String>,
    pub sphere: Option<String>,
    pub state: Option<String>,
}

impl OrganizationMetadata {
    pub fn institution_name(&self) -> Option<&str> {
        non_blank(self.institution.as_deref())
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<QuestionnaireItem> {
        vec![
            QuestionnaireItem::new("Q1", "First", "Governance"),
            QuestionnaireItem::new("Q2", "Second", "Technology"),
        ]
    }

    #[test]
    fn score_rejects_values_outside_scale() {
        assert!(Score::new(-1).is_err());
        assert!(Score::new(4).is_err());
        assert_eq!(Score::new(3).map(Score::value), Ok(3));
        assert!("two".parse::<Score>().is_err());
        assert_eq!(" 2 ".parse::<Score>().map(Score::value), Ok(2));
    }

    #[test]
    fn baseline_populates_every_item() {
        let answers = AnswerSet::with_baseline(&items());
        assert_eq!(answers.len(), 2);
        assert_eq!(answers.get(&ItemId::new("Q1")), Some(Score::BASELINE));
        assert_eq!(answers.get(&ItemId::new("Q2")), Some(Score::BASELINE));
    }

    #[test]
    fn set_overwrites_in_place_without_reordering() {
        let mut answers = AnswerSet::with_baseline(&items());
        answers.set(ItemId::new("Q2"), Score::new(3).unwrap());
        answers.set(ItemId::new("Q1"), Score::new(0).unwrap());

        let order: Vec<_> = answers.iter().map(|(id, s)| (id.as_str(), s.value())).collect();
        assert_eq!(order, vec![("Q1", 0), ("Q2", 3)]);
    }

    #[test]
    fn item_ids_are_trimmed_and_non_blank() {
        assert_eq!("  Q7 ".parse::<ItemId>(), Ok(ItemId::new("Q7")));
        assert_eq!("   ".parse::<ItemId>(), Err(BlankItemId));
        assert!(serde_json::from_str::<ItemId>("\"\"").is_err());
        assert_eq!(serde_json::from_str::<ItemId>("\" Q2\"").unwrap(), ItemId::new("Q2"));
    }

    #[test]
    fn blank_institution_counts_as_absent() {
        let org = OrganizationMetadata {
            institution: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(org.institution_name(), None);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }
}
