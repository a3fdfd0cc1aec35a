use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::advisory::{AdvisoryClient, ChatReply};
use crate::aggregate::aggregate;
use crate::catalog::{AliasTable, Catalog};
use crate::compare::{compare, ComparisonReport};
use crate::error::SessionError;
use crate::export::DocumentRenderer;
use crate::models::{AnswerSet, ChatMessage, ChatTranscript, ItemId, OrganizationMetadata, Score};
use crate::profile::{serialize_profile, Profile};
use crate::reference::ReferenceStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Editing,
    Generated,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub session_id: Uuid,
    pub org: OrganizationMetadata,
    pub report: ComparisonReport,
    pub profile: Profile,
    pub generated_at: DateTime<Utc>,
}

pub struct DiagnosticSession {
    id: Uuid,
    catalog: Catalog,
    aliases: AliasTable,
    answers: AnswerSet,
    state: SessionState,
    last: Option<Diagnostic>,
    transcript: ChatTranscript,
}

impl DiagnosticSession {
    pub fn new(catalog: Catalog, aliases: AliasTable) -> Self {
        let answers = AnswerSet::with_baseline(catalog.items());
        let id = Uuid::new_v4();
        tracing::debug!(session = %id, items = catalog.len(), "Session started");
        Self {
            id,
            catalog,
            aliases,
            answers,
            state: SessionState::Editing,
            last: None,
            transcript: ChatTranscript::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn last_diagnostic(&self) -> Option<&Diagnostic> {
        self.last.as_ref()
    }

    pub fn set_answer(&mut self, id: ItemId, score: Score) -> Result<(), SessionError> {
        if !self.catalog.items().iter().any(|item| item.id == id) {
            return Err(SessionError::UnknownItem(id));
        }
        self.answers.set(id, score);
        self.state = SessionState::Editing;
        Ok(())
    }

    pub fn apply_page(
        &mut self,
        edits: impl IntoIterator<Item = (ItemId, Score)>,
    ) -> Result<usize, SessionError> {
        let mut applied = 0usize;
        for (id, score) in edits {
            self.set_answer(id, score)?;
            applied += 1;
        }
        Ok(applied)
    }

    pub fn generate(&mut self, org: OrganizationMetadata, reference: &ReferenceStats) -> &Diagnostic {
        let items = self.catalog.items();
        let means = aggregate(items, &self.answers, &self.aliases);
        let report = compare(&means, reference, &org);
        let profile = serialize_profile(&org, &report, items, &self.answers);

        tracing::info!(
            session = %self.id,
            dimensions = report.dimensions.len(),
            segments = report.segments.len(),
            "Diagnostic generated"
        );

        self.state = SessionState::Generated;
        self.last.insert(Diagnostic {
            session_id: self.id,
            org,
            report,
            profile,
            generated_at: Utc::now(),
        })
    }

    /// Both turns are appended only on success; a failed call leaves the
    /// transcript untouched.
    pub async fn chat(
        &mut self,
        client: &AdvisoryClient,
        message: &str,
    ) -> Result<ChatReply, SessionError> {
        let profile = self
            .last
            .as_ref()
            .map(|diagnostic| diagnostic.profile.as_str())
            .ok_or(SessionError::NotGenerated)?;

        let reply = client
            .ask_or_apology(profile, &self.transcript, message)
            .await;
        if let ChatReply::Answer(text) = &reply {
            self.transcript.push(ChatMessage::user(message));
            self.transcript.push(ChatMessage::assistant(text.clone()));
        } else {
            tracing::warn!(session = %self.id, "Chat turn not recorded");
        }
        Ok(reply)
    }

    pub fn export(&self, renderer: &dyn DocumentRenderer) -> Result<Vec<u8>, SessionError> {
        let diagnostic = self.last.as_ref().ok_or(SessionError::NotGenerated)?;
        let bytes = renderer.render(
            diagnostic.profile.as_str(),
            diagnostic.org.institution_name(),
        )?;
        tracing::info!(
            session = %self.id,
            bytes = bytes.len(),
            format = renderer.file_extension(),
            "Diagnostic exported"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::advisory::{ReasoningService, RetryPolicy, APOLOGY};
    use crate::compare::{BenchmarkOutcome, Classification};
    use crate::error::AdvisoryError;
    use crate::export::TextRenderer;
    use crate::models::QuestionnaireItem;

    struct Scripted(Mutex<VecDeque<Result<String, AdvisoryError>>>);

    #[async_trait]
    impl ReasoningService for Scripted {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, AdvisoryError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AdvisoryError::AuthFailed))
        }
    }

    fn client(replies: Vec<Result<String, AdvisoryError>>) -> AdvisoryClient {
        AdvisoryClient::new(
            Box::new(Scripted(Mutex::new(replies.into()))),
            RetryPolicy {
                max_retries: 0,
                ..RetryPolicy::default()
            },
        )
    }

    fn scenario_catalog() -> Catalog {
        Catalog::from_items(vec![
            QuestionnaireItem::new("Q1", "Governance bodies?", "Governance"),
            QuestionnaireItem::new("Q2", "Integrated systems?", "Technology"),
            QuestionnaireItem::new("Q3", "Monitored goals?", "Governance"),
            QuestionnaireItem::new("Q4", "Risk management?", "Governance"),
            QuestionnaireItem::new("Q5", "IT inventory?", "Technology"),
        ])
        .unwrap()
    }

    fn scenario_reference() -> ReferenceStats {
        let mut stats = ReferenceStats::empty();
        stats.overall_by_dimension.insert("Governance".to_string(), dec!(1.50));
        stats.overall_by_dimension.insert("Technology".to_string(), dec!(2.00));
        stats
    }

    fn score(value: i64) -> Score {
        Score::new(value).unwrap()
    }

    #[test]
    fn starts_editing_with_baseline_answers() {
        let session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        assert_eq!(session.state(), SessionState::Editing);
        assert_eq!(session.answers().len(), 5);
        assert!(session.answers().iter().all(|(_, s)| s == Score::BASELINE));
        assert!(session.last_diagnostic().is_none());
    }

    #[test]
    fn end_to_end_scenario() {
        let mut session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        session
            .apply_page([
                (ItemId::new("Q5"), score(0)),
                (ItemId::new("Q1"), score(2)),
                (ItemId::new("Q3"), score(1)),
            ])
            .unwrap();
        session
            .apply_page([(ItemId::new("Q2"), score(3)), (ItemId::new("Q4"), score(2))])
            .unwrap();

        let diagnostic = session.generate(OrganizationMetadata::default(), &scenario_reference());
        let governance = diagnostic.report.dimension("Governance").unwrap();
        assert_eq!(
            governance.outcome,
            BenchmarkOutcome::Compared {
                base: dec!(1.50),
                diff: dec!(0.17),
                classification: Classification::AboveBase,
            }
        );
        let technology = diagnostic.report.dimension("Technology").unwrap();
        assert_eq!(
            technology.outcome,
            BenchmarkOutcome::Compared {
                base: dec!(2.00),
                diff: dec!(-0.50),
                classification: Classification::BelowBase,
            }
        );
        assert!(diagnostic.profile.as_str().contains(
            "- Governance: 1.67 (base mean: 1.50; status: above base, difference: +0.17)"
        ));
        assert!(diagnostic.profile.as_str().contains(
            "- Technology: 1.50 (base mean: 2.00; status: below base, difference: -0.50)"
        ));
        assert_eq!(session.state(), SessionState::Generated);
    }

    #[test]
    fn unknown_item_is_rejected() {
        let mut session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        let err = session.set_answer(ItemId::new("Q42"), score(3)).unwrap_err();
        assert!(matches!(err, SessionError::UnknownItem(id) if id.as_str() == "Q42"));
    }

    #[test]
    fn edit_returns_to_editing_and_regenerate_is_fresh() {
        let mut session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        let first = session
            .generate(OrganizationMetadata::default(), &scenario_reference())
            .profile
            .clone();

        session.set_answer(ItemId::new("Q1"), score(3)).unwrap();
        assert_eq!(session.state(), SessionState::Editing);
        assert_eq!(session.last_diagnostic().unwrap().profile, first);

        let second = session
            .generate(OrganizationMetadata::default(), &scenario_reference())
            .profile
            .clone();
        assert_ne!(first, second);
        assert!(second.as_str().contains("- Q1 | Governance | 'Governance bodies?' -> score 3"));
    }

    #[tokio::test]
    async fn chat_requires_a_generated_profile() {
        let mut session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        let result = session.chat(&client(vec![Ok("hi".to_string())]), "hello").await;
        assert!(matches!(result, Err(SessionError::NotGenerated)));
    }

    #[tokio::test]
    async fn successful_chat_appends_both_turns() {
        let mut session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        session.generate(OrganizationMetadata::default(), &scenario_reference());

        let client = client(vec![Ok("Focus on technology.".to_string())]);
        let reply = session.chat(&client, "Where to start?").await.unwrap();
        assert_eq!(reply, ChatReply::Answer("Focus on technology.".to_string()));
        assert_eq!(
            session.transcript().messages(),
            &[
                ChatMessage::user("Where to start?"),
                ChatMessage::assistant("Focus on technology."),
            ]
        );
    }

    #[tokio::test]
    async fn failed_chat_leaves_transcript_untouched() {
        let mut session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        session.generate(OrganizationMetadata::default(), &scenario_reference());

        let client = client(vec![Err(AdvisoryError::AuthFailed)]);
        let reply = session.chat(&client, "Where to start?").await.unwrap();
        assert_eq!(reply.text(), APOLOGY);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn diagnostic_serializes_with_session_and_timestamp() {
        let mut session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        let id = session.id();
        let diagnostic = session.generate(OrganizationMetadata::default(), &scenario_reference());

        let json = serde_json::to_value(diagnostic).unwrap();
        assert_eq!(json["session_id"], id.to_string());
        assert!(json["generated_at"].as_str().is_some());
        assert_eq!(json["report"]["dimensions"][0]["label"], "Governance");
        assert!(json["profile"]
            .as_str()
            .unwrap()
            .starts_with("Institution: not informed\n"));
    }

    #[test]
    fn export_uses_the_last_profile() {
        let mut session = DiagnosticSession::new(scenario_catalog(), AliasTable::new());
        let renderer = TextRenderer::new(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert!(matches!(session.export(&renderer), Err(SessionError::NotGenerated)));

        let org = OrganizationMetadata {
            institution: Some("Agency".to_string()),
            ..Default::default()
        };
        session.generate(org, &scenario_reference());
        let bytes = session.export(&renderer).unwrap();
        assert!(bytes.starts_with(b"Maturity Diagnostic - Agency\n"));
        assert!(bytes.windows(21).any(|w| w == b"Institution: Agency\nP"));
    }
}
