//! Critique worker driven by a markdown profile and a generation provider.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use super::{AgentError, CritiqueWorker, WorkerConfig, WorkerOutcome, reply};
use crate::models::worker::{RetrievalPlan, SectionScope};
use crate::models::{GuidelineSnippet, Section, SectionRef, WorkerDefinition, WorkerKind};
use crate::providers::{self, GenerationProvider, GenerationRequest};

/// Environments that mark a section as mathematically technical.
static MATH_ENV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\begin\{(?:equation|align|gather|multline|theorem|proof|lemma|proposition|corollary|definition)\*?\}",
    )
    .unwrap()
});

/// A worker whose behaviour comes entirely from its profile.
pub struct ProfileWorker {
    definition: WorkerDefinition,
    kind: WorkerKind,
    provider: Arc<dyn GenerationProvider>,
}

impl ProfileWorker {
    pub fn new(definition: WorkerDefinition, provider: Arc<dyn GenerationProvider>) -> Self {
        let kind = definition.kind();
        Self {
            definition,
            kind,
            provider,
        }
    }

    pub fn definition(&self) -> &WorkerDefinition {
        &self.definition
    }

    /// Profile prompt plus reference guidelines and the reply format.
    fn system_prompt(&self, guidelines: &[GuidelineSnippet]) -> String {
        let mut prompt = self.definition.system_prompt.clone();

        if !guidelines.is_empty() {
            prompt.push_str("\n\n## Reference Guidelines\n\n");
            for (i, g) in guidelines.iter().enumerate() {
                prompt.push_str(&format!("{}. [{}] {}\n", i + 1, g.source_id, g.text.trim()));
            }
            prompt.push_str(
                "\nUse these guidelines to inform your review and keep your suggestions \
                 consistent with them.",
            );
        }

        prompt.push_str(
            "\n\n## Output Format\n\n\
             Respond with a JSON object `{\"suggestions\": [...]}`. Each suggestion has:\n\
             - `issue`: what is wrong, one sentence\n\
             - `explanation`: why it matters, one or two sentences\n\
             - `suggested_fix`: a concrete rewrite or action\n\
             - `severity`: one of `info`, `warning`, `error`\n\
             - `severity_score`: a number from 0.0 to 1.0\n\
             - `line`: the document line number the issue is on\n\n\
             Return an empty list if the section has no issues.",
        );
        prompt
    }

    fn user_prompt(&self, section: &Section) -> String {
        let numbered = section
            .numbered_lines()
            .map(|(n, line)| format!("{n}: {line}"))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Review the following section.\n\n\
             **Section Title**: {title}\n\
             **Section Type**: {kind}\n\
             **Topic**: {topic}\n\
             **Lines**: {start}-{end}\n\n\
             **Content** (with line numbers):\n{numbered}\n\n\
             Focus: {focus}\n\n\
             Provide 3-5 specific, actionable suggestions, each with the line number \
             where the problem occurs.",
            title = section.title,
            kind = section.kind,
            topic = section.topic,
            start = section.start_line,
            end = section.end_line,
            focus = self.definition.profile.description,
        )
    }
}

#[async_trait]
impl CritiqueWorker for ProfileWorker {
    fn kind(&self) -> &WorkerKind {
        &self.kind
    }

    fn description(&self) -> &str {
        &self.definition.profile.description
    }

    fn retrieval_plan(&self) -> &RetrievalPlan {
        &self.definition.profile.retrieval
    }

    fn accepts(&self, section: &Section) -> bool {
        match self.definition.profile.sections {
            SectionScope::All => true,
            SectionScope::Technical => {
                section.topic.is_technical() || MATH_ENV_RE.is_match(&section.content)
            }
        }
    }

    async fn analyze(
        &self,
        section: &Section,
        section_ref: &SectionRef,
        guidelines: &[GuidelineSnippet],
        config: &WorkerConfig,
    ) -> WorkerOutcome {
        let model = self
            .definition
            .profile
            .model
            .as_deref()
            .unwrap_or(&config.model);
        let system = self.system_prompt(guidelines);
        let user = self.user_prompt(section);
        let request = GenerationRequest {
            model,
            system: &system,
            user: &user,
            temperature: config.temperature,
        };

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.provider.generate(&request).await {
                Ok(text) => match reply::parse_reply(
                    &text,
                    section_ref,
                    section.start_line..=section.own_end_line(),
                    &self.kind,
                ) {
                    Ok(parsed) => {
                        debug!(
                            worker = %self.kind,
                            section = %section.title,
                            attempt = attempts,
                            candidates = parsed.candidates.len(),
                            "worker finished"
                        );
                        return WorkerOutcome {
                            candidates: parsed.candidates,
                            error: None,
                            attempts,
                            dropped: parsed.dropped,
                        };
                    }
                    Err(reason) => {
                        if attempts > config.max_retries {
                            return WorkerOutcome::failed(
                                AgentError::Malformed { attempts, reason },
                                attempts,
                            );
                        }
                        warn!(
                            worker = %self.kind,
                            section = %section.title,
                            attempt = attempts,
                            %reason,
                            "malformed reply, retrying"
                        );
                    }
                },
                Err(e) => {
                    if !providers::is_retryable(&e) || attempts > config.max_retries {
                        return WorkerOutcome::failed(
                            AgentError::Generation { attempts, source: e },
                            attempts,
                        );
                    }
                    let delay = providers::retry_backoff(config.retry_backoff, attempts - 1);
                    warn!(
                        worker = %self.kind,
                        section = %section.title,
                        attempt = attempts,
                        reason = providers::classify_error(&e).unwrap_or("transient error"),
                        delay_ms = delay.as_millis() as u64,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
