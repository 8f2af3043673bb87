//! Deep research engine: drives one research run from plan to report.
//!
//! Each iteration plans new queries, searches them, and extracts findings
//! from every unseen result, then asks the model whether the findings
//! suffice. The loop ends on a positive verdict, when planning yields no new
//! queries, or at the iteration cap; the final report is then generated and
//! emitted through the run's sink.

use super::activity::{ActivityStatus, ActivityTracker, ActivityType};
use super::prompts::{
    ANALYSIS_SCHEMA, ANALYSIS_SYSTEM, AnalysisOutput, EXTRACTION_SCHEMA, EXTRACTION_SYSTEM,
    ExtractionOutput, PLAN_SCHEMA, PLANNING_SYSTEM, PlanOutput, REPORT_SYSTEM, analysis_prompt,
    extraction_prompt, planning_prompt, report_prompt,
};
use super::search::{SearchAggregator, SearchResult, truncate_chars};
use super::sink::{ResearchEvent, StreamSink};
use super::state::{Finding, ResearchState};
use crate::brain::{Brain, ModelCall};
use crate::config::{ResearchConfig, ResearchModels};
use crate::error::ResearchError;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// States of a research run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchPhase {
    Planning,
    Searching,
    Extracting,
    Deciding,
    Reporting,
    Done,
    Failed,
}

impl std::fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResearchPhase::Planning => "planning",
            ResearchPhase::Searching => "searching",
            ResearchPhase::Extracting => "extracting",
            ResearchPhase::Deciding => "deciding",
            ResearchPhase::Reporting => "reporting",
            ResearchPhase::Done => "done",
            ResearchPhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchOutcome {
    /// `Done` or `Failed`.
    pub phase: ResearchPhase,
    pub report: Option<String>,
    pub error: Option<String>,
    pub iterations: usize,
    pub findings: usize,
    pub completed_steps: usize,
    pub tokens_used: usize,
}

impl ResearchOutcome {
    pub fn is_success(&self) -> bool {
        self.phase == ResearchPhase::Done
    }
}

/// Per-run bookkeeping that is not part of the research state proper.
struct RunContext {
    tracker: ActivityTracker,
    iteration: usize,
    gaps: Vec<String>,
    previous_queries: Vec<String>,
    planned: Vec<String>,
    batches: Vec<(String, Vec<SearchResult>)>,
    report: Option<String>,
    error: Option<String>,
}

/// The research orchestrator. Holds no per-run state and can drive any
/// number of concurrent runs.
pub struct DeepResearch {
    brain: Arc<Brain>,
    search: Arc<SearchAggregator>,
    config: ResearchConfig,
    models: ResearchModels,
}

impl DeepResearch {
    pub fn new(brain: Arc<Brain>, search: Arc<SearchAggregator>, config: ResearchConfig) -> Self {
        let models = config.models.resolved(brain.model_name());
        Self {
            brain,
            search,
            config,
            models,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn brain(&self) -> &Brain {
        &self.brain
    }

    pub fn search(&self) -> &SearchAggregator {
        &self.search
    }

    pub fn models(&self) -> &ResearchModels {
        &self.models
    }

    /// Execute one run, writing activity and report events into `sink`.
    ///
    /// Never returns an error: an unrecoverable failure is reported as a
    /// single `error` activity and the outcome is `Failed`.
    pub async fn run(&self, state: &mut ResearchState, sink: Arc<dyn StreamSink>) -> ResearchOutcome {
        let mut ctx = RunContext {
            tracker: ActivityTracker::new(sink),
            iteration: 0,
            gaps: Vec::new(),
            previous_queries: Vec::new(),
            planned: Vec::new(),
            batches: Vec::new(),
            report: None,
            error: None,
        };

        info!(run_id = %state.id(), topic = state.topic(), "Starting deep research");

        let mut phase = if state.topic().trim().is_empty() {
            self.fail(&mut ctx, ActivityType::Plan, &ResearchError::EmptyTopic)
        } else {
            ResearchPhase::Planning
        };

        while !matches!(phase, ResearchPhase::Done | ResearchPhase::Failed) {
            let next = match phase {
                ResearchPhase::Planning => self.plan(&mut ctx, state).await,
                ResearchPhase::Searching => self.search_planned(&mut ctx).await,
                ResearchPhase::Extracting => self.extract(&mut ctx, state).await,
                ResearchPhase::Deciding => self.decide(&mut ctx, state).await,
                ResearchPhase::Reporting => self.report(&mut ctx, state).await,
                ResearchPhase::Done | ResearchPhase::Failed => phase,
            };
            debug!(run_id = %state.id(), from = %phase, to = %next, "Research phase transition");
            phase = next;
        }

        info!(
            run_id = %state.id(),
            outcome = %phase,
            iterations = ctx.iteration,
            findings = state.findings().len(),
            steps = state.completed_steps(),
            tokens = state.tokens_used(),
            "Deep research finished"
        );

        ResearchOutcome {
            phase,
            report: ctx.report,
            error: ctx.error,
            iterations: ctx.iteration,
            findings: state.findings().len(),
            completed_steps: state.completed_steps(),
            tokens_used: state.tokens_used(),
        }
    }

    async fn plan(&self, ctx: &mut RunContext, state: &mut ResearchState) -> ResearchPhase {
        if ctx.iteration >= self.config.max_iterations {
            return ResearchPhase::Reporting;
        }
        ctx.iteration += 1;
        ctx.tracker.add(
            ActivityType::Plan,
            ActivityStatus::Pending,
            format!(
                "Planning research (iteration {}/{})",
                ctx.iteration, self.config.max_iterations
            ),
        );

        let call = ModelCall::new(
            &self.models.planning,
            planning_prompt(
                state.topic(),
                state.clarifications_text(),
                state.findings(),
                &ctx.gaps,
                &ctx.previous_queries,
                self.config.max_queries_per_plan,
            ),
        )
        .with_system(PLANNING_SYSTEM)
        .with_schema(&PLAN_SCHEMA)
        .with_activity(ActivityType::Plan);

        let plan: PlanOutput = match self.brain.call_structured(call, state, &mut ctx.tracker).await {
            Ok(plan) => plan,
            Err(e) => return self.fail(ctx, ActivityType::Plan, &e),
        };

        let mut seen: HashSet<String> = ctx
            .previous_queries
            .iter()
            .map(|q| q.to_lowercase())
            .collect();
        let queries: Vec<String> = plan
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
            .take(self.config.max_queries_per_plan)
            .collect();

        if queries.is_empty() {
            ctx.tracker.add(
                ActivityType::Plan,
                ActivityStatus::Complete,
                "No new search queries planned",
            );
            return ResearchPhase::Reporting;
        }

        ctx.tracker.add(
            ActivityType::Plan,
            ActivityStatus::Complete,
            format!("Planned {} search queries: {}", queries.len(), queries.join("; ")),
        );
        ctx.previous_queries.extend(queries.iter().cloned());
        ctx.planned = queries;
        ResearchPhase::Searching
    }

    async fn search_planned(&self, ctx: &mut RunContext) -> ResearchPhase {
        for query in std::mem::take(&mut ctx.planned) {
            ctx.tracker.add(
                ActivityType::Search,
                ActivityStatus::Pending,
                format!("Searching for \"{query}\""),
            );
            let mut results = self.search.search(&query, &mut ctx.tracker).await;
            results.truncate(self.config.max_search_results);
            ctx.tracker.add(
                ActivityType::Search,
                ActivityStatus::Complete,
                format!("Found {} results for \"{query}\"", results.len()),
            );
            ctx.batches.push((query, results));
        }
        ResearchPhase::Extracting
    }

    /// Extract findings one result at a time. The claim on a URL happens
    /// before its model call, so a failed source is never retried later.
    async fn extract(&self, ctx: &mut RunContext, state: &mut ResearchState) -> ResearchPhase {
        for (query, results) in std::mem::take(&mut ctx.batches) {
            for result in results {
                if result.url.is_empty() || !state.claim_url(&result.url) {
                    debug!(url = %result.url, "Skipping already processed source");
                    continue;
                }

                ctx.tracker.add(
                    ActivityType::Extract,
                    ActivityStatus::Pending,
                    format!("Extracting content from {}", result.url),
                );

                let content = truncate_chars(&result.content, self.config.max_content_chars);
                let call = ModelCall::new(
                    &self.models.extraction,
                    extraction_prompt(
                        state.topic(),
                        state.clarifications_text(),
                        &result.title,
                        &result.url,
                        content,
                    ),
                )
                .with_system(EXTRACTION_SYSTEM)
                .with_schema(&EXTRACTION_SCHEMA)
                .with_activity(ActivityType::Extract);

                match self
                    .brain
                    .call_structured::<ExtractionOutput>(call, state, &mut ctx.tracker)
                    .await
                {
                    Ok(extracted) => {
                        state.add_finding(Finding {
                            source: result.url.clone(),
                            content: extracted.summary,
                            query: query.clone(),
                        });
                        ctx.tracker.add(
                            ActivityType::Extract,
                            ActivityStatus::Complete,
                            format!("Extracted from {}", result.url),
                        );
                    }
                    Err(e) => {
                        ctx.tracker.add(
                            ActivityType::Extract,
                            ActivityStatus::Warning,
                            format!("Failed to extract from {}: {e}", result.url),
                        );
                    }
                }
            }
        }
        ResearchPhase::Deciding
    }

    async fn decide(&self, ctx: &mut RunContext, state: &mut ResearchState) -> ResearchPhase {
        if ctx.iteration >= self.config.max_iterations {
            ctx.tracker.add(
                ActivityType::Analyze,
                ActivityStatus::Complete,
                format!(
                    "Reached the maximum of {} research iterations",
                    self.config.max_iterations
                ),
            );
            return ResearchPhase::Reporting;
        }

        ctx.tracker.add(
            ActivityType::Analyze,
            ActivityStatus::Pending,
            format!("Analyzing {} findings", state.findings().len()),
        );

        let call = ModelCall::new(
            &self.models.analysis,
            analysis_prompt(
                state.topic(),
                state.clarifications_text(),
                state.findings(),
                ctx.iteration,
                self.config.max_iterations,
            ),
        )
        .with_system(ANALYSIS_SYSTEM)
        .with_schema(&ANALYSIS_SCHEMA)
        .with_activity(ActivityType::Analyze);

        let verdict: AnalysisOutput = match self.brain.call_structured(call, state, &mut ctx.tracker).await {
            Ok(verdict) => verdict,
            Err(e) => return self.fail(ctx, ActivityType::Analyze, &e),
        };

        if verdict.sufficient {
            ctx.tracker.add(
                ActivityType::Analyze,
                ActivityStatus::Complete,
                "Findings are sufficient for the report",
            );
            ResearchPhase::Reporting
        } else {
            ctx.tracker.add(
                ActivityType::Analyze,
                ActivityStatus::Complete,
                format!(
                    "More research needed: {}",
                    if verdict.gaps.is_empty() {
                        "no specific gaps named".to_string()
                    } else {
                        verdict.gaps.join("; ")
                    }
                ),
            );
            ctx.gaps = verdict.gaps;
            ResearchPhase::Planning
        }
    }

    async fn report(&self, ctx: &mut RunContext, state: &mut ResearchState) -> ResearchPhase {
        ctx.tracker.add(
            ActivityType::Generate,
            ActivityStatus::Pending,
            format!("Generating report from {} findings", state.findings().len()),
        );

        let call = ModelCall::new(
            &self.models.report,
            report_prompt(state.topic(), state.clarifications_text(), state.findings()),
        )
        .with_system(REPORT_SYSTEM)
        .with_activity(ActivityType::Generate);

        let report = match self.brain.call_text(call, state, &mut ctx.tracker).await {
            Ok(report) => report,
            Err(e) => return self.fail(ctx, ActivityType::Generate, &e),
        };

        // The report is always the last event on the stream.
        ctx.tracker.add(
            ActivityType::Report,
            ActivityStatus::Complete,
            "Research report generated",
        );
        ctx.tracker.sink().write(ResearchEvent::Report(report.clone()));
        ctx.report = Some(report);
        ResearchPhase::Done
    }

    fn fail(&self, ctx: &mut RunContext, kind: ActivityType, error: &ResearchError) -> ResearchPhase {
        let message = error.to_string();
        ctx.tracker.add(kind, ActivityStatus::Error, message.clone());
        ctx.error = Some(message);
        ResearchPhase::Failed
    }
}
