//! Prompt templates, output schemas, and typed results for each model call
//! a research run makes.

use super::state::Finding;
use crate::schema::{Field, OutputSchema, SchemaType};
use serde::Deserialize;

pub const PLANNING_SYSTEM: &str = "You are a senior research planner. Given a research topic, \
the user's clarifications, and what has been learned so far, you decide which web searches \
will most efficiently close the remaining knowledge gaps. Queries must be specific, \
self-contained, and must not repeat searches that were already run.";

pub const EXTRACTION_SYSTEM: &str = "You are a meticulous research assistant. You read a single \
source document and extract only the information relevant to the research topic. Preserve \
concrete facts, figures, dates, and names. Do not speculate beyond the source.";

pub const ANALYSIS_SYSTEM: &str = "You are a critical research analyst. You judge whether the \
collected findings are sufficient to write a thorough, well-supported report on the topic, \
and name the specific gaps that remain when they are not.";

pub const REPORT_SYSTEM: &str = "You are an expert research writer. You write comprehensive, \
well-structured reports in Markdown, grounded strictly in the findings you are given, and \
cite sources by URL.";

pub const QUESTIONS_SYSTEM: &str = "You help users scope research requests before any research \
begins.";

pub const PLAN_SCHEMA: OutputSchema = OutputSchema {
    description: "the next search queries to run",
    fields: &[Field::required(
        "queries",
        SchemaType::Array(&SchemaType::String),
        "Search queries to run next, most important first",
    )],
};

pub const EXTRACTION_SCHEMA: OutputSchema = OutputSchema {
    description: "the relevant content extracted from one source",
    fields: &[Field::required(
        "summary",
        SchemaType::String,
        "Condensed, factual summary of the source content relevant to the topic",
    )],
};

pub const ANALYSIS_SCHEMA: OutputSchema = OutputSchema {
    description: "whether the findings are sufficient",
    fields: &[
        Field::required(
            "sufficient",
            SchemaType::Boolean,
            "True when the findings are enough to write the final report",
        ),
        Field::optional(
            "gaps",
            SchemaType::Array(&SchemaType::String),
            "Specific open questions still worth researching",
        ),
    ],
};

pub const QUESTIONS_SCHEMA: OutputSchema = OutputSchema {
    description: "the generated clarifying questions",
    fields: &[Field::required(
        "questions",
        SchemaType::Array(&SchemaType::String),
        "Two to four clarifying questions",
    )],
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlanOutput {
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractionOutput {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisOutput {
    pub sufficient: bool,
    #[serde(default)]
    pub gaps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionsOutput {
    pub questions: Vec<String>,
}

fn findings_digest(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No findings yet.".to_string();
    }
    findings
        .iter()
        .enumerate()
        .map(|(i, f)| {
            format!(
                "[{}] Source: {}\nQuery: {}\n{}",
                i + 1,
                f.source,
                f.query,
                f.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "None.".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn planning_prompt(
    topic: &str,
    clarifications: &str,
    findings: &[Finding],
    gaps: &[String],
    previous_queries: &[String],
    max_queries: usize,
) -> String {
    format!(
        "Research topic: {topic}\n\n\
         Clarifications (JSON): {clarifications}\n\n\
         Findings so far:\n{findings}\n\n\
         Known gaps:\n{gaps}\n\n\
         Queries already run:\n{previous}\n\n\
         Propose at most {max_queries} new search queries that would best advance this research. \
         Return an empty list if no further searching is useful.",
        findings = findings_digest(findings),
        gaps = bullet_list(gaps),
        previous = bullet_list(previous_queries),
    )
}

pub fn extraction_prompt(topic: &str, clarifications: &str, title: &str, url: &str, content: &str) -> String {
    format!(
        "Research topic: {topic}\n\n\
         Clarifications (JSON): {clarifications}\n\n\
         Source title: {title}\n\
         Source URL: {url}\n\n\
         <content>\n{content}\n</content>\n\n\
         Extract everything in this source that is relevant to the research topic."
    )
}

pub fn analysis_prompt(topic: &str, clarifications: &str, findings: &[Finding], iteration: usize, max_iterations: usize) -> String {
    format!(
        "Research topic: {topic}\n\n\
         Clarifications (JSON): {clarifications}\n\n\
         Findings ({count}):\n{digest}\n\n\
         This is research iteration {iteration} of {max_iterations}. Decide whether these findings \
         are sufficient for a comprehensive report. If they are not, list the specific gaps.",
        count = findings.len(),
        digest = findings_digest(findings),
    )
}

pub fn report_prompt(topic: &str, clarifications: &str, findings: &[Finding]) -> String {
    format!(
        "Research topic: {topic}\n\n\
         Clarifications (JSON): {clarifications}\n\n\
         Findings:\n{digest}\n\n\
         Write a comprehensive research report on the topic using only these findings. \
         Use Markdown headings, include an executive summary and a conclusion, and cite the \
         source URL for every claim. Wrap the entire report in <report></report> tags.",
        digest = findings_digest(findings),
    )
}

pub fn questions_prompt(topic: &str) -> String {
    format!(
        "Given the research topic \"{topic}\", generate 2-4 clarifying questions to help narrow \
         down the research scope. Focus on identifying:\n\
         - Specific aspects of interest\n\
         - Required depth/complexity level\n\
         - Any particular perspective or excluded sources"
    )
}
