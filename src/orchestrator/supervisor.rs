use regex::Regex;
use serde::Serialize;

use crate::task::Task;

const RISK_KEYWORDS: &[&str] = &[
    "delete",
    "remove",
    "destroy",
    "harm",
    "dangerous",
    "illegal",
    "private",
    "secret",
    "confidential",
    "password",
    "token",
];

const CONTENT_FILTERS: &[&str] = &["inappropriate", "offensive", "harmful", "violent", "explicit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Review outcome for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Execute as-is.
    Approve,
    /// Execute, but surface the feedback to the caller.
    Warn,
    /// Do not execute.
    Reject,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewResult {
    pub verdict: Verdict,
    pub risk_level: RiskLevel,
    pub feedback: String,
    pub suggestions: Vec<String>,
}

/// Pre-execution reviewer for task prompts.
///
/// High-risk prompts and content violations block execution; medium risk
/// and structural complexity only downgrade to a warning so legitimate
/// tasks that merely mention files or APIs still run.
pub struct Supervisor {
    ssn: Regex,
    phone: Regex,
    email: Regex,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            ssn: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
            phone: Regex::new(r"\b\d{3}-\d{3}-\d{4}\b").unwrap(),
            email: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
        }
    }

    pub fn review(&self, task: &Task) -> ReviewResult {
        let risk_level = self.assess_risk(task);
        let content_issues = self.check_content(task);
        let complexity_issues = check_complexity(task);

        let verdict = if risk_level == RiskLevel::High || !content_issues.is_empty() {
            Verdict::Reject
        } else if risk_level == RiskLevel::Medium || !complexity_issues.is_empty() {
            Verdict::Warn
        } else {
            Verdict::Approve
        };

        ReviewResult {
            verdict,
            risk_level,
            feedback: feedback(risk_level, &content_issues, &complexity_issues),
            suggestions: suggestions(task, risk_level, &content_issues, &complexity_issues),
        }
    }

    fn assess_risk(&self, task: &Task) -> RiskLevel {
        let prompt = task.prompt.to_lowercase();
        let mut score = 0u32;

        for keyword in RISK_KEYWORDS {
            if prompt.contains(keyword) {
                score += 2;
            }
        }
        if prompt.contains("system") || prompt.contains("admin") || prompt.contains("root") {
            score += 3;
        }
        if prompt.contains("file") || prompt.contains("directory") || prompt.contains("folder") {
            score += 1;
        }
        if prompt.contains("network") || prompt.contains("http") || prompt.contains("api") {
            score += 1;
        }

        if score >= 5 {
            RiskLevel::High
        } else if score >= 2 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn check_content(&self, task: &Task) -> Vec<String> {
        let prompt = task.prompt.to_lowercase();
        let mut issues = Vec::new();

        for filter in CONTENT_FILTERS {
            if prompt.contains(filter) {
                issues.push(format!("Content may contain {} material", filter));
            }
        }

        for pattern in [&self.ssn, &self.phone, &self.email] {
            if pattern.is_match(&task.prompt) {
                issues.push("Content may contain personal information".to_string());
            }
        }

        issues
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn check_complexity(task: &Task) -> Vec<String> {
    let mut issues = Vec::new();

    if task.depth > 3 {
        issues.push("Task depth exceeds recommended limit".to_string());
    }
    if task.child_tasks.len() > 10 {
        issues.push("Task has too many subtasks".to_string());
    }
    if task.prompt.len() > 1000 {
        issues.push("Task prompt is too long".to_string());
    }

    issues
}

fn feedback(risk_level: RiskLevel, content: &[String], complexity: &[String]) -> String {
    let mut parts = Vec::new();

    match risk_level {
        RiskLevel::High => parts.push("High risk task detected".to_string()),
        RiskLevel::Medium => parts.push("Medium risk task, proceed with caution".to_string()),
        RiskLevel::Low => {}
    }
    if !content.is_empty() {
        parts.push(format!("Content issues: {}", content.join(", ")));
    }
    if !complexity.is_empty() {
        parts.push(format!("Complexity issues: {}", complexity.join(", ")));
    }

    if parts.is_empty() {
        "Task approved for execution".to_string()
    } else {
        parts.join(". ")
    }
}

fn suggestions(
    task: &Task,
    risk_level: RiskLevel,
    content: &[String],
    complexity: &[String],
) -> Vec<String> {
    let mut suggestions = Vec::new();

    if risk_level == RiskLevel::High {
        suggestions.push("Consider breaking down into smaller, safer subtasks".to_string());
        suggestions.push("Review task parameters for potential security issues".to_string());
    }
    if !content.is_empty() {
        suggestions.push("Review and sanitize input content".to_string());
        suggestions.push("Add content filtering rules".to_string());
    }
    if !complexity.is_empty() {
        suggestions.push("Break down complex tasks into simpler subtasks".to_string());
        suggestions.push("Limit task depth and number of subtasks".to_string());
    }
    if task.prompt.len() > 500 {
        suggestions.push("Consider simplifying the task prompt".to_string());
    }

    suggestions
}
