//! Rolling metrics over context optimizations, with threshold alerts.

use super::sri::SriResult;
use chrono::{DateTime, DurationRound, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

const MAX_RECORDS: usize = 10_000;
const ALERT_WINDOW: usize = 100;
const ALERT_MIN_SAMPLES: usize = 10;

/// One optimization pass as seen by the collector.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationRecord {
    pub timestamp: DateTime<Utc>,
    pub original_tokens: usize,
    pub optimized_tokens: usize,
    pub reduction_percentage: i64,
    pub injected_memories: usize,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

impl OptimizationRecord {
    fn tokens_saved(&self) -> i64 {
        self.original_tokens as i64 - self.optimized_tokens as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub requests: usize,
    pub average_reduction: f64,
    pub tokens_saved: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyBucket {
    pub hour: String,
    pub requests: usize,
    pub average_reduction: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub total_requests: usize,
    pub average_reduction: f64,
    pub total_tokens_saved: i64,
    pub average_injected_memories: f64,
    pub top_agents: Vec<AgentSummary>,
    pub hourly: Vec<HourlyBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
    pub severity: AlertSeverity,
}

/// Query window for metric listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Hour,
    Day,
    Week,
    Month,
}

impl TimeRange {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1h" => Some(Self::Hour),
            "24h" => Some(Self::Day),
            "7d" => Some(Self::Week),
            "30d" => Some(Self::Month),
            _ => None,
        }
    }

    fn duration(self) -> chrono::Duration {
        match self {
            Self::Hour => chrono::Duration::hours(1),
            Self::Day => chrono::Duration::hours(24),
            Self::Week => chrono::Duration::days(7),
            Self::Month => chrono::Duration::days(30),
        }
    }
}

/// Keeps the most recent optimization records and derives summaries.
#[derive(Default)]
pub struct MetricsCollector {
    records: RwLock<VecDeque<OptimizationRecord>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, result: &SriResult, task_id: &str, agent_id: Option<&str>) {
        let record = OptimizationRecord {
            timestamp: Utc::now(),
            original_tokens: result.original_tokens,
            optimized_tokens: result.optimized_tokens,
            reduction_percentage: result.reduction_percentage,
            injected_memories: result.injected_memories.len(),
            task_id: task_id.to_string(),
            agent_id: agent_id.map(|s| s.to_string()),
        };

        let mut records = self.records.write().await;
        records.push_back(record);
        while records.len() > MAX_RECORDS {
            records.pop_front();
        }
    }

    pub async fn performance(&self) -> PerformanceSummary {
        let records = self.records.read().await;
        if records.is_empty() {
            return PerformanceSummary {
                total_requests: 0,
                average_reduction: 0.0,
                total_tokens_saved: 0,
                average_injected_memories: 0.0,
                top_agents: Vec::new(),
                hourly: Vec::new(),
            };
        }

        let total = records.len();
        let average_reduction =
            records.iter().map(|r| r.reduction_percentage).sum::<i64>() as f64 / total as f64;
        let total_tokens_saved = records.iter().map(|r| r.tokens_saved()).sum();
        let average_injected_memories =
            records.iter().map(|r| r.injected_memories).sum::<usize>() as f64 / total as f64;

        // Per-agent rollup, ranked by tokens saved
        let mut by_agent: HashMap<&str, (usize, i64, i64)> = HashMap::new();
        for record in records.iter() {
            if let Some(agent) = record.agent_id.as_deref() {
                let entry = by_agent.entry(agent).or_default();
                entry.0 += 1;
                entry.1 += record.reduction_percentage;
                entry.2 += record.tokens_saved();
            }
        }
        let mut top_agents: Vec<AgentSummary> = by_agent
            .into_iter()
            .map(|(agent_id, (requests, reduction_sum, tokens_saved))| AgentSummary {
                agent_id: agent_id.to_string(),
                requests,
                average_reduction: reduction_sum as f64 / requests as f64,
                tokens_saved,
            })
            .collect();
        top_agents.sort_by(|a, b| b.tokens_saved.cmp(&a.tokens_saved));
        top_agents.truncate(5);

        let hourly = hourly_buckets(&records);

        PerformanceSummary {
            total_requests: total,
            average_reduction,
            total_tokens_saved,
            average_injected_memories,
            top_agents,
            hourly,
        }
    }

    /// Threshold alerts over the last hundred records. Silent until enough
    /// samples exist to be meaningful.
    pub async fn alerts(&self) -> Vec<Alert> {
        let records = self.records.read().await;
        let start = records.len().saturating_sub(ALERT_WINDOW);
        let recent: Vec<&OptimizationRecord> = records.iter().skip(start).collect();
        if recent.len() < ALERT_MIN_SAMPLES {
            return Vec::new();
        }

        let count = recent.len() as f64;
        let avg_reduction =
            recent.iter().map(|r| r.reduction_percentage).sum::<i64>() as f64 / count;
        let avg_saved = recent.iter().map(|r| r.tokens_saved()).sum::<i64>() as f64 / count;
        let avg_memories =
            recent.iter().map(|r| r.injected_memories).sum::<usize>() as f64 / count;

        let mut alerts = Vec::new();
        if avg_reduction < 20.0 {
            alerts.push(Alert {
                kind: "low_reduction",
                message: format!(
                    "Token reduction is below 20% (current: {:.1}%)",
                    avg_reduction
                ),
                severity: AlertSeverity::Medium,
            });
        }
        if avg_saved < 100.0 {
            alerts.push(Alert {
                kind: "low_savings",
                message: format!(
                    "Average token savings is low ({:.0} tokens per request)",
                    avg_saved
                ),
                severity: AlertSeverity::Low,
            });
        }
        if avg_memories == 0.0 && avg_reduction < 10.0 {
            alerts.push(Alert {
                kind: "no_memories",
                message: "No memories are being injected, consider lowering emotion threshold"
                    .to_string(),
                severity: AlertSeverity::High,
            });
        }
        alerts
    }

    pub async fn for_range(&self, range: TimeRange) -> Vec<OptimizationRecord> {
        let cutoff = Utc::now() - range.duration();
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub async fn for_agent(&self, agent_id: &str) -> Vec<OptimizationRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.agent_id.as_deref() == Some(agent_id))
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

/// 24 one-hour buckets ending at the current hour, oldest first.
fn hourly_buckets(records: &VecDeque<OptimizationRecord>) -> Vec<HourlyBucket> {
    let now = Utc::now();
    let current_hour = now
        .duration_trunc(chrono::Duration::hours(1))
        .unwrap_or(now);

    (0..24)
        .rev()
        .map(|i| {
            let start = current_hour - chrono::Duration::hours(i);
            let end = start + chrono::Duration::hours(1);
            let in_bucket: Vec<&OptimizationRecord> = records
                .iter()
                .filter(|r| r.timestamp >= start && r.timestamp < end)
                .collect();
            let requests = in_bucket.len();
            let average_reduction = if requests == 0 {
                0.0
            } else {
                in_bucket
                    .iter()
                    .map(|r| r.reduction_percentage)
                    .sum::<i64>() as f64
                    / requests as f64
            };
            HourlyBucket {
                hour: start.format("%Y-%m-%dT%H:00").to_string(),
                requests,
                average_reduction,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(original: usize, optimized: usize, memories: usize) -> SriResult {
        let injected = (0..memories)
            .map(|i| super::super::MemoryRecall {
                fingerprint: format!("{:016x}", i),
                policy_delta: super::super::PolicyDelta::reinforce("general"),
                relevance: 0.9,
                memory: "#mem: general-succeeded → ok".to_string(),
            })
            .collect();
        SriResult {
            original_tokens: original,
            optimized_tokens: optimized,
            reduction_percentage: if original == 0 {
                0
            } else {
                ((original as f64 - optimized as f64) / original as f64 * 100.0).round() as i64
            },
            injected_memories: injected,
            context: String::new(),
        }
    }

    #[tokio::test]
    async fn test_performance_summary_totals() {
        let collector = MetricsCollector::new();
        collector.record(&result(1000, 400, 2), "t1", Some("planner")).await;
        collector.record(&result(1000, 600, 1), "t2", Some("planner")).await;
        collector.record(&result(500, 400, 0), "t3", Some("worker")).await;

        let summary = collector.performance().await;
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.total_tokens_saved, 600 + 400 + 100);
        assert!((summary.average_reduction - (60 + 40 + 20) as f64 / 3.0).abs() < 1e-9);
        assert!((summary.average_injected_memories - 1.0).abs() < 1e-9);

        assert_eq!(summary.top_agents.len(), 2);
        assert_eq!(summary.top_agents[0].agent_id, "planner");
        assert_eq!(summary.top_agents[0].tokens_saved, 1000);

        assert_eq!(summary.hourly.len(), 24);
        let bucket_total: usize = summary.hourly.iter().map(|b| b.requests).sum();
        assert_eq!(bucket_total, 3);
    }

    #[tokio::test]
    async fn test_empty_collector_summary() {
        let collector = MetricsCollector::new();
        let summary = collector.performance().await;
        assert_eq!(summary.total_requests, 0);
        assert!(summary.top_agents.is_empty());
        assert!(summary.hourly.is_empty());
    }

    #[tokio::test]
    async fn test_alerts_require_minimum_samples() {
        let collector = MetricsCollector::new();
        for i in 0..5 {
            collector
                .record(&result(100, 95, 0), &format!("t{}", i), None)
                .await;
        }
        assert!(collector.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_metrics_raise_all_alerts() {
        let collector = MetricsCollector::new();
        for i in 0..12 {
            collector
                .record(&result(100, 95, 0), &format!("t{}", i), None)
                .await;
        }

        let alerts = collector.alerts().await;
        let kinds: Vec<&str> = alerts.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&"low_reduction"));
        assert!(kinds.contains(&"low_savings"));
        assert!(kinds.contains(&"no_memories"));

        let high = alerts.iter().find(|a| a.kind == "no_memories").unwrap();
        assert_eq!(high.severity, AlertSeverity::High);
    }

    #[tokio::test]
    async fn test_healthy_metrics_raise_no_alerts() {
        let collector = MetricsCollector::new();
        for i in 0..12 {
            collector
                .record(&result(1000, 400, 2), &format!("t{}", i), Some("planner"))
                .await;
        }
        assert!(collector.alerts().await.is_empty());
    }

    #[tokio::test]
    async fn test_retention_cap() {
        let collector = MetricsCollector::new();
        for i in 0..(MAX_RECORDS + 50) {
            collector
                .record(&result(100, 50, 1), &format!("t{}", i), None)
                .await;
        }
        let summary = collector.performance().await;
        assert_eq!(summary.total_requests, MAX_RECORDS);
    }

    #[tokio::test]
    async fn test_agent_and_range_queries() {
        let collector = MetricsCollector::new();
        collector.record(&result(100, 50, 1), "t1", Some("planner")).await;
        collector.record(&result(100, 50, 1), "t2", Some("worker")).await;

        let planner = collector.for_agent("planner").await;
        assert_eq!(planner.len(), 1);
        assert_eq!(planner[0].task_id, "t1");

        let recent = collector.for_range(TimeRange::Hour).await;
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_time_range_parse() {
        assert_eq!(TimeRange::parse("1h"), Some(TimeRange::Hour));
        assert_eq!(TimeRange::parse("24h"), Some(TimeRange::Day));
        assert_eq!(TimeRange::parse("7d"), Some(TimeRange::Week));
        assert_eq!(TimeRange::parse("30d"), Some(TimeRange::Month));
        assert_eq!(TimeRange::parse("2h"), None);
    }
}
