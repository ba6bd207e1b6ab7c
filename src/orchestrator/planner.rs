use std::collections::HashSet;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::task::{Task, TaskType};

const SUBTASK_DURATION: Duration = Duration::from_secs(30);

/// One planned step of a composite task.
#[derive(Debug, Clone)]
pub struct PlannedSubtask {
    pub id: String,
    pub task_type: TaskType,
    pub prompt: String,
    /// Ids of subtasks that must complete before this one starts.
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Execution plan for a composite task.
#[derive(Debug, Clone)]
pub struct Plan {
    pub subtasks: Vec<PlannedSubtask>,
    pub estimated_duration: Duration,
    pub complexity: Complexity,
}

/// Splits composite prompts into subtask plans.
///
/// Sequencing connectors ("then", "after that", "finally") produce a chain
/// where each step depends on the previous one. A bare "and" without any
/// sequencing connector produces independent parallel steps. Everything
/// else becomes a single-step plan.
pub struct Planner {
    sequential_split: Regex,
    parallel_split: Regex,
}

impl Planner {
    pub fn new() -> Self {
        Self {
            sequential_split: Regex::new(r"(?i)\s+(?:and then|after that|then|finally)\s+")
                .unwrap(),
            parallel_split: Regex::new(r"(?i)\s+and\s+").unwrap(),
        }
    }

    pub fn plan(&self, task: &Task) -> Plan {
        let lower = task.prompt.to_lowercase();

        if ["then", "after that", "finally"]
            .iter()
            .any(|connector| lower.contains(connector))
        {
            return self.sequential_plan(&task.prompt);
        }

        if self.parallel_split.is_match(&task.prompt) {
            return self.parallel_plan(&task.prompt);
        }

        Plan {
            subtasks: vec![PlannedSubtask {
                id: "subtask-1".to_string(),
                task_type: subtask_type(&task.prompt),
                prompt: task.prompt.clone(),
                dependencies: Vec::new(),
            }],
            estimated_duration: SUBTASK_DURATION,
            complexity: Complexity::Low,
        }
    }

    fn sequential_plan(&self, prompt: &str) -> Plan {
        let subtasks: Vec<PlannedSubtask> = self
            .sequential_split
            .split(prompt)
            .enumerate()
            .map(|(index, part)| PlannedSubtask {
                id: format!("subtask-{}", index + 1),
                task_type: subtask_type(part),
                prompt: part.trim().to_string(),
                dependencies: if index == 0 {
                    Vec::new()
                } else {
                    vec![format!("subtask-{}", index)]
                },
            })
            .collect();

        let count = subtasks.len() as u32;
        Plan {
            subtasks,
            estimated_duration: SUBTASK_DURATION * count,
            complexity: if count > 2 {
                Complexity::High
            } else {
                Complexity::Medium
            },
        }
    }

    fn parallel_plan(&self, prompt: &str) -> Plan {
        let subtasks: Vec<PlannedSubtask> = self
            .parallel_split
            .split(prompt)
            .enumerate()
            .map(|(index, part)| PlannedSubtask {
                id: format!("subtask-{}", index + 1),
                task_type: subtask_type(part),
                prompt: part.trim().to_string(),
                dependencies: Vec::new(),
            })
            .collect();

        let count = subtasks.len();
        Plan {
            subtasks,
            // Parallel steps overlap, so the longest single step bounds the plan.
            estimated_duration: SUBTASK_DURATION,
            complexity: if count > 2 {
                Complexity::High
            } else {
                Complexity::Medium
            },
        }
    }

    /// Rejects plans with unknown dependency ids or dependency cycles.
    pub fn validate(&self, plan: &Plan) -> Result<(), String> {
        let known: HashSet<&str> = plan.subtasks.iter().map(|s| s.id.as_str()).collect();
        for subtask in &plan.subtasks {
            for dep in &subtask.dependencies {
                if !known.contains(dep.as_str()) {
                    return Err(format!(
                        "subtask {} depends on unknown subtask {}",
                        subtask.id, dep
                    ));
                }
            }
        }

        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        for subtask in &plan.subtasks {
            if has_cycle(&subtask.id, plan, &mut visited, &mut stack) {
                return Err(format!("dependency cycle involving subtask {}", subtask.id));
            }
        }
        Ok(())
    }
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

fn has_cycle(
    id: &str,
    plan: &Plan,
    visited: &mut HashSet<String>,
    stack: &mut HashSet<String>,
) -> bool {
    if stack.contains(id) {
        return true;
    }
    if visited.contains(id) {
        return false;
    }
    visited.insert(id.to_string());
    stack.insert(id.to_string());

    if let Some(subtask) = plan.subtasks.iter().find(|s| s.id == id) {
        for dep in &subtask.dependencies {
            if has_cycle(dep, plan, visited, stack) {
                return true;
            }
        }
    }

    stack.remove(id);
    false
}

fn subtask_type(prompt: &str) -> TaskType {
    let lower = prompt.to_lowercase();

    if lower.contains("image") || lower.contains("generate") || lower.contains("create") {
        return TaskType::ImageGeneration;
    }
    if lower.contains("story") || lower.contains("write") || lower.contains("text") {
        return TaskType::TextGeneration;
    }
    if lower.contains("audio") || lower.contains("speech") || lower.contains("voice") {
        return TaskType::AudioGeneration;
    }
    TaskType::GenericTask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite(prompt: &str) -> Task {
        Task::new(prompt.to_string(), TaskType::CompositeTask, 5, 3)
    }

    #[test]
    fn test_sequential_plan_chains_dependencies() {
        let planner = Planner::new();
        let plan = planner.plan(&composite(
            "generate an image of a cat then write a story about it finally convert it to speech",
        ));

        assert_eq!(plan.subtasks.len(), 3);
        assert_eq!(plan.complexity, Complexity::High);
        assert_eq!(plan.estimated_duration, Duration::from_secs(90));
        assert!(plan.subtasks[0].dependencies.is_empty());
        assert_eq!(plan.subtasks[1].dependencies, vec!["subtask-1"]);
        assert_eq!(plan.subtasks[2].dependencies, vec!["subtask-2"]);
        assert_eq!(plan.subtasks[0].task_type, TaskType::ImageGeneration);
        assert_eq!(plan.subtasks[1].task_type, TaskType::TextGeneration);
        assert_eq!(plan.subtasks[2].task_type, TaskType::AudioGeneration);
    }

    #[test]
    fn test_parallel_plan_has_no_dependencies() {
        let planner = Planner::new();
        let plan = planner.plan(&composite("draw a sunset and compose a poem"));

        assert_eq!(plan.subtasks.len(), 2);
        assert_eq!(plan.complexity, Complexity::Medium);
        assert_eq!(plan.estimated_duration, Duration::from_secs(30));
        assert!(plan.subtasks.iter().all(|s| s.dependencies.is_empty()));
    }

    #[test]
    fn test_single_step_plan() {
        let planner = Planner::new();
        let plan = planner.plan(&composite("summarize the quarterly report"));

        assert_eq!(plan.subtasks.len(), 1);
        assert_eq!(plan.complexity, Complexity::Low);
        assert_eq!(plan.subtasks[0].prompt, "summarize the quarterly report");
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let planner = Planner::new();
        let plan = Plan {
            subtasks: vec![PlannedSubtask {
                id: "subtask-1".to_string(),
                task_type: TaskType::GenericTask,
                prompt: "x".to_string(),
                dependencies: vec!["subtask-9".to_string()],
            }],
            estimated_duration: Duration::from_secs(30),
            complexity: Complexity::Low,
        };

        let err = planner.validate(&plan).unwrap_err();
        assert!(err.contains("unknown subtask"));
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let planner = Planner::new();
        let plan = Plan {
            subtasks: vec![
                PlannedSubtask {
                    id: "subtask-1".to_string(),
                    task_type: TaskType::GenericTask,
                    prompt: "a".to_string(),
                    dependencies: vec!["subtask-2".to_string()],
                },
                PlannedSubtask {
                    id: "subtask-2".to_string(),
                    task_type: TaskType::GenericTask,
                    prompt: "b".to_string(),
                    dependencies: vec!["subtask-1".to_string()],
                },
            ],
            estimated_duration: Duration::from_secs(60),
            complexity: Complexity::Medium,
        };

        let err = planner.validate(&plan).unwrap_err();
        assert!(err.contains("cycle"));
    }

    #[test]
    fn test_generated_plans_validate() {
        let planner = Planner::new();
        for prompt in [
            "generate a logo then write a tagline",
            "draw a sunset and compose a poem",
            "summarize the quarterly report",
        ] {
            let plan = planner.plan(&composite(prompt));
            assert!(planner.validate(&plan).is_ok(), "plan for {:?}", prompt);
        }
    }
}
