//! Working-directory analysis and intent extraction.
//!
//! Intent is derived from keyword scans of the user input, same idiom as
//! the task classifier. Clarifying questions cover whatever the scan
//! could not fill in.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How elaborate the requested project should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Advanced,
}

/// What the user wants built, as far as we could tell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Choice,
    Text,
    Boolean,
    Number,
}

/// A clarifying question for a field the intent scan left empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub required: bool,
}

/// Snapshot of the directory a project would be created in.
#[derive(Debug, Clone, Serialize)]
pub struct ContextAnalysis {
    pub working_directory: String,
    pub existing_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,
    pub has_git_repo: bool,
    pub is_empty: bool,
    pub detected_technologies: Vec<String>,
}

/// Marker files and the stack they indicate, in precedence order.
const TECH_MARKERS: &[(&str, &str)] = &[
    ("package.json", "nodejs"),
    ("requirements.txt", "python"),
    ("pyproject.toml", "python"),
    ("Cargo.toml", "rust"),
    ("pom.xml", "java"),
    ("go.mod", "go"),
    ("composer.json", "php"),
    ("Gemfile", "ruby"),
    ("Dockerfile", "docker"),
];

pub fn analyze_directory(dir: &Path) -> ContextAnalysis {
    let mut files: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();

    let mut detected = Vec::new();
    for (marker, tech) in TECH_MARKERS {
        if files.iter().any(|f| f == marker) && !detected.iter().any(|t| t == tech) {
            detected.push((*tech).to_string());
        }
    }
    // Dockerfiles say how a project ships, not what kind it is.
    let project_type = detected.iter().find(|t| *t != "docker").cloned();

    ContextAnalysis {
        working_directory: dir.display().to_string(),
        has_git_repo: files.iter().any(|f| f == ".git"),
        is_empty: files.is_empty(),
        project_type,
        existing_files: files,
        detected_technologies: detected,
    }
}

const TECHNOLOGIES: &[&str] = &[
    "react native",
    "react",
    "vue",
    "angular",
    "svelte",
    "next.js",
    "html",
    "nodejs",
    "express",
    "fastapi",
    "django",
    "spring",
    "rails",
    "flutter",
    "electron",
    "tauri",
    "tensorflow",
    "pytorch",
    "solidity",
];

const LANGUAGES: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "java",
    "rust",
    "php",
    "ruby",
    "swift",
    "kotlin",
    "dart",
    "go",
];

const FRAMEWORKS: &[&str] = &[
    "express", "fastapi", "django", "spring", "rails", "axum", "actix", "tailwind", "bootstrap",
];

const PURPOSES: &[&str] = &[
    "ecommerce",
    "blog",
    "portfolio",
    "dashboard",
    "api",
    "website",
    "game",
    "tool",
    "automation",
];

pub fn extract_intent(input: &str) -> Intent {
    let lower = input.to_lowercase();
    Intent {
        domain: detect_domain(&lower).to_string(),
        technology: first_match(&lower, TECHNOLOGIES),
        language: first_match(&lower, LANGUAGES),
        framework: first_match(&lower, FRAMEWORKS),
        purpose: first_match(&lower, PURPOSES),
        complexity: detect_complexity(&lower),
        features: detect_features(&lower),
        requirements: detect_requirements(&lower),
    }
}

fn detect_domain(input: &str) -> &'static str {
    let checks: &[(&'static str, &[&str])] = &[
        (
            "frontend",
            &[
                "frontend",
                "react",
                "vue",
                "angular",
                "html",
                "website",
                "web page",
                "landing page",
            ],
        ),
        ("backend", &["backend", "api", "server"]),
        ("mobile", &["mobile", "app", "ios", "android"]),
        ("desktop", &["desktop", "electron", "tauri"]),
        (
            "ai",
            &["machine learning", "neural", "tensorflow", "pytorch"],
        ),
        ("blockchain", &["blockchain", "smart contract", "solidity"]),
        ("script", &["script", "automation", "tool"]),
        ("content", &["content", "video", "youtube", "marketing"]),
    ];
    for (domain, keywords) in checks {
        if keywords.iter().any(|k| input.contains(k)) {
            return domain;
        }
    }
    "unknown"
}

fn first_match(input: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|c| input.contains(*c))
        .map(|c| (*c).to_string())
}

fn detect_complexity(input: &str) -> Option<Complexity> {
    if ["simple", "basic", "minimal"].iter().any(|k| input.contains(k)) {
        Some(Complexity::Simple)
    } else if ["medium", "intermediate"].iter().any(|k| input.contains(k)) {
        Some(Complexity::Medium)
    } else if ["advanced", "complex", "elaborate"]
        .iter()
        .any(|k| input.contains(k))
    {
        Some(Complexity::Advanced)
    } else {
        None
    }
}

fn detect_features(input: &str) -> Vec<String> {
    let checks: &[(&str, &[&str])] = &[
        ("authentication", &["authentication", "login", "jwt"]),
        ("database", &["database", "mongodb", "postgres", "sqlite"]),
        ("api", &["api", "rest", "graphql"]),
        ("testing", &["test"]),
        ("deployment", &["deploy", "docker"]),
        ("forms", &["form"]),
        ("styling", &["styling", "css", "design"]),
        ("responsive", &["responsive"]),
    ];
    checks
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| input.contains(k)))
        .map(|(feature, _)| (*feature).to_string())
        .collect()
}

/// The word after "with", "using" or "for" is usually a requirement.
fn detect_requirements(input: &str) -> Vec<String> {
    let words: Vec<&str> = input.split_whitespace().collect();
    let mut requirements = Vec::new();
    for pair in words.windows(2) {
        if matches!(pair[0], "with" | "using" | "for") {
            let follow: String = pair[1]
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string();
            if !follow.is_empty() {
                requirements.push(follow);
            }
        }
    }
    requirements
}

pub fn generate_questions(intent: &Intent) -> Vec<Question> {
    let mut questions = Vec::new();
    if intent.technology.is_none() {
        questions.push(Question {
            id: "technology".to_string(),
            text: "Which technology should the project use?".to_string(),
            question_type: QuestionType::Choice,
            options: technology_options(&intent.domain),
            required: true,
        });
    }
    if intent.language.is_none() {
        questions.push(Question {
            id: "language".to_string(),
            text: "Which programming language do you prefer?".to_string(),
            question_type: QuestionType::Choice,
            options: to_strings(&["javascript", "typescript", "python", "rust"]),
            required: false,
        });
    }
    if intent.purpose.is_none() {
        questions.push(Question {
            id: "purpose".to_string(),
            text: "What is the project for?".to_string(),
            question_type: QuestionType::Text,
            options: Vec::new(),
            required: false,
        });
    }
    if intent.complexity.is_none() {
        questions.push(Question {
            id: "complexity".to_string(),
            text: "How elaborate should the result be?".to_string(),
            question_type: QuestionType::Choice,
            options: to_strings(&["simple", "medium", "advanced"]),
            required: false,
        });
    }
    questions
}

fn technology_options(domain: &str) -> Vec<String> {
    match domain {
        "frontend" => to_strings(&["react", "vue", "angular", "html"]),
        "backend" => to_strings(&["nodejs", "express", "fastapi", "axum"]),
        "mobile" => to_strings(&["flutter", "react native"]),
        "desktop" => to_strings(&["electron", "tauri"]),
        _ => to_strings(&["react", "nodejs", "python", "html"]),
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Confidence in the extracted intent, reduced by every open question.
pub fn confidence(intent: &Intent, question_count: usize) -> f64 {
    let mut score: f64 = 0.5;
    if intent.domain != "unknown" {
        score += 0.2;
    }
    if intent.technology.is_some() {
        score += 0.15;
    }
    if intent.language.is_some() {
        score += 0.1;
    }
    if intent.purpose.is_some() {
        score += 0.1;
    }
    if intent.complexity.is_some() {
        score += 0.05;
    }
    score -= question_count as f64 * 0.05;
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rich_prompt_fills_most_intent_fields() {
        let intent =
            extract_intent("Build an advanced react dashboard with authentication using typescript");
        assert_eq!(intent.domain, "frontend");
        assert_eq!(intent.technology.as_deref(), Some("react"));
        assert_eq!(intent.language.as_deref(), Some("typescript"));
        assert_eq!(intent.purpose.as_deref(), Some("dashboard"));
        assert_eq!(intent.complexity, Some(Complexity::Advanced));
        assert!(intent.features.iter().any(|f| f == "authentication"));
        assert_eq!(intent.requirements, vec!["authentication", "typescript"]);
    }

    #[test]
    fn vague_prompt_yields_unknown_domain_and_questions() {
        let intent = extract_intent("do something nice please");
        assert_eq!(intent.domain, "unknown");
        assert!(intent.technology.is_none());

        let questions = generate_questions(&intent);
        assert_eq!(questions.len(), 4);
        assert_eq!(questions[0].id, "technology");
        assert!(questions[0].required);
        assert!(questions[0].options.contains(&"react".to_string()));
    }

    #[test]
    fn javascript_wins_over_java_substring() {
        let intent = extract_intent("a javascript tool");
        assert_eq!(intent.language.as_deref(), Some("javascript"));
    }

    #[test]
    fn confidence_rewards_detail_and_penalises_questions() {
        let full =
            extract_intent("Build an advanced react dashboard with authentication using typescript");
        let full_questions = generate_questions(&full);
        assert!(full_questions.is_empty());
        assert!((confidence(&full, 0) - 1.0).abs() < 1e-9);

        let vague = extract_intent("do something nice please");
        let score = confidence(&vague, 4);
        assert!((score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn directory_analysis_detects_stack() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM rust").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();

        let analysis = analyze_directory(dir.path());
        assert!(!analysis.is_empty);
        assert!(analysis.has_git_repo);
        assert_eq!(analysis.project_type.as_deref(), Some("rust"));
        assert_eq!(analysis.detected_technologies, vec!["rust", "docker"]);
        assert!(analysis.existing_files.contains(&"Cargo.toml".to_string()));
    }

    #[test]
    fn missing_directory_analyses_as_empty() {
        let analysis = analyze_directory(Path::new("/definitely/not/here"));
        assert!(analysis.is_empty);
        assert!(analysis.existing_files.is_empty());
        assert!(analysis.project_type.is_none());
    }
}
