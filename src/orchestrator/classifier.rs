use regex::Regex;
use serde_json::{json, Value};

use crate::task::TaskType;

/// Outcome of prompt classification.
///
/// `parameters` holds whatever could be extracted from the prompt for the
/// chosen type (size, model, voice, word count, ...) and is stowed in the
/// task metadata so the worker does not have to re-parse the prompt.
#[derive(Debug, Clone)]
pub struct Classification {
    pub task_type: TaskType,
    pub confidence: f64,
    pub parameters: Value,
}

const CONVERSATION_KEYWORDS: &[&str] = &[
    "hello", "hi", "how are you", "what's up", "tell me", "explain", "weather", "joke", "time",
    "date", "help", "assist",
];

const COMPOSITE_INDICATORS: &[&str] = &["first", "then", "finally", "and then", "after that"];

const IMAGE_KEYWORDS: &[&str] = &[
    "generate",
    "create",
    "make",
    "draw",
    "design",
    "render",
    "produce",
    "image",
    "picture",
    "photo",
    "artwork",
    "illustration",
    "visual",
];

const TEXT_KEYWORDS: &[&str] = &[
    "write",
    "compose",
    "create",
    "generate",
    "draft",
    "produce",
    "story",
    "essay",
    "article",
    "text",
    "content",
    "narrative",
];

const AUDIO_KEYWORDS: &[&str] = &[
    "convert",
    "transform",
    "speech",
    "audio",
    "voice",
    "narration",
    "tts",
    "text-to-speech",
];

/// Keyword classifier that routes a prompt to a task type and pulls
/// generation parameters out of it.
///
/// Checks run in priority order: conversational prompts win, then
/// multi-step composites, then the media types. Anything unmatched becomes
/// a generic task at low confidence.
pub struct Classifier {
    size: Regex,
    image_model: Regex,
    voice: Regex,
    temperature: Regex,
    word_count: Regex,
    image_subject: Regex,
    text_subject: Regex,
    composite_subject: Regex,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            size: Regex::new(r"(\d{3,4})x(\d{3,4})").unwrap(),
            image_model: Regex::new(r"(flux|dalle|openai)").unwrap(),
            voice: Regex::new(r"(alloy|echo|fable|onyx|nova|shimmer)").unwrap(),
            temperature: Regex::new(r"temperature\s*(\d*\.?\d+)").unwrap(),
            word_count: Regex::new(r"(\d+)-?\s*word").unwrap(),
            image_subject: Regex::new(
                r"(?:of|a|an)\s+([^,]+?)(?:\s+\d{3,4}x\d{3,4}|\s+(?:using|with)|$)",
            )
            .unwrap(),
            text_subject: Regex::new(r"(?:about|on|regarding)\s+([^,]+?)(?:\s+\d+|\s+with|$)")
                .unwrap(),
            composite_subject: Regex::new(
                r"(?:generate|create|write|make)\s+(?:an?\s+)?([^,]+?)(?:\s+then|\s+finally|$)",
            )
            .unwrap(),
        }
    }

    pub fn classify(&self, prompt: &str) -> Classification {
        let lower = prompt.to_lowercase();

        if contains_any(&lower, CONVERSATION_KEYWORDS) {
            return Classification {
                task_type: TaskType::Conversation,
                confidence: 0.95,
                parameters: json!({}),
            };
        }

        if contains_any(&lower, COMPOSITE_INDICATORS) {
            return Classification {
                task_type: TaskType::CompositeTask,
                confidence: 0.85,
                parameters: self.composite_parameters(&lower),
            };
        }

        if contains_any(&lower, IMAGE_KEYWORDS) {
            return Classification {
                task_type: TaskType::ImageGeneration,
                confidence: 0.9,
                parameters: self.image_parameters(&lower),
            };
        }

        if contains_any(&lower, TEXT_KEYWORDS) {
            return Classification {
                task_type: TaskType::TextGeneration,
                confidence: 0.9,
                parameters: self.text_parameters(&lower),
            };
        }

        if contains_any(&lower, AUDIO_KEYWORDS) {
            return Classification {
                task_type: TaskType::AudioGeneration,
                confidence: 0.9,
                parameters: self.audio_parameters(&lower),
            };
        }

        Classification {
            task_type: TaskType::GenericTask,
            confidence: 0.5,
            parameters: json!({}),
        }
    }

    fn image_parameters(&self, prompt: &str) -> Value {
        let mut params = json!({});

        if let Some(m) = self.size.find(prompt) {
            params["size"] = json!(m.as_str());
        }
        if let Some(caps) = self.image_model.captures(prompt) {
            params["model"] = json!(&caps[1]);
        }
        if let Some(caps) = self.image_subject.captures(prompt) {
            params["subject"] = json!(caps[1].trim());
        }
        if prompt.contains("transparent") {
            params["transparent"] = json!(true);
        }

        params
    }

    fn text_parameters(&self, prompt: &str) -> Value {
        let mut params = json!({});

        if let Some(caps) = self.word_count.captures(prompt) {
            if let Ok(words) = caps[1].parse::<u64>() {
                params["max_words"] = json!(words);
            }
        }
        if let Some(caps) = self.temperature.captures(prompt) {
            if let Ok(temp) = caps[1].parse::<f64>() {
                params["temperature"] = json!(temp);
            }
        }
        if let Some(caps) = self.text_subject.captures(prompt) {
            params["subject"] = json!(caps[1].trim());
        }

        params
    }

    fn audio_parameters(&self, prompt: &str) -> Value {
        let mut params = json!({});

        if let Some(caps) = self.voice.captures(prompt) {
            params["voice"] = json!(&caps[1]);
        }
        if prompt.contains("text to speech") || prompt.contains("tts") {
            params["action"] = json!("text_to_speech");
        } else if prompt.contains("speech to text") || prompt.contains("stt") {
            params["action"] = json!("speech_to_text");
        }

        params
    }

    fn composite_parameters(&self, prompt: &str) -> Value {
        let matched = COMPOSITE_INDICATORS
            .iter()
            .filter(|indicator| prompt.contains(*indicator))
            .count();

        let subjects: Vec<String> = self
            .composite_subject
            .captures_iter(prompt)
            .map(|caps| caps[1].trim().to_string())
            .collect();

        let mut params = json!({ "subtask_count": matched + 1 });
        if !subjects.is_empty() {
            params["subjects"] = json!(subjects);
        }
        params
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_any(prompt: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| prompt.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_wins_over_everything() {
        let classifier = Classifier::new();

        let result = classifier.classify("Hello there");
        assert_eq!(result.task_type, TaskType::Conversation);
        assert_eq!(result.confidence, 0.95);

        // "explain" outranks the image keywords that would otherwise match
        let result = classifier.classify("Explain how to generate an image");
        assert_eq!(result.task_type, TaskType::Conversation);
    }

    #[test]
    fn test_image_prompt_with_parameters() {
        let classifier = Classifier::new();
        let result = classifier.classify("Generate an image of a sunset 512x512 using flux");

        assert_eq!(result.task_type, TaskType::ImageGeneration);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.parameters["size"], "512x512");
        assert_eq!(result.parameters["model"], "flux");
        assert_eq!(result.parameters["subject"], "image of a sunset");
    }

    #[test]
    fn test_text_prompt_with_word_count() {
        let classifier = Classifier::new();
        let result = classifier.classify("Draft a 200-word essay on castles");

        assert_eq!(result.task_type, TaskType::TextGeneration);
        assert_eq!(result.parameters["max_words"], 200);
        assert_eq!(result.parameters["subject"], "castles");
    }

    #[test]
    fn test_audio_prompt_extracts_voice_and_action() {
        let classifier = Classifier::new();
        let result = classifier.classify("Convert announcement to speech, nova voice, tts");

        assert_eq!(result.task_type, TaskType::AudioGeneration);
        assert_eq!(result.parameters["voice"], "nova");
        assert_eq!(result.parameters["action"], "text_to_speech");
    }

    #[test]
    fn test_composite_prompt_counts_steps() {
        let classifier = Classifier::new();
        let result = classifier.classify("First draw a cat then write a poem");

        assert_eq!(result.task_type, TaskType::CompositeTask);
        assert_eq!(result.confidence, 0.85);
        // "first" and "then" matched
        assert_eq!(result.parameters["subtask_count"], 3);
        assert_eq!(result.parameters["subjects"][0], "poem");
    }

    #[test]
    fn test_unmatched_prompt_is_generic() {
        let classifier = Classifier::new();
        let result = classifier.classify("do the needful quietly");

        assert_eq!(result.task_type, TaskType::GenericTask);
        assert_eq!(result.confidence, 0.5);
        assert_eq!(result.parameters, json!({}));
    }
}
