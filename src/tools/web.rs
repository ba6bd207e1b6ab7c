//! Web tools: search and URL fetching.
//!
//! Search goes through the Tavily API when `TAVILY_API_KEY` is set and
//! falls back to scraping DuckDuckGo's HTML endpoint otherwise.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{floor_char_boundary, Tool};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; flui/0.3)";
const MAX_INLINE_BYTES: usize = 20_000;
const PREVIEW_BYTES: usize = 2_000;

/// Search the web.
pub struct WebSearch;

#[derive(Debug, Serialize)]
struct TavilyRequest {
    api_key: String,
    query: String,
    max_results: u32,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Debug, Deserialize)]
struct TavilyHit {
    title: String,
    url: String,
    content: String,
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return titles, URLs and snippets. Use for documentation, current facts or examples."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "num_results": { "type": "integer", "description": "Result count (default: 5, max: 10)" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<String> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;
        let num_results = args["num_results"].as_u64().unwrap_or(5).min(10) as u32;

        match std::env::var("TAVILY_API_KEY") {
            Ok(key) if !key.is_empty() => search_tavily(&key, query, num_results).await,
            _ => search_duckduckgo(query, num_results as usize).await,
        }
    }
}

async fn search_tavily(api_key: &str, query: &str, max_results: u32) -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let request = TavilyRequest {
        api_key: api_key.to_string(),
        query: query.to_string(),
        max_results,
        include_answer: true,
    };

    let response = client
        .post("https://api.tavily.com/search")
        .json(&request)
        .send()
        .await?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Tavily API error ({}): {}", status, body);
    }
    let parsed: TavilyResponse = response.json().await?;

    if parsed.results.is_empty() {
        return Ok(format!("No results found for: {}", query));
    }

    let mut output = String::new();
    if let Some(answer) = parsed.answer.filter(|a| !a.is_empty()) {
        output.push_str(&answer);
        output.push_str("\n\n");
    }
    for (i, hit) in parsed.results.iter().enumerate() {
        output.push_str(&format!(
            "{}. {} ({})\n{}\n\n",
            i + 1,
            hit.title,
            hit.url,
            hit.content
        ));
    }
    Ok(output.trim_end().to_string())
}

/// HTML-endpoint fallback; DuckDuckGo sometimes answers with a CAPTCHA
/// page instead.
async fn search_duckduckgo(query: &str, limit: usize) -> anyhow::Result<String> {
    let url = format!(
        "https://html.duckduckgo.com/html/?q={}",
        urlencoding::encode(query)
    );
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()?;
    let html = client.get(&url).send().await?.text().await?;

    if html.contains("anomaly-modal") || html.contains("Unfortunately, bots") {
        anyhow::bail!(
            "DuckDuckGo answered with a CAPTCHA. Set TAVILY_API_KEY for reliable search."
        );
    }

    let results = parse_ddg_results(&html, limit);
    if results.is_empty() {
        return Ok(format!("No results found for: {}", query));
    }
    Ok(results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n\n"))
}

fn parse_ddg_results(html: &str, limit: usize) -> Vec<String> {
    let mut results = Vec::new();
    for chunk in html.split("class=\"result__body\"").skip(1) {
        if results.len() >= limit {
            break;
        }
        let Some(title) = element_text(chunk, "class=\"result__a\"") else {
            continue;
        };
        let snippet = element_text(chunk, "class=\"result__snippet\"").unwrap_or_default();
        let url = element_text(chunk, "class=\"result__url\"").unwrap_or_default();
        results.push(format!("{} ({})\n{}", title, url, snippet));
    }
    results
}

/// Text run directly inside the first element of `chunk` whose opening
/// tag carries `class`. Nested markup past the first child is dropped.
fn element_text(chunk: &str, class: &str) -> Option<String> {
    let after = chunk.split(class).nth(1)?;
    let inner = after.split('>').nth(1)?.split('<').next()?;
    let text = html_unescape(inner.trim());
    (!text.is_empty()).then_some(text)
}

fn html_unescape(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

/// Fetch a URL.
pub struct FetchUrl;

#[async_trait]
impl Tool for FetchUrl {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch a URL. HTML is reduced to plain text. Large responses are saved into the workspace and a preview is returned."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "URL to fetch" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let url = args["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'url' argument"))?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP error {} for {}", response.status(), url);
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;

        let text = if content_type.contains("text/html") {
            html_to_text(&body)
        } else {
            body.clone()
        };
        if body.len() <= MAX_INLINE_BYTES {
            return Ok(text);
        }

        let name = format!("fetched-{}.{}", short_id(), extension_for(&content_type));
        let saved = workspace.join(&name);
        tokio::fs::write(&saved, &body).await?;
        let cut = floor_char_boundary(&text, PREVIEW_BYTES);
        Ok(format!(
            "Response is {} bytes; full body saved to {}\n\nPreview:\n{}",
            body.len(),
            saved.display(),
            &text[..cut]
        ))
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("json") {
        "json"
    } else if content_type.contains("html") {
        "html"
    } else if content_type.contains("csv") {
        "csv"
    } else if content_type.contains("xml") {
        "xml"
    } else {
        "txt"
    }
}

/// Strip tags from HTML, dropping script and style blocks entirely and
/// collapsing whitespace.
fn html_to_text(html: &str) -> String {
    let mut out = String::new();
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];
        let consumed = if tag_is(after, "script") {
            skip_block(after, "</script>")
        } else if tag_is(after, "style") {
            skip_block(after, "</style>")
        } else {
            after.find('>').map(|i| i + 1).unwrap_or(after.len())
        };
        out.push(' ');
        rest = &after[consumed..];
    }
    out.push_str(rest);
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    html_unescape(&collapsed)
}

fn tag_is(after: &str, name: &str) -> bool {
    after
        .get(1..1 + name.len())
        .is_some_and(|s| s.eq_ignore_ascii_case(name))
}

fn skip_block(s: &str, closing: &str) -> usize {
    match s.to_ascii_lowercase().find(closing) {
        Some(i) => i + closing.len(),
        None => s.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_reduced_to_text() {
        let html = r#"<html><head><style>body { color: red }</style>
            <script>var x = "<b>not text</b>";</script></head>
            <body><h1>Title</h1><p>First &amp; second</p></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Title First & second");
    }

    #[test]
    fn unterminated_script_block_is_dropped() {
        let text = html_to_text("<p>keep</p><script>var x = 1;");
        assert_eq!(text, "keep");
    }

    #[test]
    fn ddg_results_are_extracted() {
        let html = r##"
            <div class="result__body">
                <a class="result__a" href="https://a">Rust Book</a>
                <a class="result__snippet" href="#">Learn &quot;Rust&quot; here</a>
                <a class="result__url" href="#"> doc.rust-lang.org </a>
            </div>
            <div class="result__body">
                <a class="result__a" href="https://b">Tokio</a>
                <a class="result__snippet" href="#">Async runtime</a>
                <a class="result__url" href="#"> tokio.rs </a>
            </div>"##;
        let results = parse_ddg_results(html, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], "Rust Book (doc.rust-lang.org)\nLearn \"Rust\" here");
        assert!(results[1].starts_with("Tokio (tokio.rs)"));

        assert_eq!(parse_ddg_results(html, 1).len(), 1);
        assert!(parse_ddg_results("<html></html>", 5).is_empty());
    }

    #[test]
    fn extensions_follow_content_type() {
        assert_eq!(extension_for("application/json; charset=utf-8"), "json");
        assert_eq!(extension_for("text/html"), "html");
        assert_eq!(extension_for("text/csv"), "csv");
        assert_eq!(extension_for("application/xml"), "xml");
        assert_eq!(extension_for("application/octet-stream"), "txt");
    }
}
