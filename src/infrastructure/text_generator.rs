//! HTTP text generator speaking the Ollama `/api/generate` protocol.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GeneratorConfig;
use crate::error::GenerationError;
use crate::ports::TextGenerator;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

pub struct OllamaGenerator {
    client: Client,
    url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;
        Ok(OllamaGenerator {
            client,
            url: format!("{}/api/generate", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout_secs)
        } else {
            GenerationError::Unavailable(err.to_string())
        }
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        debug!(url = %self.url, model = %self.model, chars = prompt.len(), "requesting generation");
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "generation request rejected");
            return Err(GenerationError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout_secs)
            } else {
                GenerationError::Malformed(e.to_string())
            }
        })?;
        body.response
            .ok_or_else(|| GenerationError::Malformed("missing 'response' field".to_string()))
    }
}

const FENCE: &str = "```";

/// Tags recognized in front of code on a single-line fence.
const LANGUAGE_TAGS: &[&str] = &["rust", "rs"];

/// Extract the first fenced block from a reply, dropping any prose around
/// it and its language tag. Replies without a fence are only trimmed.
pub fn strip_code_fences(text: &str) -> String {
    let Some(open) = text.find(FENCE) else {
        return text.trim().to_string();
    };
    let after = &text[open + FENCE.len()..];
    let fenced = match after.find(FENCE) {
        Some(close) => &after[..close],
        None => after,
    };
    let body = match fenced.split_once('\n') {
        Some((info, rest)) if is_info_string(info) => rest,
        Some(_) => fenced,
        None => strip_language_tag(fenced),
    };
    body.trim().to_string()
}

fn is_info_string(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.'))
}

fn strip_language_tag(line: &str) -> &str {
    let line = line.trim_start();
    match line.split_once(char::is_whitespace) {
        Some((tag, rest)) if LANGUAGE_TAGS.contains(&tag.to_ascii_lowercase().as_str()) => rest,
        _ => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// One-shot HTTP server answering a single request with `status` and `body`.
    fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();

            let mut stream = stream;
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
        });
        format!("http://{}", addr)
    }

    fn generator(endpoint: String) -> OllamaGenerator {
        OllamaGenerator::new(&GeneratorConfig {
            endpoint,
            model: "llama3".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```rust\nfn main() {}\n```"), "fn main() {}");
        assert_eq!(strip_code_fences("```\nlet x = 1;\n```\n"), "let x = 1;");
        assert_eq!(strip_code_fences("  plain text  "), "plain text");
    }

    #[test]
    fn test_strip_single_line_fence() {
        assert_eq!(strip_code_fences("```rust fn main() {}```"), "fn main() {}");
        assert_eq!(strip_code_fences("```let x = 1;```"), "let x = 1;");
    }

    #[test]
    fn test_strip_fence_surrounded_by_prose() {
        let reply = "Here you go:\n```rust\nfn main() {}\n```\nHope that helps.";
        assert_eq!(strip_code_fences(reply), "fn main() {}");

        let unterminated = "Sure:\n```rs\nfn main() {\n    run();\n}";
        assert_eq!(strip_code_fences(unterminated), "fn main() {\n    run();\n}");
    }

    #[test]
    fn test_generate_reads_response_field() {
        let endpoint = serve_once("200 OK", r#"{"model":"llama3","response":"fn main() {}","done":true}"#);
        let text = generator(endpoint).generate("hello").unwrap();
        assert_eq!(text, "fn main() {}");
    }

    #[test]
    fn test_non_success_status() {
        let endpoint = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let result = generator(endpoint).generate("hello");
        assert!(matches!(result, Err(GenerationError::Status(500))));
    }

    #[test]
    fn test_malformed_payload() {
        let endpoint = serve_once("200 OK", r#"{"done":true}"#);
        let result = generator(endpoint).generate("hello");
        assert!(matches!(result, Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_unreachable_service() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let result = generator(format!("http://{}", addr)).generate("hello");
        assert!(matches!(result, Err(GenerationError::Unavailable(_))));
    }
}
