use crate::tools::validate_parameters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<Value>,
    },
    Markdown,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Formatted {
    pub content: String,
    pub formatted: Option<Value>,
    pub next_agent: Option<String>,
}

impl OutputFormat {
    /// Extra system prompt text that steers the model toward this format.
    pub fn instructions(&self) -> Option<String> {
        match self {
            Self::Text => None,
            Self::Json { schema: None } => {
                Some("Respond with a single JSON object and nothing else.".to_string())
            }
            Self::Json { schema: Some(schema) } => Some(format!(
                "Respond with a single JSON object matching this schema and nothing else:\n{schema}"
            )),
            Self::Markdown => Some("Format your answer as Markdown.".to_string()),
        }
    }

    pub fn apply(&self, content: &str) -> Formatted {
        match self {
            Self::Text => Formatted {
                content: content.trim().to_string(),
                ..Formatted::default()
            },
            Self::Markdown => Formatted {
                content: strip_fence(content).unwrap_or(content).trim().to_string(),
                ..Formatted::default()
            },
            Self::Json { schema } => {
                let Some(value) = extract_json(content) else {
                    warn!("Agent output is not valid JSON; leaving it unformatted");
                    return Formatted {
                        content: content.to_string(),
                        ..Formatted::default()
                    };
                };

                if let Some(schema) = schema
                    && let Err(e) = validate_parameters(schema, &value)
                {
                    warn!("Agent output does not match its schema: {}", e);
                    return Formatted {
                        content: content.to_string(),
                        ..Formatted::default()
                    };
                }

                let next_agent = value
                    .get("next_agent")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);

                Formatted {
                    content: content.to_string(),
                    formatted: Some(value),
                    next_agent,
                }
            }
        }
    }
}

fn strip_fence(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("```")?;
    let body_start = rest.find('\n')? + 1;
    let body = rest[body_start..].strip_suffix("```")?;
    Some(body)
}

/// First JSON object or array in `text`, fenced or bare.
fn extract_json(text: &str) -> Option<Value> {
    let text = strip_fence(text).unwrap_or(text);
    let start = text.find(['{', '['])?;
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()?
        .ok()
}
