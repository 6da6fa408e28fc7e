// src/prompt.rs
//! 프롬프트 렌더러
//!
//! `{path}` 자리표시자를 컨텍스트 값으로 치환합니다. `{{`, `}}`는 리터럴 중괄호.
//! 문자열 값은 그대로, 그 외 JSON 값은 compact JSON으로 삽입됩니다.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::agent::{PromptMessage, PromptRole};
use crate::error::SequenceError;
use crate::state::{lookup_path, Message};

/// 템플릿 렌더링 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing key '{0}'")]
    MissingKey(String),

    #[error("malformed template at byte {position}: {reason}")]
    Malformed { position: usize, reason: &'static str },
}

/// 컨텍스트 값을 템플릿에 삽입할 문자열로 변환
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 단일 템플릿 렌더링
pub fn render_template(template: &str, context: &Map<String, Value>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut key = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    key.push(c);
                }
                if !closed {
                    return Err(TemplateError::Malformed { position: pos, reason: "unclosed '{'" });
                }
                let key = key.trim();
                if key.is_empty() {
                    return Err(TemplateError::Malformed { position: pos, reason: "empty placeholder" });
                }
                let value = lookup_path(context, key).ok_or_else(|| TemplateError::MissingKey(key.to_string()))?;
                out.push_str(&value_to_text(value));
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::Malformed { position: pos, reason: "single '}'" });
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// 에이전트 프롬프트 목록 렌더링
pub fn render_prompt(
    prompt: &[PromptMessage],
    context: &Map<String, Value>,
    agent_id: &str,
) -> Result<Vec<Message>, SequenceError> {
    prompt
        .iter()
        .map(|message| {
            let content = render_template(&message.template, context).map_err(|e| match e {
                TemplateError::MissingKey(key) => SequenceError::MissingPromptKey {
                    key,
                    agent_id: agent_id.to_string(),
                },
                malformed => SequenceError::InvalidConfiguration(format!(
                    "prompt template of agent {agent_id}: {malformed}"
                )),
            })?;
            Ok(match message.role {
                PromptRole::System => Message::system(&content),
                PromptRole::User => Message::user(&content),
                PromptRole::Assistant => Message::assistant(&content),
            })
        })
        .collect()
}
