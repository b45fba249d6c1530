//! LLM 推断 - 业务能力层
//!
//! 只负责"根据考试名和已知来源推断文档要求"，不关心级联流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（兼容 OpenAI API 的服务均可）

use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{normalize_key, DiscoveryRequest, Requirement, RequirementKind, SourceInfo};
use crate::utils::truncate_text;

/// 推断结果的置信度上限
const MAX_PREDICTION_CONFIDENCE: f64 = 0.6;
const DEFAULT_PREDICTION_CONFIDENCE: f64 = 0.5;
/// 写入提示词的来源数量
const PROMPT_SOURCES: usize = 5;

const SYSTEM_MESSAGE: &str = "You are an assistant that knows the online application procedures of Indian competitive exams. \
Given an exam name, list the documents an applicant must upload. \
Reply with JSON only: {\"requirements\": [{\"id\", \"name\", \"kind\", \"required\", \"formats\", \"minSize\", \"maxSize\", \"width\", \"height\", \"description\"}], \"confidence\": 0.0-1.0}. \
Sizes are strings such as \"50KB\". Use ids like photo, signature, thumb_impression, handwritten_declaration, educational_certificate, category_certificate, identity_proof.";

/// 推断出的要求
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub requirements: Vec<Requirement>,
    pub confidence: f64,
}

/// ML 推断接口
#[async_trait]
pub trait RequirementPredictor: Send + Sync {
    /// 推断考试的文档要求；无法推断时返回 `None`
    async fn predict_requirements(
        &self,
        request: &DiscoveryRequest,
        prior_sources: &[SourceInfo],
    ) -> Result<Option<Prediction>>;
}

/// 基于 LLM 的推断
///
/// 职责：
/// - 构造提示词（考试名 + 上下文 + 已知来源）
/// - 调用 chat completion
/// - 容错解析 JSON（接受 ``` 代码块包裹、前后多余文字）
pub struct LlmPredictor {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmPredictor {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 发送一次对话请求，返回文本内容
    async fn send_to_llm(&self, user_message: &str, system_message: &str) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_message)
                    .build()?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_message)
                    .build()?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.2)
            .max_tokens(1024u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow!("LLM API 调用失败: {}", e)
        })?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .ok_or_else(|| anyhow!("LLM 返回内容为空"))
    }
}

#[async_trait]
impl RequirementPredictor for LlmPredictor {
    async fn predict_requirements(
        &self,
        request: &DiscoveryRequest,
        prior_sources: &[SourceInfo],
    ) -> Result<Option<Prediction>> {
        let user_message = build_prompt(request, prior_sources);
        let response = self.send_to_llm(&user_message, SYSTEM_MESSAGE).await?;
        debug!("LLM 响应: {}", truncate_text(&response, 200));

        let prediction = parse_prediction(&response)?;
        if prediction.requirements.is_empty() {
            return Ok(None);
        }
        Ok(Some(prediction))
    }
}

/// 构造用户消息
pub fn build_prompt(request: &DiscoveryRequest, prior_sources: &[SourceInfo]) -> String {
    let mut prompt = format!("Exam: {}\n", request.exam_name.trim());

    if let Some(context) = &request.context {
        if let Some(year) = context.year {
            prompt.push_str(&format!("Year: {}\n", year));
        }
        if let Some(region) = &context.region {
            prompt.push_str(&format!("Region: {}\n", region));
        }
        if let Some(level) = &context.level {
            prompt.push_str(&format!("Level: {}\n", level));
        }
    }

    if !prior_sources.is_empty() {
        prompt.push_str("\nKnown sources:\n");
        for source in prior_sources.iter().take(PROMPT_SOURCES) {
            prompt.push_str(&format!(
                "- {} ({}): {}\n",
                source.title,
                source.url,
                truncate_text(&source.snippet, 160)
            ));
        }
    }

    prompt.push_str("\nList the document upload requirements as JSON.");
    prompt
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionPayload {
    Object {
        #[serde(default)]
        requirements: Vec<PredictedRequirement>,
        #[serde(default)]
        confidence: Option<f64>,
    },
    List(Vec<PredictedRequirement>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictedRequirement {
    #[serde(alias = "type")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default, alias = "format")]
    formats: Vec<String>,
    #[serde(default, alias = "min_size")]
    min_size: Option<String>,
    #[serde(default, alias = "max_size")]
    max_size: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    description: Option<String>,
}

impl PredictedRequirement {
    fn into_requirement(self, confidence: f64) -> Option<Requirement> {
        let id = normalize_key(&self.id).replace('-', "_");
        if id.is_empty() {
            return None;
        }

        let kind = match self.kind.as_deref().map(str::to_lowercase).as_deref() {
            Some("media") | Some("image") => RequirementKind::Media,
            Some("form-field") | Some("form_field") | Some("field") => RequirementKind::FormField,
            Some(_) => RequirementKind::Document,
            None if matches!(id.as_str(), "photo" | "signature" | "thumb_impression") => RequirementKind::Media,
            None => RequirementKind::Document,
        };
        let name = self.name.unwrap_or_else(|| id.replace('_', " "));

        let mut requirement = Requirement::new(id, name, kind)
            .with_formats(&self.formats)
            .with_size(self.min_size.as_deref(), self.max_size.as_deref())
            .with_description(self.description.unwrap_or_default())
            .with_confidence(confidence);
        if let (Some(w), Some(h)) = (self.width, self.height) {
            requirement = requirement.with_dimensions(w, h);
        }
        if self.required == Some(false) {
            requirement = requirement.optional();
        }
        Some(requirement)
    }
}

/// 解析 LLM 响应
///
/// 接受裸 JSON、```json 代码块，以及 JSON 前后夹杂说明文字的情况
pub fn parse_prediction(response: &str) -> Result<Prediction> {
    let json = extract_json(response).ok_or_else(|| anyhow!("LLM 响应中没有 JSON: {}", truncate_text(response, 100)))?;
    let payload: PredictionPayload = serde_json::from_str(json)?;

    let (items, confidence) = match payload {
        PredictionPayload::Object {
            requirements,
            confidence,
        } => (requirements, confidence),
        PredictionPayload::List(items) => (items, None),
    };
    let confidence = confidence
        .unwrap_or(DEFAULT_PREDICTION_CONFIDENCE)
        .clamp(0.0, MAX_PREDICTION_CONFIDENCE);

    let requirements = crate::models::merge_requirements(
        items
            .into_iter()
            .filter_map(|item| item.into_requirement(confidence)),
    );

    Ok(Prediction {
        requirements,
        confidence,
    })
}

fn extract_json(response: &str) -> Option<&str> {
    let text = response.trim();
    let text = match text.find("```") {
        Some(start) => {
            let after = &text[start + 3..];
            let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
            let body = &after[body_start..];
            body.find("```").map(|end| &body[..end]).unwrap_or(body)
        }
        None => text,
    };

    let start = text.find(['{', '['])?;
    let closing = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closing)?;
    (end > start).then(|| text[start..=end].trim())
}
