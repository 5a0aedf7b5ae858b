//! Request builder: turns a [`GenerateRequest`] into one provider call.
//!
//! The [`ProviderSpec`] table decides the URL, credential, converter and
//! allow-list; this module wires them together and adds the handful of
//! provider-specific body fields that do not fit the table.

use crate::allow_list::pick;
use crate::registry::{
    ANTHROPIC_EXTENDED_TTL_BETA, AuthScheme, ConverterKind, Credential, ProviderSpec, spec,
};
use promptrelay_config::Config;
use promptrelay_translate::{
    CacheControl, ClaudeOptions, GoogleOptions, MistralOptions, PostProcessing, ReplyShape,
    cache_at_depth, convert_ai21, convert_claude, convert_cohere, convert_google, convert_mistral,
    prompt_text,
};
use promptrelay_types::{
    CredentialSource, GenerateRequest, Message, PromptInput, ProviderId, RelayError, Result, Role,
};
use serde_json::{Map, Value, json};

/// Claude rejects requests without `max_tokens`.
const DEFAULT_CLAUDE_MAX_TOKENS: u64 = 4096;

/// Gemini harm categories relaxed on every request.
const GOOGLE_HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];

/// A fully assembled upstream call.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub provider: ProviderId,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body; `None` issues a `GET`.
    pub body: Option<Value>,
    pub stream: bool,
    pub reply: ReplyShape,
    /// Keep reasoning text when normalizing the reply.
    pub include_thoughts: bool,
}

/// Builds outbound requests against one configuration snapshot.
pub struct Dispatcher<'a> {
    config: &'a Config,
    credentials: &'a dyn CredentialSource,
}

impl<'a> Dispatcher<'a> {
    #[must_use]
    pub fn new(config: &'a Config, credentials: &'a dyn CredentialSource) -> Self {
        Self {
            config,
            credentials,
        }
    }

    /// Converts `request` into the call for `provider`.
    ///
    /// The request is consumed; its messages are moved into the converter.
    ///
    /// # Errors
    ///
    /// - [`RelayError::MissingCredential`] when a required key is not stored.
    /// - [`RelayError::MissingField`] when `model`, `custom_url` or `prompt`
    ///   is required and absent.
    /// - [`RelayError::Config`] when the provider is disabled.
    /// - [`RelayError::Conversion`] for an unknown post-processing preset.
    pub fn prepare(&self, provider: ProviderId, request: GenerateRequest) -> Result<OutboundRequest> {
        let spec = spec(provider);
        let base = self.base_url(&spec, &request.params)?;
        let mut headers = self.auth_headers(&spec)?;
        let model = request.require_model()?.to_string();
        let stream = request.stream;
        let include_thoughts = request
            .flag("include_reasoning")
            .or_else(|| request.flag("show_thoughts"))
            .unwrap_or(false);

        let mut url = format!("{base}{}", spec.path);
        let body = match spec.converter {
            ConverterKind::Claude => {
                let (body, extended_ttl) = self.claude_body(&spec, &model, request)?;
                if extended_ttl {
                    headers.push(("anthropic-beta".into(), ANTHROPIC_EXTENDED_TTL_BETA.into()));
                }
                body
            }
            ConverterKind::MakerSuite => {
                url = if stream {
                    format!("{url}/{model}:streamGenerateContent?alt=sse")
                } else {
                    format!("{url}/{model}:generateContent")
                };
                self.makersuite_body(&spec, &model, request, include_thoughts)?
            }
            ConverterKind::Cohere => {
                let names = request.names();
                let prompt = convert_cohere(request.messages, &names, self.config.placeholder());
                chat_body(&spec, &model, stream, &request.params, &prompt.chat_history)?
            }
            ConverterKind::Ai21 => {
                let names = request.names();
                let messages = convert_ai21(request.messages, &names, self.config.placeholder());
                chat_body(&spec, &model, stream, &request.params, &messages)?
            }
            ConverterKind::Mistral => {
                let names = request.names();
                let options = MistralOptions {
                    enable_prefix: self.config.mistral.enable_prefix,
                };
                let messages =
                    convert_mistral(request.messages, options, &names, self.config.placeholder());
                chat_body(&spec, &model, stream, &request.params, &messages)?
            }
            ConverterKind::Merge(preset) => {
                let names = request.names();
                let mut messages = preset.apply(request.messages, &names, self.config.placeholder());
                if provider == ProviderId::DeepSeek {
                    mark_assistant_prefix(&mut messages);
                }
                chat_body(&spec, &model, stream, &request.params, &messages)?
            }
            ConverterKind::RequestedMerge => {
                let preset: PostProcessing = request
                    .param_str("custom_prompt_post_processing")
                    .unwrap_or_default()
                    .parse()?;
                let names = request.names();
                let messages = preset.apply(request.messages, &names, self.config.placeholder());
                chat_body(&spec, &model, stream, &request.params, &messages)?
            }
            ConverterKind::PassThrough => self.passthrough_body(&spec, &model, request)?,
            ConverterKind::TextPrompt => text_body(&spec, &model, request)?,
        };

        tracing::debug!(provider = %provider, url = %url, stream, "prepared upstream request");
        Ok(OutboundRequest {
            provider,
            url,
            headers,
            body: Some(body),
            stream,
            reply: spec.reply,
            include_thoughts,
        })
    }

    /// Builds the model-listing call for `provider`.
    ///
    /// `params` carries request-level base URL overrides (`custom_url`,
    /// `api_server`).
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if the provider has no listing endpoint,
    /// plus the credential and base URL errors of [`Dispatcher::prepare`].
    pub fn prepare_models(
        &self,
        provider: ProviderId,
        params: &Map<String, Value>,
    ) -> Result<OutboundRequest> {
        let spec = spec(provider);
        let Some(models_path) = spec.models_path else {
            return Err(RelayError::Config(format!(
                "{provider} does not expose a model listing"
            )));
        };
        let base = self.base_url(&spec, params)?;
        let headers = self.auth_headers(&spec)?;
        Ok(OutboundRequest {
            provider,
            url: format!("{base}{models_path}"),
            headers,
            body: None,
            stream: false,
            reply: ReplyShape::OpenAi,
            include_thoughts: false,
        })
    }

    fn base_url(&self, spec: &ProviderSpec, params: &Map<String, Value>) -> Result<String> {
        let override_key = match spec.id {
            ProviderId::Custom => Some("custom_url"),
            ProviderId::Ollama => Some("api_server"),
            _ => None,
        };
        let provider = self.config.provider(spec.id);
        if !provider.enabled {
            return Err(RelayError::Config(format!(
                "provider {} is disabled",
                spec.id
            )));
        }

        let from_request = override_key
            .and_then(|key| params.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        let base = from_request
            .or(provider.base_url.filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| spec.base_url.to_string());
        if base.is_empty() {
            return Err(RelayError::MissingField(
                override_key.unwrap_or("base_url").to_string(),
            ));
        }
        Ok(base.trim_end_matches('/').to_string())
    }

    fn auth_headers(&self, spec: &ProviderSpec) -> Result<Vec<(String, String)>> {
        let mut headers: Vec<(String, String)> = spec
            .headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        match (self.credentials.credential(spec.credential_key), spec.credential) {
            (Some(key), _) => headers.push(match spec.auth {
                AuthScheme::Bearer => ("authorization".into(), format!("Bearer {key}")),
                AuthScheme::XApiKey => ("x-api-key".into(), key),
                AuthScheme::GoogleApiKey => ("x-goog-api-key".into(), key),
            }),
            (None, Credential::Optional) => {}
            (None, Credential::Required) => return Err(RelayError::MissingCredential(spec.id)),
        }
        Ok(headers)
    }

    /// Returns the body and whether the extended cache TTL beta is needed.
    fn claude_body(
        &self,
        spec: &ProviderSpec,
        model: &str,
        request: GenerateRequest,
    ) -> Result<(Value, bool)> {
        let claude = &self.config.claude;
        let options = ClaudeOptions {
            prefill: request.param_str("assistant_prefill").map(String::from),
            use_system_prompt: request
                .flag("use_sysprompt")
                .unwrap_or(claude.use_system_prompt),
            use_tools: request.has_tools(),
        };
        let names = request.names();
        let mut prompt = convert_claude(request.messages, &options, &names, self.config.placeholder());

        let control = CacheControl::ephemeral(Some(claude.cache_ttl.clone()));
        let caching = claude.caching_at_depth.is_some() || claude.cache_system_prompt;
        if let Some(depth) = claude.caching_at_depth {
            cache_at_depth(&mut prompt.messages, depth, &control);
        }
        if claude.cache_system_prompt {
            prompt.cache_system_prompt(&control);
        }

        let mut body = pick(&request.params, spec.allow_list, spec.renames);
        body.insert("model".into(), json!(model));
        body.insert("messages".into(), serde_json::to_value(&prompt.messages)?);
        if !prompt.system.is_empty() {
            body.insert("system".into(), serde_json::to_value(&prompt.system)?);
        }
        body.entry("max_tokens")
            .or_insert_with(|| json!(DEFAULT_CLAUDE_MAX_TOKENS));
        if options.use_tools {
            if let Some(tools) = request.params.get("tools").and_then(Value::as_array) {
                body.insert("tools".into(), claude_tools(tools));
            }
            if let Some(choice) = request.params.get("tool_choice").and_then(claude_tool_choice) {
                body.insert("tool_choice".into(), choice);
            }
        }
        body.insert("stream".into(), json!(request.stream));

        let extended_ttl = caching && control.ttl.as_deref() == Some("1h");
        Ok((Value::Object(body), extended_ttl))
    }

    fn makersuite_body(
        &self,
        spec: &ProviderSpec,
        model: &str,
        request: GenerateRequest,
        include_thoughts: bool,
    ) -> Result<Value> {
        let options = GoogleOptions {
            model: model.to_string(),
            use_system_prompt: request.flag("use_sysprompt").unwrap_or(true)
                && supports_system_instruction(model),
        };
        let names = request.names();
        let prompt = convert_google(request.messages, &options, &names, self.config.placeholder());

        let mut generation_config = pick(&request.params, spec.allow_list, spec.renames);
        if include_thoughts {
            generation_config.insert("thinkingConfig".into(), json!({"includeThoughts": true}));
        }
        let safety_settings: Vec<Value> = GOOGLE_HARM_CATEGORIES
            .iter()
            .map(|category| json!({"category": category, "threshold": "BLOCK_NONE"}))
            .collect();

        let mut body = Map::new();
        body.insert("contents".into(), serde_json::to_value(&prompt.contents)?);
        body.insert("safetySettings".into(), json!(safety_settings));
        body.insert("generationConfig".into(), Value::Object(generation_config));
        if let Some(instruction) = &prompt.system_instruction {
            body.insert("systemInstruction".into(), serde_json::to_value(instruction)?);
        }
        if let Some(tools) = request.params.get("tools").and_then(Value::as_array)
            && !tools.is_empty()
        {
            let declarations: Vec<Value> = tools
                .iter()
                .filter_map(|t| t.get("function"))
                .cloned()
                .collect();
            body.insert("tools".into(), json!([{"functionDeclarations": declarations}]));
        }
        Ok(Value::Object(body))
    }

    fn passthrough_body(&self, spec: &ProviderSpec, model: &str, request: GenerateRequest) -> Result<Value> {
        let mut body = chat_body(spec, model, request.stream, &request.params, &request.messages)?;

        let openrouter = &self.config.openrouter;
        if spec.id == ProviderId::OpenRouter
            && model.starts_with("anthropic/claude")
            && let Some(depth) = openrouter.caching_at_depth
            && let Some(messages) = body.get_mut("messages").and_then(Value::as_array_mut)
        {
            let control = CacheControl::ephemeral(Some(openrouter.cache_ttl.clone()));
            cache_at_depth(messages, depth, &control);
        }
        Ok(body)
    }
}

/// Older Gemini and Gemma models reject `systemInstruction`.
fn supports_system_instruction(model: &str) -> bool {
    !(model.starts_with("gemma-") || model == "gemini-pro" || model == "gemini-1.0-pro")
}

/// DeepSeek continues a trailing assistant turn when it is marked as prefix.
fn mark_assistant_prefix(messages: &mut [Message]) {
    if let Some(last) = messages.last_mut()
        && last.role == Role::Assistant
    {
        last.prefix = true;
    }
}

fn chat_body(
    spec: &ProviderSpec,
    model: &str,
    stream: bool,
    params: &Map<String, Value>,
    messages: &impl serde::Serialize,
) -> Result<Value> {
    let mut body = pick(params, spec.allow_list, spec.renames);
    body.insert("model".into(), json!(model));
    body.insert("messages".into(), serde_json::to_value(messages)?);
    body.insert("stream".into(), json!(stream));
    Ok(Value::Object(body))
}

fn text_body(spec: &ProviderSpec, model: &str, request: GenerateRequest) -> Result<Value> {
    let prompt = match request.prompt {
        Some(prompt) => prompt_text(prompt),
        None if !request.messages.is_empty() => prompt_text(PromptInput::Messages(request.messages)),
        None => return Err(RelayError::MissingField("prompt".into())),
    };
    let sampling = pick(&request.params, spec.allow_list, spec.renames);

    if spec.id == ProviderId::Ollama {
        let keep_alive = request.params.get("keep_alive").cloned().unwrap_or(json!(-1));
        return Ok(json!({
            "model": model,
            "prompt": prompt,
            "stream": request.stream,
            "raw": true,
            "keep_alive": keep_alive,
            "options": sampling,
        }));
    }

    let mut body = sampling;
    body.insert("model".into(), json!(model));
    body.insert("prompt".into(), json!(prompt));
    body.insert("stream".into(), json!(request.stream));
    Ok(Value::Object(body))
}

/// OpenAI function tools into Claude tool definitions.
fn claude_tools(tools: &[Value]) -> Value {
    tools
        .iter()
        .filter_map(|tool| tool.get("function"))
        .map(|function| {
            json!({
                "name": function.get("name").cloned().unwrap_or(Value::Null),
                "description": function.get("description").cloned().unwrap_or(json!("")),
                "input_schema": function
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            })
        })
        .collect()
}

fn claude_tool_choice(choice: &Value) -> Option<Value> {
    match choice {
        Value::String(mode) => match mode.as_str() {
            "auto" => Some(json!({"type": "auto"})),
            "required" => Some(json!({"type": "any"})),
            "none" => Some(json!({"type": "none"})),
            _ => None,
        },
        Value::Object(_) => choice
            .pointer("/function/name")
            .map(|name| json!({"type": "tool", "name": name})),
        _ => None,
    }
}
