//! Translation between the provider-agnostic conversation types and the
//! Gemini `generateContent` wire format.

use serde_json::{json, Map, Value};

use repoctx_tool_runtime::{LlmError, ModelPart, ModelTurn, ToolCall, ToolDefinition, ToolResult, Turn};

/// Schema keywords the function-declaration endpoint rejects.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "$id", "$comment"];

/// Translate a [`ToolDefinition`] into a Gemini function declaration.
///
/// The schema goes out as `parametersJsonSchema`, which keeps
/// `additionalProperties` so map-valued arguments such as
/// `path_dictionary` reach the model with their value type. Tools without
/// parameters get no schema at all.
pub(super) fn tool_definition_to_gemini(tool: &ToolDefinition) -> Value {
    let mut declaration = json!({
        "name": tool.name,
        "description": tool.description,
    });
    let parameters = sanitize_schema(&tool.input_schema);
    let has_properties = parameters["properties"]
        .as_object()
        .is_some_and(|props| !props.is_empty());
    if has_properties {
        declaration["parametersJsonSchema"] = parameters;
    }
    declaration
}

/// Strip unsupported keywords from a JSON schema, recursing through
/// `properties`, `items`, `additionalProperties` and the combinators.
/// Everything else is kept as is, `required` included.
pub(super) fn sanitize_schema(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        if UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()) {
            continue;
        }
        let translated = match key.as_str() {
            "properties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, prop)| (name.clone(), sanitize_schema(prop)))
                        .collect(),
                ),
                other => other.clone(),
            },
            "items" | "additionalProperties" => sanitize_schema(value),
            "anyOf" | "oneOf" | "allOf" => match value {
                Value::Array(variants) => {
                    Value::Array(variants.iter().map(sanitize_schema).collect())
                }
                other => other.clone(),
            },
            _ => value.clone(),
        };
        out.insert(key.clone(), translated);
    }
    Value::Object(out)
}

/// Translate the full history into Gemini `contents`.
///
/// Consecutive tool results are merged into one `user` content so that a
/// model turn carrying several calls is answered by a single reply.
pub(super) fn history_to_gemini(history: &[Turn]) -> Vec<Value> {
    let mut contents: Vec<Value> = Vec::with_capacity(history.len());
    let mut pending_responses: Vec<Value> = Vec::new();

    for turn in history {
        if let Turn::ToolResult(result) = turn {
            pending_responses.push(function_response(result));
            continue;
        }
        flush_responses(&mut contents, &mut pending_responses);
        match turn {
            Turn::User(text) => contents.push(json!({
                "role": "user",
                "parts": [{ "text": text }],
            })),
            Turn::Model(model_turn) => contents.push(json!({
                "role": "model",
                "parts": model_parts(model_turn),
            })),
            Turn::ToolResult(_) => {}
        }
    }
    flush_responses(&mut contents, &mut pending_responses);
    contents
}

fn flush_responses(contents: &mut Vec<Value>, pending: &mut Vec<Value>) {
    if pending.is_empty() {
        return;
    }
    contents.push(json!({
        "role": "user",
        "parts": std::mem::take(pending),
    }));
}

fn model_parts(turn: &ModelTurn) -> Vec<Value> {
    turn.parts
        .iter()
        .map(|part| match part {
            ModelPart::Text(text) => json!({ "text": text }),
            ModelPart::ToolCall(call) => json!({
                "functionCall": {
                    "name": call.name,
                    "args": call.input,
                }
            }),
        })
        .collect()
}

/// The `response` field must be an object: successes are wrapped under
/// `result`, failures under `error`.
fn function_response(result: &ToolResult) -> Value {
    let response = if result.is_error {
        json!({ "error": result.content })
    } else {
        json!({ "result": result.payload() })
    };
    json!({
        "functionResponse": {
            "name": result.name,
            "response": response,
        }
    })
}

/// Parse the first candidate of a `generateContent` response into a
/// [`ModelTurn`]. Calls without an id get a fresh one.
pub(super) fn parse_response(body: &Value) -> Result<ModelTurn, LlmError> {
    let Some(candidate) = body["candidates"].as_array().and_then(|c| c.first()) else {
        let reason = body["promptFeedback"]["blockReason"]
            .as_str()
            .unwrap_or("no candidates returned");
        return Err(LlmError::InvalidResponse(format!("empty response: {reason}")));
    };

    let Some(parts) = candidate["content"]["parts"].as_array() else {
        let reason = candidate["finishReason"].as_str().unwrap_or("missing content");
        return Err(LlmError::InvalidResponse(format!(
            "candidate has no content parts (finishReason: {reason})"
        )));
    };

    let mut turn = ModelTurn::default();
    for part in parts {
        if part["thought"].as_bool() == Some(true) {
            continue;
        }
        if let Some(call) = part.get("functionCall") {
            let name = call["name"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidResponse("functionCall without name".into()))?;
            let id = call["id"]
                .as_str()
                .filter(|id| !id.is_empty())
                .map(String::from)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let input = match &call["args"] {
                Value::Null => json!({}),
                args => args.clone(),
            };
            turn.parts.push(ModelPart::ToolCall(ToolCall {
                id,
                name: name.to_string(),
                input,
            }));
        } else if let Some(text) = part["text"].as_str() {
            turn.parts.push(ModelPart::Text(text.to_string()));
        }
    }
    Ok(turn)
}

/// Seconds to wait from a 429 body (`details[].retryDelay` like `"30s"`).
pub(super) fn retry_delay_secs(body: &str) -> Option<u64> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed["error"]["details"]
        .as_array()?
        .iter()
        .filter_map(|detail| detail["retryDelay"].as_str())
        .find_map(|delay| delay.trim_end_matches('s').parse::<f64>().ok())
        .map(|secs| secs.ceil() as u64)
}
