//! HTTP implementation of the backend
//!
//! Error envelope: the backend's endpoints disagree on where they put error
//! text (`error`, `mensaje`, `message`, `response`, or a bare body). Every
//! non-2xx response goes through [`error_text`], which takes the first
//! non-empty string among those JSON fields, then a plain-text body, then
//! `HTTP <status>`.

use super::{
    Backend, BackendError, ChatRequest, DocumentFile, ExportRequest, ExportedDocument,
    PatientSummary, UploadResult, UNKNOWN_PATIENT_ID,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const CHAT_PATH: &str = "/chat";
const UPLOAD_PATH: &str = "/procesar";
const EXPORT_PATH: &str = "/export_chat_response_pdf";
const PATIENTS_PATH: &str = "/patients";
const SWITCH_PATIENT_PATH: &str = "/switch_patient";
const RESET_CONTEXT_PATH: &str = "/reset_context";

/// Multipart field the upload endpoint reads the file from
const UPLOAD_FIELD: &str = "documento";

/// JSON fields that may carry error text, in lookup order
const ERROR_FIELDS: &[&str] = &["error", "mensaje", "message", "response"];

/// Longest plain-text error body surfaced to the user
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Backend reached over HTTP
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    /// `timeout` of `None` leaves requests unbounded
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_body(response: Response) -> Result<(StatusCode, String), BackendError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::transport(format!("Failed to read response: {e}")))?;
        Ok((status, body))
    }
}

fn send_error(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::transport(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        BackendError::transport(format!("Connection failed: {e}"))
    } else {
        BackendError::transport(format!("Request failed: {e}"))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url(CHAT_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let (status, body) = Self::read_body(response).await?;
        decode_chat(status, &body)
    }

    async fn upload(&self, file: &DocumentFile) -> Result<UploadResult, BackendError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type())
            .map_err(|e| BackendError::transport(format!("Invalid content type: {e}")))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(self.url(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let (status, body) = Self::read_body(response).await?;
        decode_upload(status, &body)
    }

    async fn export(&self, request: &ExportRequest) -> Result<ExportedDocument, BackendError> {
        let response = self
            .client
            .post(self.url(EXPORT_PATH))
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let (status, body) = Self::read_body(response).await?;
            return Err(rejected(status, &body));
        }

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(default_export_file_name);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::transport(format!("Failed to read document: {e}")))?;

        Ok(ExportedDocument {
            file_name,
            bytes: bytes.to_vec(),
        })
    }

    async fn list_patients(&self) -> Result<Vec<PatientSummary>, BackendError> {
        let response = self
            .client
            .get(self.url(PATIENTS_PATH))
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let (status, body) = Self::read_body(response).await?;
        decode_patients(status, &body)
    }

    async fn switch_patient(&self, patient_id: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url(SWITCH_PATIENT_PATH))
            .json(&serde_json::json!({ "patient_id": patient_id }))
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let (status, body) = Self::read_body(response).await?;
        decode_confirmation(status, &body, "message")
            .map(|text| text.unwrap_or_else(|| format!("Context switched to patient {patient_id}.")))
    }

    async fn reset_context(&self) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url(RESET_CONTEXT_PATH))
            .send()
            .await
            .map_err(|e| send_error(&e))?;

        let (status, body) = Self::read_body(response).await?;
        decode_confirmation(status, &body, "response")
            .map(|text| text.unwrap_or_else(|| "Patient context reset.".to_string()))
    }
}

// ============================================================================
// Response decoding
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChatReply {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadReply {
    mensaje: String,
    analisis_nlp: String,
    #[serde(default)]
    patient_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PatientsReply {
    patients: Vec<PatientSummary>,
}

/// Canonical error text for a non-2xx response
pub fn error_text(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => ERROR_FIELDS
            .iter()
            .filter_map(|field| map.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|text| !text.is_empty())
            .map_or_else(|| format!("HTTP {status}"), str::to_string),
        _ => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
            }
        }
    }
}

fn rejected(status: StatusCode, body: &str) -> BackendError {
    BackendError::rejected(status.as_u16(), error_text(status, body))
}

pub fn decode_chat(status: StatusCode, body: &str) -> Result<String, BackendError> {
    if !status.is_success() {
        return Err(rejected(status, body));
    }
    match serde_json::from_str::<ChatReply>(body) {
        Ok(ChatReply {
            response: Some(text),
        }) => Ok(text),
        Ok(ChatReply { response: None }) => {
            Err(BackendError::malformed("Chat response has no `response` field"))
        }
        Err(e) => Err(BackendError::malformed(format!("Failed to parse chat response: {e}"))),
    }
}

pub fn decode_upload(status: StatusCode, body: &str) -> Result<UploadResult, BackendError> {
    if !status.is_success() {
        return Err(rejected(status, body));
    }
    let reply: UploadReply = serde_json::from_str(body)
        .map_err(|e| BackendError::malformed(format!("Failed to parse upload response: {e}")))?;

    Ok(UploadResult {
        summary_text: reply.mensaje,
        analysis_text: reply.analisis_nlp,
        bound_record_id: reply.patient_id.as_ref().and_then(record_id),
    })
}

/// Usable patient id from the upload response, if any
fn record_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() || id == UNKNOWN_PATIENT_ID {
        None
    } else {
        Some(id)
    }
}

pub fn decode_patients(status: StatusCode, body: &str) -> Result<Vec<PatientSummary>, BackendError> {
    if !status.is_success() {
        return Err(rejected(status, body));
    }
    serde_json::from_str::<PatientsReply>(body)
        .map(|reply| reply.patients)
        .map_err(|e| BackendError::malformed(format!("Failed to parse patient list: {e}")))
}

/// Confirmation text under `field`, or `None` when the server sent none
fn decode_confirmation(
    status: StatusCode,
    body: &str,
    field: &str,
) -> Result<Option<String>, BackendError> {
    if !status.is_success() {
        return Err(rejected(status, body));
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|e| BackendError::malformed(format!("Failed to parse response: {e}")))?;
    Ok(value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string))
}

/// File name from a `Content-Disposition` header value.
///
/// A decodable `filename*` (RFC 5987) wins over a plain `filename`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for param in split_header_params(header) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("filename") {
            plain = Some(unquote(value.trim())).filter(|name| !name.is_empty());
        } else if key.eq_ignore_ascii_case("filename*") {
            extended = decode_extended_value(value.trim());
        }
    }
    extended.or(plain)
}

/// Split on `;` outside quoted strings
fn split_header_params(header: &str) -> impl Iterator<Item = &str> {
    let mut in_quotes = false;
    let mut escaped = false;
    header.split(move |c: char| {
        if escaped {
            escaped = false;
            return false;
        }
        match c {
            '\\' if in_quotes => {
                escaped = true;
                false
            }
            '"' => {
                in_quotes = !in_quotes;
                false
            }
            ';' => !in_quotes,
            _ => false,
        }
    })
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}

/// `charset'lang'percent-encoded`; only UTF-8 and US-ASCII are accepted
fn decode_extended_value(value: &str) -> Option<String> {
    let (charset, rest) = value.split_once('\'')?;
    let (_lang, encoded) = rest.split_once('\'')?;
    if !(charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("us-ascii")) {
        return None;
    }
    urlencoding::decode(encoded)
        .ok()
        .map(std::borrow::Cow::into_owned)
        .filter(|name| !name.is_empty())
}

pub fn default_export_file_name() -> String {
    format!(
        "informe_medico_{}.pdf",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}
