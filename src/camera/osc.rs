//! HTTP client for the camera's OSC-style command API.
//!
//! Every command is a POST of `{"name": ..., "parameters": ...}` to
//! `/osc/commands/execute`; long-running commands are polled through
//! `/osc/commands/status` with the command id.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::camera::{
    CameraClient, CameraError, CommandState, ConvertHandle, ConvertParams, ConvertStatus,
    FileEntry,
};

/// Entries requested per listing call. The camera keeps at most a few
/// thousand files; one page is enough.
const LIST_ENTRY_COUNT: u32 = 3000;

pub struct OscClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    state: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    results: Option<serde_json::Value>,
    #[serde(default)]
    progress: Option<Progress>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Progress {
    #[serde(default)]
    completion: f64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl OscClient {
    pub fn new(base_url: &str) -> Self {
        OscClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn execute(
        &self,
        name: &str,
        parameters: serde_json::Value,
    ) -> Result<CommandResponse, CameraError> {
        let url = format!("{}/osc/commands/execute", self.base_url);
        let response: CommandResponse = self
            .client
            .post(&url)
            .json(&json!({ "name": name, "parameters": parameters }))
            .send()
            .await?
            .json()
            .await?;
        if let Some(err) = response.error {
            return Err(CameraError::Api {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response)
    }

    fn results(response: CommandResponse, context: &str) -> Result<serde_json::Value, CameraError> {
        response
            .results
            .ok_or_else(|| CameraError::Malformed(format!("{context}: no results")))
    }
}

#[async_trait]
impl CameraClient for OscClient {
    async fn list_files(&self) -> Result<Vec<FileEntry>, CameraError> {
        let response = self
            .execute(
                "camera.listFiles",
                json!({
                    "fileType": "all",
                    "entryCount": LIST_ENTRY_COUNT,
                    "detail": true,
                }),
            )
            .await?;
        let results = Self::results(response, "listFiles")?;
        let entries = results
            .get("entries")
            .cloned()
            .ok_or_else(|| CameraError::Malformed("listFiles: no entries".into()))?;
        serde_json::from_value(entries)
            .map_err(|e| CameraError::Malformed(format!("listFiles entries: {e}")))
    }

    async fn remaining_space(&self) -> Result<u64, CameraError> {
        let response = self
            .execute(
                "camera.getOptions",
                json!({ "optionNames": ["remainingSpace"] }),
            )
            .await?;
        let results = Self::results(response, "getOptions")?;
        results
            .pointer("/options/remainingSpace")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| CameraError::Malformed("getOptions: no remainingSpace".into()))
    }

    async fn battery_level(&self) -> Result<f64, CameraError> {
        let response = self
            .execute(
                "camera.getOptions",
                json!({ "optionNames": ["batteryLevel"] }),
            )
            .await?;
        let results = Self::results(response, "getOptions")?;
        results
            .pointer("/options/batteryLevel")
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| CameraError::Malformed("getOptions: no batteryLevel".into()))
    }

    async fn get_thumbnail(&self, file_url: &str) -> Result<Vec<u8>, CameraError> {
        // Listed file URLs serve a small JPEG when asked for the thumb type.
        let bytes = self
            .client
            .get(file_url)
            .query(&[("type", "thumb")])
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    async fn convert_video(&self, params: &ConvertParams) -> Result<ConvertHandle, CameraError> {
        let response = self
            .execute(
                "camera.convertVideoFormats",
                json!({
                    "fileUrl": params.file_url,
                    "size": params.size.as_str(),
                    "projectionType": ConvertParams::PROJECTION,
                    "codec": ConvertParams::CODEC,
                    "topBottomCorrection": ConvertParams::TOP_BOTTOM_CORRECTION,
                }),
            )
            .await?;
        let id = response
            .id
            .ok_or_else(|| CameraError::Malformed("convertVideoFormats: no command id".into()))?;
        Ok(ConvertHandle { id })
    }

    async fn command_status(&self, handle: &ConvertHandle) -> Result<ConvertStatus, CameraError> {
        let url = format!("{}/osc/commands/status", self.base_url);
        let response: CommandResponse = self
            .client
            .post(&url)
            .json(&json!({ "id": handle.id }))
            .send()
            .await?
            .json()
            .await?;

        let state = match response.state.as_str() {
            "inProgress" => CommandState::InProgress,
            "done" => CommandState::Done,
            "error" => CommandState::Error,
            other => {
                return Err(CameraError::Malformed(format!(
                    "command status: unknown state {other:?}"
                )))
            }
        };
        if state == CommandState::Error {
            if let Some(err) = response.error {
                return Err(CameraError::Api {
                    code: err.code,
                    message: err.message,
                });
            }
        }
        let completion = response.progress.map(|p| p.completion).unwrap_or(0.0);
        let result_url = response
            .results
            .as_ref()
            .and_then(|r| r.get("fileUrl"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        Ok(ConvertStatus {
            state,
            completion,
            result_url,
        })
    }

    async fn cancel_convert(&self) -> Result<(), CameraError> {
        self.execute("camera.cancelVideoConvert", json!({})).await?;
        Ok(())
    }
}
