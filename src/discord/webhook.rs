use anyhow::{bail, Context, Result};
use reqwest::blocking::{multipart, Client};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(60);

/// One webhook message with attachments.
pub trait WebhookPoster {
    fn post(&self, content: &str, files: &[PathBuf], username: Option<&str>) -> Result<()>;
}

pub struct WebhookClient {
    url: String,
    client: Client,
}

impl WebhookClient {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("vrckit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// `payload_json` plus one `files[i]` part per attachment.
pub fn build_form(content: &str, files: &[PathBuf], username: Option<&str>) -> Result<multipart::Form> {
    let mut payload = json!({ "content": content });
    if let Some(name) = username {
        payload["username"] = json!(name);
    }

    let mut form = multipart::Form::new().part(
        "payload_json",
        multipart::Part::text(payload.to_string()).mime_str("application/json")?,
    );
    for (i, path) in files.iter().enumerate() {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("file{i}"));
        let part = multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str(mime_for(path))?;
        form = form.part(format!("files[{i}]"), part);
    }
    Ok(form)
}

impl WebhookPoster for WebhookClient {
    fn post(&self, content: &str, files: &[PathBuf], username: Option<&str>) -> Result<()> {
        let form = build_form(content, files, username)?;
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .context("Discord webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("Discord webhook returned {status}: {body}");
        }
        tracing::debug!(%status, files = files.len(), "webhook post accepted");
        Ok(())
    }
}
