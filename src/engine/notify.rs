use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::config::GatewayConfig;
use crate::google::ServiceError;
use crate::models::form::FormRecord;

const NOTES_FILENAME: &str = "notes.pdf";

/// What a reminder carries, chosen from the enrichments the form has.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Template message with the notes PDF attached and the meeting link as parameter.
    Document { template: String, notes_url: String, meet_link: String },
    Text(String),
}

impl Message {
    pub fn for_form(form: &FormRecord, gateway: &GatewayConfig) -> Self {
        let meet = form.meet_link.trim();
        let notes = form.notes_url.trim();
        match (meet.is_empty(), notes.is_empty()) {
            (false, false) => Message::Document {
                template: gateway.template.clone(),
                notes_url: notes.to_string(),
                meet_link: meet.to_string(),
            },
            (false, true) => Message::Text(format!("meet {meet}")),
            _ => Message::Text(gateway.placeholder_text.clone()),
        }
    }
}

/// One outbound reminder.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    pub recipient: String,
    pub message: Message,
}

impl GatewayRequest {
    pub fn url(&self, gateway: &GatewayConfig) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&gateway.url)
            .map_err(|e| ServiceError::Unexpected(format!("bad gateway url: {e}")))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("user", &gateway.user)
                .append_pair("pass", &gateway.pass)
                .append_pair("sender", &gateway.sender)
                .append_pair("phone", &self.recipient)
                .append_pair("priority", &gateway.priority)
                .append_pair("stype", "normal");
            match &self.message {
                Message::Document { template, notes_url, meet_link } => {
                    q.append_pair("text", template)
                        .append_pair("htype", "document")
                        .append_pair("fname", NOTES_FILENAME)
                        .append_pair("url", notes_url)
                        .append_pair("Params", meet_link);
                }
                Message::Text(text) => {
                    q.append_pair("text", text);
                }
            }
        }
        Ok(url)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, request: &GatewayRequest) -> Result<(), ServiceError>;
}

/// Sends reminders as GET requests to the messaging gateway.
pub struct HttpNotifier {
    http: Client,
    gateway: GatewayConfig,
}

impl HttpNotifier {
    pub fn new(gateway: GatewayConfig) -> Self {
        Self { http: Client::new(), gateway }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, request: &GatewayRequest) -> Result<(), ServiceError> {
        let url = request.url(&self.gateway)?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Status { service: "gateway", status: status.as_u16(), body });
        }
        Ok(())
    }
}
