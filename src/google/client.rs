use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;

use super::{ChoiceQuestion, FormInfo, ServiceError, TokenCache, Workspace, SLOT_QUESTION_TITLE};
use crate::models::submission::{SheetTable, column_letter};

const FORMS_API: &str = "https://forms.googleapis.com/v1/forms";
const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// REST client for Forms v1, Sheets v4 and Drive v3 using the cached identity.
pub struct GoogleWorkspace {
    http: Client,
    tokens: TokenCache,
}

#[derive(Deserialize)]
struct FileId {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FormResource {
    form_id: String,
    #[serde(default)]
    info: Value,
    #[serde(default)]
    linked_sheet_id: Option<String>,
    #[serde(default)]
    items: Vec<Value>,
}

async fn check(service: &'static str, resp: Response) -> Result<Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ServiceError::Status { service, status: status.as_u16(), body })
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Find the first choice question whose title mentions "slot".
fn slot_question(items: &[Value]) -> Option<ChoiceQuestion> {
    items.iter().enumerate().find_map(|(index, item)| {
        let title = item.get("title")?.as_str()?;
        if !title.to_lowercase().contains("slot") {
            return None;
        }
        let question = item.pointer("/questionItem/question")?;
        let choice = question.get("choiceQuestion")?;
        let options = choice
            .get("options")
            .and_then(|o| o.as_array())
            .map(|opts| {
                opts.iter()
                    .filter_map(|o| o.get("value").and_then(|v| v.as_str()).map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Some(ChoiceQuestion {
            item_id: item.get("itemId")?.as_str()?.to_string(),
            question_id: question.get("questionId").and_then(|q| q.as_str()).unwrap_or("").to_string(),
            title: title.to_string(),
            index,
            options,
        })
    })
}

fn options_json(choices: &[String]) -> Vec<Value> {
    choices.iter().map(|c| json!({ "value": c })).collect()
}

impl GoogleWorkspace {
    pub fn new(identity_file: PathBuf) -> Self {
        let http = Client::new();
        Self { tokens: TokenCache::new(identity_file, http.clone()), http }
    }

    async fn batch_update(&self, form_id: &str, requests: Vec<Value>) -> Result<(), ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(format!("{FORMS_API}/{form_id}:batchUpdate"))
            .bearer_auth(token)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        check("forms", resp).await?;
        Ok(())
    }

    async fn first_tab_title(&self, sheet_id: &str, token: &str) -> Result<String, ServiceError> {
        let resp = self
            .http
            .get(format!("{SHEETS_API}/{sheet_id}"))
            .query(&[("fields", "sheets.properties.title")])
            .bearer_auth(token)
            .send()
            .await?;
        let body: Value = check("sheets", resp).await?.json().await?;
        body.pointer("/sheets/0/properties/title")
            .and_then(|t| t.as_str())
            .map(String::from)
            .ok_or_else(|| ServiceError::Unexpected(format!("spreadsheet {sheet_id} has no tabs")))
    }

    /// A1 reference to a whole tab. Quotes inside the title are doubled.
    fn tab_range(tab: &str) -> String {
        format!("'{}'", tab.replace('\'', "''"))
    }

    fn values_url(sheet_id: &str, range: &str) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&format!("{SHEETS_API}/{sheet_id}/values"))
            .map_err(|e| ServiceError::Unexpected(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Unexpected("sheets url cannot be a base".to_string()))?
            .push(range);
        Ok(url)
    }
}

#[async_trait]
impl Workspace for GoogleWorkspace {
    async fn copy_form(&self, master_form_id: &str, name: &str) -> Result<String, ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(format!("{DRIVE_API}/{master_form_id}/copy"))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await?;
        let file: FileId = check("drive", resp).await?.json().await?;
        Ok(file.id)
    }

    async fn create_slot_question(&self, form_id: &str, title: &str, choices: &[String]) -> Result<(), ServiceError> {
        let requests = vec![
            json!({
                "updateFormInfo": {
                    "info": { "title": title },
                    "updateMask": "title"
                }
            }),
            json!({
                "createItem": {
                    "item": {
                        "title": SLOT_QUESTION_TITLE,
                        "questionItem": {
                            "question": {
                                "required": true,
                                "choiceQuestion": {
                                    "type": "RADIO",
                                    "options": options_json(choices),
                                    "shuffle": false
                                }
                            }
                        }
                    },
                    "location": { "index": 0 }
                }
            }),
        ];
        self.batch_update(form_id, requests).await
    }

    async fn get_form(&self, form_id: &str) -> Result<FormInfo, ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .get(format!("{FORMS_API}/{form_id}"))
            .bearer_auth(token)
            .send()
            .await?;
        let form: FormResource = check("forms", resp).await?.json().await?;
        Ok(FormInfo {
            title: form.info.get("title").map(cell_text).unwrap_or_default(),
            linked_sheet_id: form.linked_sheet_id.filter(|s| !s.is_empty()),
            slot_question: slot_question(&form.items),
            form_id: form.form_id,
        })
    }

    async fn set_choices(&self, form_id: &str, question: &ChoiceQuestion, choices: &[String]) -> Result<(), ServiceError> {
        let request = json!({
            "updateItem": {
                "item": {
                    "itemId": question.item_id,
                    "title": question.title,
                    "questionItem": {
                        "question": {
                            "questionId": question.question_id,
                            "required": true,
                            "choiceQuestion": {
                                "type": "RADIO",
                                "options": options_json(choices)
                            }
                        }
                    }
                },
                "location": { "index": question.index },
                "updateMask": "questionItem.question.choiceQuestion.options"
            }
        });
        self.batch_update(form_id, vec![request]).await
    }

    async fn set_accepting_responses(&self, form_id: &str, accepting: bool) -> Result<(), ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(format!("{FORMS_API}/{form_id}:setPublishSettings"))
            .bearer_auth(token)
            .json(&json!({
                "publishSettings": {
                    "publishState": { "isPublished": true, "isAcceptingResponses": accepting }
                },
                "updateMask": "publishState"
            }))
            .send()
            .await?;
        check("forms", resp).await?;
        Ok(())
    }

    async fn read_sheet(&self, sheet_id: &str) -> Result<SheetTable, ServiceError> {
        let token = self.tokens.access_token().await?;
        let tab = self.first_tab_title(sheet_id, &token).await?;
        let url = Self::values_url(sheet_id, &Self::tab_range(&tab))?;
        let resp = self.http.get(url).bearer_auth(token).send().await?;
        let body: Value = check("sheets", resp).await?.json().await?;
        let values = body
            .get("values")
            .and_then(|v| v.as_array())
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(cell_text).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(SheetTable::from_values(values))
    }

    async fn write_cell(&self, sheet_id: &str, row: usize, col: usize, value: &str) -> Result<(), ServiceError> {
        let token = self.tokens.access_token().await?;
        let tab = self.first_tab_title(sheet_id, &token).await?;
        let range = format!("{}!{}{row}", Self::tab_range(&tab), column_letter(col));
        let url = Self::values_url(sheet_id, &range)?;
        let resp = self
            .http
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&json!({ "values": [[value]] }))
            .send()
            .await?;
        check("sheets", resp).await?;
        Ok(())
    }

    async fn upload_pdf(&self, filename: &str, bytes: Vec<u8>) -> Result<String, ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(DRIVE_UPLOAD_API)
            .query(&[("uploadType", "media")])
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()
            .await?;
        let file: FileId = check("drive", resp).await?.json().await?;

        let resp = self
            .http
            .patch(format!("{DRIVE_API}/{}", file.id))
            .bearer_auth(&token)
            .json(&json!({ "name": filename }))
            .send()
            .await?;
        check("drive", resp).await?;
        Ok(file.id)
    }

    async fn share_public(&self, file_id: &str) -> Result<(), ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .post(format!("{DRIVE_API}/{file_id}/permissions"))
            .bearer_auth(token)
            .json(&json!({ "type": "anyone", "role": "reader" }))
            .send()
            .await?;
        check("drive", resp).await?;
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), ServiceError> {
        let token = self.tokens.access_token().await?;
        let resp = self
            .http
            .delete(format!("{DRIVE_API}/{file_id}"))
            .bearer_auth(token)
            .send()
            .await?;
        check("drive", resp).await?;
        Ok(())
    }

    async fn forget_identity(&self) {
        self.tokens.forget().await;
    }
}
