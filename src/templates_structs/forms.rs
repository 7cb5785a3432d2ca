use askama::Template;

use super::PageContext;
use crate::engine::SubmissionsView;
use crate::engine::provision::StepReport;
use crate::models::form::FormRecord;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub forms: Vec<FormRecord>,
    pub errors: Vec<String>,
    /// Earliest selectable expiry, in the datetime-local input format.
    pub min_expiry: String,
    pub master_configured: bool,
}

#[derive(Template)]
#[template(path = "forms/edit_metadata.html")]
pub struct EditMetadataTemplate {
    pub ctx: PageContext,
    pub form: FormRecord,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "forms/submissions.html")]
pub struct SubmissionsTemplate {
    pub ctx: PageContext,
    pub form: FormRecord,
    pub view: SubmissionsView,
    pub error: Option<String>,
}

/// Per-step outcome of a deletion.
#[derive(Template)]
#[template(path = "forms/deleted.html")]
pub struct DeletedTemplate {
    pub ctx: PageContext,
    pub form_id: String,
    pub steps: Vec<StepReport>,
}
