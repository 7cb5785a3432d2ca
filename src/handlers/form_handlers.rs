use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde::Deserialize;

use super::dashboard::render_dashboard;
use super::form_body::{decode_pdf_data_uri, get_all, get_field, parse_form_body};
use super::identity_handlers::require_identity;
use crate::auth::session::set_flash;
use crate::auth::{csrf, validate};
use crate::config::Config;
use crate::engine::provision::{NewForm, NotesChange, NotesUpload};
use crate::engine::{Engine, EngineError, PassReport, SubmissionsView, local_now};
use crate::errors::{AppError, render, see_other};
use crate::models::form::parse_slots;
use crate::templates_structs::{DeletedTemplate, EditMetadataTemplate, PageContext, SubmissionsTemplate};

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CancelForm {
    pub contact: String,
    pub csrf_token: String,
}

fn pass_summary(report: &PassReport) -> String {
    let mut parts = vec![format!("{} new response(s) accepted", report.accepted)];
    if report.duplicates > 0 {
        parts.push(format!("{} duplicate(s) flagged", report.duplicates));
    }
    if report.reminders > 0 {
        parts.push(format!("{} reminder(s) sent", report.reminders));
    }
    if report.choices_pushed {
        parts.push("slot choices updated".to_string());
    }
    parts.join(", ")
}

/// Flash the engine outcome; a missing record becomes the "not found" notice.
fn flash_failure(session: &Session, form_id: &str, e: &EngineError) {
    match e {
        EngineError::FormNotFound(_) => set_flash(session, "Form not found."),
        other => {
            log::warn!("Action on form {form_id} failed: {other}");
            set_flash(session, &format!("Error: {other}"));
        }
    }
}

/// Notes upload fields (`notes_pdf` data URI and `notes_filename`), if a file was chosen.
fn notes_from_params(params: &[(String, String)], errors: &mut Vec<String>) -> Option<NotesUpload> {
    let data_uri = get_field(params, "notes_pdf");
    if data_uri.trim().is_empty() {
        return None;
    }
    match decode_pdf_data_uri(data_uri) {
        Ok(bytes) => {
            let filename = match get_field(params, "notes_filename").trim() {
                "" => "notes.pdf".to_string(),
                name => name.to_string(),
            };
            Some(NotesUpload { filename, bytes })
        }
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

pub async fn create(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    body: String,
) -> Result<HttpResponse, AppError> {
    let params = parse_form_body(&body);
    csrf::validate_csrf(&session, get_field(&params, "csrf_token"))?;
    if let Some(redirect) = require_identity(&config, &session) {
        return Ok(redirect);
    }

    let title = get_field(&params, "class_name").trim().to_string();
    let meet_link = get_field(&params, "meet_link").trim().to_string();

    let mut errors: Vec<String> = vec![];
    if config.master_form_id.is_empty() {
        errors.push("No master form is configured (MASTER_FORM_ID)".to_string());
    }
    errors.extend(validate::validate_required(&title, "Class name", 200));
    errors.extend(validate::validate_optional_url(&meet_link, "Meeting link"));
    let slots = match parse_slots(
        &get_all(&params, "slot_name[]"),
        &get_all(&params, "slot_limit[]"),
        &get_all(&params, "slot_date[]"),
    ) {
        Ok(slots) => slots,
        Err(slot_errors) => {
            errors.extend(slot_errors);
            vec![]
        }
    };
    let notes = notes_from_params(&params, &mut errors);

    if !errors.is_empty() {
        return render_dashboard(&config, &engine, &session, errors);
    }

    let new = NewForm { title, slots, meet_link, notes };
    match engine
        .create_form(&config.master_form_id, new, config.form_settle, local_now())
        .await
    {
        Ok(record) => {
            let message = if record.sheet_url.is_empty() {
                format!(
                    "Form '{}' created. Link it to a response sheet, then use Update Sheet URL.",
                    record.title
                )
            } else {
                format!("Form '{}' created.", record.title)
            };
            set_flash(&session, &message);
            Ok(see_other("/dashboard"))
        }
        Err(e @ EngineError::NoOpenSlots) => render_dashboard(&config, &engine, &session, vec![e.to_string()]),
        Err(e) => {
            log::error!("Form creation failed: {e}");
            set_flash(&session, &format!("Could not create form: {e}"));
            Ok(see_other("/dashboard"))
        }
    }
}

pub async fn edit_metadata_page(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let Some(form) = engine.store().find(&form_id)? else {
        set_flash(&session, "Form not found.");
        return Ok(see_other("/dashboard"));
    };
    let ctx = PageContext::build(&session, &config);
    render(EditMetadataTemplate { ctx, form, errors: vec![] })
}

pub async fn edit_metadata_submit(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    path: web::Path<String>,
    body: String,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let params = parse_form_body(&body);
    csrf::validate_csrf(&session, get_field(&params, "csrf_token"))?;
    if let Some(redirect) = require_identity(&config, &session) {
        return Ok(redirect);
    }

    let meet_link = get_field(&params, "meet_link").trim().to_string();
    let mut errors: Vec<String> = vec![];
    errors.extend(validate::validate_optional_url(&meet_link, "Meeting link"));
    let upload = notes_from_params(&params, &mut errors);

    if !errors.is_empty() {
        let Some(form) = engine.store().find(&form_id)? else {
            set_flash(&session, "Form not found.");
            return Ok(see_other("/dashboard"));
        };
        let ctx = PageContext::build(&session, &config);
        return render(EditMetadataTemplate { ctx, form, errors });
    }

    let notes = match upload {
        Some(upload) => NotesChange::Replace(upload),
        None if get_field(&params, "remove_notes") == "on" => NotesChange::Remove,
        None => NotesChange::Keep,
    };

    match engine.edit_metadata(&form_id, &meet_link, notes, local_now()).await {
        Ok((_, Some(report))) => set_flash(
            &session,
            &format!("Metadata updated and slot engine redeployed: {}.", pass_summary(&report)),
        ),
        Ok((_, None)) => set_flash(&session, "Metadata updated."),
        Err(e) => flash_failure(&session, &form_id, &e),
    }
    Ok(see_other("/dashboard"))
}

pub async fn submissions(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    if let Some(redirect) = require_identity(&config, &session) {
        return Ok(redirect);
    }
    let form_id = path.into_inner();
    let Some(form) = engine.store().find(&form_id)? else {
        set_flash(&session, "Form not found.");
        return Ok(see_other("/dashboard"));
    };

    let (view, error) = match engine.submissions(&form).await {
        Ok(view) => (view, None),
        Err(e) => {
            log::warn!("Reading submissions of {form_id} failed: {e}");
            (SubmissionsView::default(), Some(e.to_string()))
        }
    };
    // The lookup above may have recorded the sheet URL.
    let form = engine.store().find(&form_id)?.unwrap_or(form);
    let ctx = PageContext::build(&session, &config);
    render(SubmissionsTemplate { ctx, form, view, error })
}

pub async fn deploy(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    if let Some(redirect) = require_identity(&config, &session) {
        return Ok(redirect);
    }
    let form_id = path.into_inner();
    match engine.deploy(&form_id, local_now()).await {
        Ok(report) => set_flash(&session, &format!("Slot engine deployed: {}.", pass_summary(&report))),
        Err(e) => flash_failure(&session, &form_id, &e),
    }
    Ok(see_other("/dashboard"))
}

pub async fn refresh(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    if let Some(redirect) = require_identity(&config, &session) {
        return Ok(redirect);
    }
    let form_id = path.into_inner();
    match engine.refresh(&form_id, local_now()).await {
        Ok(report) => set_flash(&session, &format!("Slots refreshed: {}.", pass_summary(&report))),
        Err(e) => flash_failure(&session, &form_id, &e),
    }
    Ok(see_other("/dashboard"))
}

pub async fn cancel(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<CancelForm>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    if let Some(redirect) = require_identity(&config, &session) {
        return Ok(redirect);
    }
    let form_id = path.into_inner();
    let back = format!("/forms/{form_id}/submissions");

    let contact = form.contact.trim();
    if contact.is_empty() {
        set_flash(&session, "Enter the phone number or email of the booking to cancel.");
        return Ok(see_other(&back));
    }

    match engine.cancel_booking(&form_id, contact, local_now()).await {
        Ok(outcome) => set_flash(&session, &outcome.message(contact)),
        Err(e) => flash_failure(&session, &form_id, &e),
    }
    Ok(see_other(&back))
}

pub async fn update_sheet_url(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    if let Some(redirect) = require_identity(&config, &session) {
        return Ok(redirect);
    }
    let form_id = path.into_inner();
    match engine.update_sheet_url(&form_id).await {
        Ok(url) => set_flash(&session, &format!("Sheet URL updated: {url}")),
        Err(e) => flash_failure(&session, &form_id, &e),
    }
    Ok(see_other("/dashboard"))
}

pub async fn delete(
    config: web::Data<Config>,
    engine: web::Data<Engine>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    if let Some(redirect) = require_identity(&config, &session) {
        return Ok(redirect);
    }
    let form_id = path.into_inner();
    let steps = engine.delete_form(&form_id).await;
    let ctx = PageContext::build(&session, &config);
    render(DeletedTemplate { ctx, form_id, steps })
}
