use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::mail::ATTACHMENT_NAME;
use crate::models::{DocumentId, InvoicePayload};
use super::error::ApiResult;
use super::state::ApiState;

/// Render an invoice PDF
pub async fn create_pdf(
    payload: web::Json<InvoicePayload>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let ack = state.workflow.create_pdf(&payload).await?;
    Ok(HttpResponse::Ok().json(ack))
}

/// Render an invoice PDF and email it to `payload.email`
pub async fn send_pdf(
    payload: web::Json<InvoicePayload>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let ack = state.workflow.send_pdf(&payload).await?;
    Ok(HttpResponse::Ok().json(ack))
}

/// Download the most recently rendered invoice
pub async fn fetch_pdf(state: web::Data<ApiState>) -> ApiResult<HttpResponse> {
    let (id, bytes) = state.workflow.fetch_latest().await?;
    Ok(pdf_response(id, bytes))
}

/// Download a rendered invoice by id
pub async fn fetch_pdf_by_id(
    path: web::Path<Uuid>,
    state: web::Data<ApiState>,
) -> ApiResult<HttpResponse> {
    let id = DocumentId::from(path.into_inner());
    let bytes = state.workflow.fetch(id).await?;
    Ok(pdf_response(id, bytes))
}

pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("SERVER IS RUNNING")
}

fn pdf_response(id: DocumentId, bytes: Vec<u8>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Inline,
            parameters: vec![DispositionParam::Filename(ATTACHMENT_NAME.to_string())],
        })
        .insert_header(("X-Document-Id", id.to_string()))
        .body(bytes)
}
