// handlers/elevated/transfer.rs - Content bundle export/import
//
// GET  /api/admin/export?format=json|yaml  (raw bundle download, not enveloped)
// POST /api/admin/import?format=json|yaml  (raw bundle body)

use axum::{
    extract::{Extension, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::services::transfer::{self, ImportReport, TransferFormat};

#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    pub format: Option<String>,
}

impl FormatQuery {
    fn format(&self) -> Result<TransferFormat, ApiError> {
        self.format.as_deref().unwrap_or("json").parse()
    }
}

pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
) -> Result<Response, ApiError> {
    let format = query.format()?;
    let bundle = transfer::export(state.store.as_ref()).await?;
    let body = transfer::serialize(&bundle, format)?;
    let filename = format!(
        "attachment; filename=\"hhc-content-{}.{}\"",
        bundle.exported_at.unwrap_or_else(chrono::Utc::now).format("%Y%m%d"),
        format.extension()
    );
    Ok((
        [(CONTENT_TYPE, format.content_type().to_string()), (CONTENT_DISPOSITION, filename)],
        body,
    )
        .into_response())
}

pub async fn import(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<FormatQuery>,
    body: String,
) -> ApiResult<ImportReport> {
    let format = query.format()?;
    let bundle = transfer::parse(&body, format)?;
    let report = transfer::import(state.store.as_ref(), user.id, bundle).await?;
    Ok(ApiResponse::success(report))
}
