use std::sync::Arc;

use {
    axum::{Extension, Json, extract::{Multipart, State}},
    tracing::info,
};

use crate::{
    auth::CurrentAgent,
    error::{ApiError, ApiResult},
    state::GatewayState,
};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// file extension for an allowed image MIME type.
fn image_extension(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// `POST /api/uploads` — accept one image part, store it under a generated
/// name, and return the `/uploads/...` reference the chat reply endpoint
/// understands.
pub async fn upload_image(
    State(state): State<Arc<GatewayState>>,
    Extension(agent): Extension<CurrentAgent>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
        .ok_or_else(|| ApiError::BadRequest("missing file part".to_string()))?;

    let mime = field
        .content_type()
        .ok_or_else(|| ApiError::BadRequest("missing content type".to_string()))?
        .to_string();
    let ext = image_extension(&mime)
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported image type: {mime}")))?;

    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::BadRequest("file exceeds 5MB limit".to_string()));
    }
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("empty file".to_string()));
    }

    let filename = format!("upload-{}.{ext}", uuid::Uuid::new_v4());
    tokio::fs::create_dir_all(&state.uploads_dir)
        .await
        .map_err(|e| ApiError::Internal(Box::new(e)))?;
    tokio::fs::write(state.uploads_dir.join(&filename), &bytes)
        .await
        .map_err(|e| ApiError::Internal(Box::new(e)))?;

    info!(
        agent_id = %agent.0.id,
        filename,
        size = bytes.len(),
        "image uploaded"
    );
    Ok(Json(serde_json::json!({ "url": format!("/uploads/{filename}") })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list() {
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("image/webp"), Some("webp"));
        assert_eq!(image_extension("image/svg+xml"), None);
        assert_eq!(image_extension("application/pdf"), None);
    }
}
