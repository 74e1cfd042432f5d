use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};

use crate::errors::AppError;
use crate::handlers::{authorize, require_password, AppState};
use crate::models::response::ApiResponse;
use crate::store::StorageError;
use crate::utils::range::parse_range;

/// GET /api/files/{id}: serves the object whole (200) or the requested
/// single byte range (206).
pub async fn get_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    file_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let file_id = file_id.into_inner();

    let stored = state
        .folders
        .get_file(&file_id)
        .await
        .map_err(|err| AppError::storage("Failed to get file", err))?
        .ok_or_else(|| {
            log::warn!("File metadata for {} not found", file_id);
            AppError::NotFound("File not found".to_string())
        })?;
    let record = &stored.record;
    let size = record.size;

    let range = match req.headers().get(header::RANGE) {
        None => None,
        Some(value) => {
            let value = value.to_str().unwrap_or_default();
            match parse_range(value, size) {
                Ok(range) => Some(range),
                Err(_) => {
                    log::warn!("Unsatisfiable range {:?} for file {} ({} bytes)", value, file_id, size);
                    return Err(AppError::RangeNotSatisfiable(size));
                }
            }
        }
    };

    let body = match state.objects.get(&stored.key, range).await {
        Ok(Some(body)) => body,
        Ok(None) => {
            log::error!("File {} has metadata but no object at {}", file_id, stored.key);
            return Err(AppError::NotFound("File not found".to_string()));
        }
        Err(StorageError::RangeNotSatisfiable) => {
            log::warn!("Object store rejected range for file {}", file_id);
            return Err(AppError::RangeNotSatisfiable(size));
        }
        Err(err) => return Err(AppError::storage("Failed to get file", err)),
    };

    let mut response = match range {
        Some(range) => {
            let mut builder = HttpResponse::PartialContent();
            builder
                .insert_header((header::CONTENT_RANGE, range.content_range(size)))
                .insert_header((header::CONTENT_LENGTH, body.len().to_string()));
            builder
        }
        None => HttpResponse::Ok(),
    };

    log::info!("Serving file {} ({:?} of {} bytes)", record.name, range, size);
    Ok(response
        .insert_header((header::CONTENT_TYPE, record.mime_type.as_str()))
        .insert_header(ContentDisposition {
            disposition: DispositionType::Inline,
            parameters: vec![DispositionParam::Filename(record.name.clone())],
        })
        .insert_header((header::CACHE_CONTROL, "public, max-age=3600"))
        .insert_header((header::ACCEPT_RANGES, "bytes"))
        .body(body))
}

/// DELETE /api/files/{id}: requires the owning folder's password.
pub async fn delete_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    file_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let file_id = file_id.into_inner();
    let password = require_password(&req, "file deletion")?;

    let stored = state
        .folders
        .get_file(&file_id)
        .await
        .map_err(|err| AppError::storage("Failed to delete file", err))?
        .ok_or_else(|| {
            log::warn!("File metadata for {} not found for deletion", file_id);
            AppError::NotFound("File not found".to_string())
        })?;
    let folder_id = stored.record.folder_id.clone();

    let folder = state
        .folders
        .get_folder(&folder_id)
        .await
        .map_err(|err| AppError::storage("Failed to delete file", err))?
        .ok_or_else(|| {
            log::warn!("Folder {} of file {} not found", folder_id, file_id);
            AppError::NotFound("Folder not found".to_string())
        })?;
    authorize(&state, &folder, password).await?;

    state
        .objects
        .delete(&stored.key)
        .await
        .map_err(|err| AppError::storage("Failed to delete file", err))?;
    log::debug!("Deleted object {} of file {}", stored.key, file_id);

    state
        .folders
        .remove_file(&folder_id, &file_id)
        .await
        .map_err(|err| AppError::storage("Failed to delete file", err))?;

    log::info!("File {} deleted from folder {}", file_id, folder_id);
    Ok(HttpResponse::Ok().json(ApiResponse::empty()))
}
