use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::{authorize, require_password, AppState};
use crate::models::file::{FileRecord, StoredFile};
use crate::models::folder::{Folder, FolderView};
use crate::models::response::ApiResponse;
use crate::utils;
use crate::utils::password::MIN_PASSWORD_LENGTH;

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Deserialize, Validate)]
pub struct NewFolder {
    #[serde(default)]
    #[validate(length(min = 1, max = 128, message = "Name and password required"))]
    name: String,
    #[serde(default)]
    #[validate(custom = "validate_password")]
    password: String,
}

fn validate_password(password: &str) -> Result<(), validator::ValidationError> {
    if !utils::password::validate_password(password) {
        let mut err = validator::ValidationError::new("password_too_short");
        err.message = Some(format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH).into());
        return Err(err);
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedFolder {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct FolderContents {
    pub folder: FolderView,
    pub files: Vec<FileRecord>,
}

pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

pub async fn list_folders(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let folders = state
        .folders
        .list_folders()
        .await
        .map_err(|err| AppError::storage("Failed to get folders", err))?;

    log::info!("Retrieved {} folders", folders.len());
    Ok(HttpResponse::Ok().json(ApiResponse::ok(folders)))
}

pub async fn create_folder(
    state: web::Data<AppState>,
    new_folder: web::Json<NewFolder>,
) -> Result<HttpResponse, AppError> {
    let new_folder = new_folder.into_inner();
    if new_folder.name.trim().is_empty() || new_folder.password.is_empty() {
        log::warn!("Missing required fields for folder creation");
        return Err(AppError::BadRequest("Name and password required".to_string()));
    }
    utils::validation::validate_payload(&new_folder)?;

    let password = new_folder.password;
    let password_hash = web::block(move || utils::password::hash_password(&password))
        .await
        .map_err(|err| AppError::internal("Failed to create folder", err))?
        .map_err(|err| AppError::internal("Failed to create folder", err))?;

    let now = Utc::now();
    let folder = Folder {
        id: generate_id(),
        name: new_folder.name,
        password_hash,
        created_at: now,
        updated_at: now,
    };

    state
        .folders
        .create_folder(&folder)
        .await
        .map_err(|err| AppError::storage("Failed to create folder", err))?;

    log::info!("Folder '{}' created as {}", folder.name, folder.id);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(CreatedFolder {
        id: folder.id,
        name: folder.name,
    })))
}

async fn load_folder(state: &web::Data<AppState>, folder_id: &str, context: &str) -> Result<Folder, AppError> {
    state
        .folders
        .get_folder(folder_id)
        .await
        .map_err(|err| AppError::storage(context, err))?
        .ok_or_else(|| {
            log::warn!("Folder {} not found", folder_id);
            AppError::NotFound("Folder not found".to_string())
        })
}

pub async fn get_folder(
    req: HttpRequest,
    state: web::Data<AppState>,
    folder_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let folder_id = folder_id.into_inner();
    let password = require_password(&req, "folder access")?;

    let folder = load_folder(&state, &folder_id, "Failed to get folder").await?;
    authorize(&state, &folder, password).await?;

    let files = state
        .folders
        .list_files(&folder_id)
        .await
        .map_err(|err| AppError::storage("Failed to get folder", err))?;

    log::info!("Folder {} retrieved with {} files", folder_id, files.len());
    Ok(HttpResponse::Ok().json(ApiResponse::ok(FolderContents {
        folder: FolderView::from(&folder),
        files,
    })))
}

struct UploadedFile {
    name: String,
    content_type: Option<String>,
    data: web::BytesMut,
}

async fn read_file_field(mut field: Field, limit: usize) -> Result<UploadedFile, AppError> {
    let name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .map(str::to_string)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let content_type = field
        .content_type()
        .map(|mime| mime.essence_str().to_string())
        .filter(|mime| mime != FALLBACK_MIME);

    let mut data = web::BytesMut::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|err| AppError::BadRequest(format!("Malformed upload: {}", err)))?;
        if data.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(format!("File exceeds the {} byte upload limit", limit)));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(UploadedFile { name, content_type, data })
}

pub async fn upload_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    folder_id: web::Path<String>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let folder_id = folder_id.into_inner();
    let password = require_password(&req, "upload")?;

    let folder = load_folder(&state, &folder_id, "Failed to upload file").await?;
    authorize(&state, &folder, password).await?;

    let mut upload = None;
    while let Some(field) = payload.next().await {
        let field = field.map_err(|err| AppError::BadRequest(format!("Malformed upload: {}", err)))?;
        if field.name() == Some("file") {
            upload = Some(read_file_field(field, state.max_upload_bytes).await?);
            break;
        }
    }
    let upload = upload.ok_or_else(|| {
        log::warn!("No file provided in upload to folder {}", folder_id);
        AppError::BadRequest("No file provided".to_string())
    })?;

    let mime_type = upload
        .content_type
        .or_else(|| infer::get(&upload.data).map(|kind| kind.mime_type().to_string()))
        .unwrap_or_else(|| FALLBACK_MIME.to_string());

    let file_id = generate_id();
    let key = format!("{}/{}-{}", folder_id, file_id, upload.name);
    let size = upload.data.len() as u64;
    log::debug!("Uploading {} ({} bytes) to folder {} as {}", upload.name, size, folder_id, file_id);

    state
        .objects
        .put(&key, upload.data.freeze(), &mime_type)
        .await
        .map_err(|err| AppError::storage("Failed to upload file", err))?;

    let record = FileRecord {
        id: file_id.clone(),
        folder_id: folder_id.clone(),
        name: upload.name,
        size,
        mime_type,
        url: FileRecord::download_url(&file_id),
        created_at: Utc::now(),
    };
    let stored = StoredFile { record: record.clone(), key };

    if let Err(err) = state.folders.add_file(&stored).await {
        // Don't leave an orphaned object behind.
        if let Err(cleanup) = state.objects.delete(&stored.key).await {
            log::error!("Failed to remove orphaned object {}: {}", stored.key, cleanup);
        }
        return Err(AppError::storage("Failed to upload file", err));
    }

    log::info!("File '{}' uploaded to folder {}", record.name, folder_id);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(record)))
}
