pub mod file;
pub mod folder;

use std::sync::Arc;

use actix_web::error::JsonPayloadError;
use actix_web::{web, HttpRequest};

use crate::errors::AppError;
use crate::models::folder::Folder;
use crate::repository::FolderRepository;
use crate::store::ObjectStore;
use crate::utils::password::bearer_password;
use crate::utils::password_cache::PasswordCache;

pub struct AppState {
    pub folders: FolderRepository,
    pub objects: Arc<dyn ObjectStore>,
    pub password_cache: PasswordCache,
    pub max_upload_bytes: usize,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
    .service(
        web::resource("/api/folders")
            .route(web::get().to(folder::list_folders)),
    )
    .service(
        web::resource("/api/folders/create")
            .route(web::post().to(folder::create_folder)),
    )
    .service(
        web::resource("/api/folders/{id}")
            .route(web::get().to(folder::get_folder)),
    )
    .service(
        web::resource("/api/folders/{id}/upload")
            .route(web::post().to(folder::upload_file)),
    )
    .service(
        web::resource("/api/files/{id}")
            .route(web::get().to(file::get_file))
            .route(web::delete().to(file::delete_file)),
    );
}

/// Body parse failures answer with the same JSON envelope as handler errors.
fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::warn!("{} {} - rejected body: {}", req.method(), req.path(), err);
    AppError::BadRequest(format!("Invalid request body: {}", err)).into()
}

pub(crate) fn require_password(req: &HttpRequest, action: &str) -> Result<String, AppError> {
    bearer_password(req).ok_or_else(|| {
        log::warn!("{} {} - {}: no password provided", req.method(), req.path(), action);
        AppError::Unauthorized("Unauthorized".to_string())
    })
}

/// Checks the password against the folder hash off the async executor.
pub(crate) async fn authorize(
    state: &web::Data<AppState>,
    folder: &Folder,
    password: String,
) -> Result<(), AppError> {
    let hash = folder.password_hash.clone();
    let state = state.clone();
    let is_valid = web::block(move || state.password_cache.verify(&password, &hash))
        .await
        .map_err(|err| AppError::internal("Password check was cancelled", err))?
        .map_err(|err| AppError::internal("Failed to verify password", err))?;

    if is_valid {
        Ok(())
    } else {
        log::warn!("Invalid password for folder {}", folder.id);
        Err(AppError::Unauthorized("Invalid password".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::store::{MemoryKvStore, MemoryObjectStore};
    use std::time::Duration;

    pub struct Harness {
        pub state: web::Data<AppState>,
        pub objects: Arc<MemoryObjectStore>,
    }

    pub fn harness() -> Harness {
        let objects = Arc::new(MemoryObjectStore::new());
        let state = web::Data::new(AppState {
            folders: FolderRepository::new(Arc::new(MemoryKvStore::new())),
            objects: objects.clone(),
            password_cache: PasswordCache::new(Duration::from_secs(300), 100),
            max_upload_bytes: 4096,
        });
        Harness { state, objects }
    }

    /// Stores a folder directly, skipping the create endpoint.
    pub async fn seed_folder(state: &web::Data<AppState>, name: &str, password: &str) -> String {
        let now = chrono::Utc::now();
        let folder = Folder {
            id: crate::handlers::folder::generate_id(),
            name: name.to_string(),
            password_hash: crate::utils::password::hash_password(password).unwrap(),
            created_at: now,
            updated_at: now,
        };
        state.folders.create_folder(&folder).await.unwrap();
        folder.id
    }

    pub const BOUNDARY: &str = "----folder-share-test-boundary";

    /// A `multipart/form-data` body with a single part.
    pub fn multipart_body(field: &str, filename: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n", field, filename).as_bytes(),
        );
        if let Some(content_type) = content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub fn multipart_content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }
}
