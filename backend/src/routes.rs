use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use log::info;
use shared::DamageReport;

use crate::auth::CsrfService;
use crate::classify::ModelRegistry;
use crate::error::AppError;
use crate::inspection::inspect;
use crate::storage::UploadStore;
use crate::views;

const PHOTO_FIELD: &str = "photo";
const CSRF_FIELD: &str = "csrf_token";
const UPLOADS_URL: &str = "/uploads";

/// Everything the handlers share, built once in `main`.
#[derive(Clone)]
pub struct AppServices {
    pub models: ModelRegistry,
    pub store: UploadStore,
    pub csrf: CsrfService,
    pub max_upload_bytes: usize,
}

#[derive(Clone, Copy)]
struct UploadLimit(usize);

pub fn configure_routes(cfg: &mut web::ServiceConfig, services: &AppServices) {
    cfg.app_data(web::Data::new(services.models.clone()))
        .app_data(web::Data::new(services.store.clone()))
        .app_data(web::Data::new(services.csrf.clone()))
        .app_data(web::Data::new(UploadLimit(services.max_upload_bytes)))
        .service(
            web::resource("/")
                .route(web::get().to(upload_form))
                .route(web::post().to(upload_files)),
        )
        .service(web::resource("/manage").route(web::get().to(manage_files)))
        .service(web::resource("/open/{filename}").route(web::get().to(open_file)))
        .service(web::resource("/api/open/{filename}").route(web::get().to(open_file_json)))
        .service(web::resource("/delete/{filename}").route(web::get().to(delete_file)))
        .service(Files::new(UPLOADS_URL, services.store.root()));
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

async fn upload_form(csrf: web::Data<CsrfService>) -> Result<HttpResponse, AppError> {
    let token = csrf.generate_token()?;
    Ok(html(views::index_page(&token, None, &[])))
}

struct UploadedPhoto {
    file_name: String,
    data: Vec<u8>,
}

async fn upload_files(
    store: web::Data<UploadStore>,
    csrf: web::Data<CsrfService>,
    limit: web::Data<UploadLimit>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let mut csrf_token: Option<String> = None;
    let mut photos: Vec<UploadedPhoto> = Vec::new();
    let mut received = 0usize;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Multipart(e.to_string()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or_default()
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::Multipart(e.to_string()))?
        {
            received += chunk.len();
            if received > limit.0 {
                return Err(AppError::PayloadTooLarge { limit: limit.0 });
            }
            data.extend_from_slice(&chunk);
        }

        match field_name.as_str() {
            CSRF_FIELD => csrf_token = Some(String::from_utf8_lossy(&data).into_owned()),
            // An empty file input still submits a nameless, empty part.
            PHOTO_FIELD if !(file_name.is_empty() && data.is_empty()) => {
                photos.push(UploadedPhoto { file_name, data })
            }
            _ => {}
        }
    }

    let mut errors = Vec::new();
    if let Err(e) = csrf.verify_token(csrf_token.as_deref()) {
        errors.push(e.to_string());
    }
    if photos.is_empty() {
        errors.push("Choose a file!".to_string());
    } else if photos
        .iter()
        .any(|photo| !UploadStore::is_allowed_image(&photo.file_name))
    {
        errors.push("Image Only!".to_string());
    }

    let success = errors.is_empty();
    if success {
        let items: Vec<&[u8]> = photos.iter().map(|photo| photo.data.as_slice()).collect();
        let names = store.save_batch(&items).await?;
        for (photo, name) in photos.iter().zip(&names) {
            info!(
                "Stored upload {} as {} ({} bytes)",
                photo.file_name,
                name,
                photo.data.len()
            );
        }
    } else {
        info!("Upload rejected: {:?}", errors);
    }

    let token = csrf.generate_token()?;
    Ok(html(views::index_page(&token, Some(success), &errors)))
}

async fn manage_files(store: web::Data<UploadStore>) -> Result<HttpResponse, AppError> {
    let files = store.list().await?;
    Ok(html(views::manage_page(&files)))
}

async fn run_inspection(
    models: web::Data<ModelRegistry>,
    store: &UploadStore,
    file_name: String,
) -> Result<DamageReport, AppError> {
    let bytes = store.read(&file_name).await?;
    let file_url = format!("{}/{}", UPLOADS_URL, urlencoding::encode(&file_name));
    let report = web::block(move || inspect(&models, &file_name, file_url, &bytes))
        .await
        .map_err(|e| AppError::Blocking(e.to_string()))??;
    Ok(report)
}

async fn open_file(
    models: web::Data<ModelRegistry>,
    store: web::Data<UploadStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let report = run_inspection(models, &store, path.into_inner()).await?;
    Ok(html(views::result_page(&report)))
}

async fn open_file_json(
    models: web::Data<ModelRegistry>,
    store: web::Data<UploadStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let report = run_inspection(models, &store, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}

async fn delete_file(
    store: web::Data<UploadStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let file_name = path.into_inner();
    store.delete(&file_name).await?;
    info!("Deleted upload {}", file_name);
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/manage"))
        .finish())
}
