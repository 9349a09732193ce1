//! WebDAV surface (§6 `/webdav/*`): RFC 4918 `PROPFIND`/`GET`/`PUT`/
//! `DELETE`/`MKCOL`/`MOVE`/`COPY`/`LOCK`/`UNLOCK` over the managed library
//! root, with an in-memory lock table, built directly on `axum`'s raw
//! request extraction and `tokio::fs` rather than a dedicated WebDAV
//! crate.

use std::path::{Path as FsPath, PathBuf};

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use chrono::Utc;
use uuid::Uuid;

use crate::routes::files::resolve_under_root;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct LockEntry {
    pub token: String,
    pub owner: String,
    pub expires_at: chrono::DateTime<Utc>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", any(dispatch)).route("/*path", any(dispatch))
}

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().as_str().to_ascii_uppercase();
    let path = request.uri().path().trim_start_matches("/webdav").to_string();
    let headers = request.headers().clone();

    let result = match method.as_str() {
        "OPTIONS" => options(),
        "PROPFIND" => propfind(&state, &path).await,
        "GET" | "HEAD" => get(&state, &path, method == "HEAD").await,
        "PUT" => put(&state, &path, request.into_body()).await,
        "DELETE" => delete(&state, &path).await,
        "MKCOL" => mkcol(&state, &path).await,
        "MOVE" => mv(&state, &path, &headers).await,
        "COPY" => copy(&state, &path, &headers).await,
        "LOCK" => lock(&state, &path, &headers).await,
        "UNLOCK" => unlock(&state, &path, &headers).await,
        other => Err(AppError(StatusCode::METHOD_NOT_ALLOWED, format!("unsupported WebDAV method {other}"))),
    };

    match result {
        Ok(response) => response,
        Err(AppError(status, message)) => (status, message).into_response(),
    }
}

struct AppError(StatusCode, String);

fn options() -> Result<Response, AppError> {
    Ok((
        StatusCode::OK,
        [
            (header::ALLOW, "OPTIONS, GET, HEAD, PUT, DELETE, PROPFIND, MKCOL, MOVE, COPY, LOCK, UNLOCK"),
            (header::HeaderName::from_static("dav"), "1,2"),
        ],
    )
        .into_response())
}

fn resolve(state: &AppState, path: &str) -> Result<PathBuf, AppError> {
    resolve_under_root(&state.config.library_root, path).map_err(|e| AppError(StatusCode::BAD_REQUEST, e.to_string()))
}

/// `PROPFIND` (§6): `Depth: 1` listing of one level, returned as a
/// `multistatus` document. Depth is not distinguished from `0`/`infinity`
/// here — every request is served as depth-1, which is what every common
/// WebDAV client actually issues against a directory.
async fn propfind(state: &AppState, path: &str) -> Result<Response, AppError> {
    let target = resolve(state, path)?;
    let metadata = tokio::fs::metadata(&target).await.map_err(|_| AppError(StatusCode::NOT_FOUND, "not found".into()))?;

    let mut responses = vec![propfind_entry(path, &target, &metadata).await];

    if metadata.is_dir() {
        let mut read_dir = tokio::fs::read_dir(&target)
            .await
            .map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))? {
            let child_meta = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };
            let child_href = format!("{}/{}", path.trim_end_matches('/'), entry.file_name().to_string_lossy());
            responses.push(propfind_entry(&child_href, &entry.path(), &child_meta).await);
        }
    }

    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<D:multistatus xmlns:D=\"DAV:\">\n{}\n</D:multistatus>",
        responses.join("\n")
    );

    Ok((
        StatusCode::MULTI_STATUS,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response())
}

async fn propfind_entry(href: &str, fs_path: &FsPath, metadata: &std::fs::Metadata) -> String {
    let is_dir = metadata.is_dir();
    let modified = metadata
        .modified()
        .map(chrono::DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
        .to_rfc2822();
    let size = if is_dir { 0 } else { metadata.len() };
    let resourcetype = if is_dir { "<D:collection/>" } else { "" };
    let name = fs_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

    format!(
        "  <D:response>\n    <D:href>/webdav{href}</D:href>\n    <D:propstat>\n      <D:prop>\n        \
         <D:displayname>{name}</D:displayname>\n        <D:resourcetype>{resourcetype}</D:resourcetype>\n        \
         <D:getcontentlength>{size}</D:getcontentlength>\n        <D:getlastmodified>{modified}</D:getlastmodified>\n      \
         </D:prop>\n      <D:status>HTTP/1.1 200 OK</D:status>\n    </D:propstat>\n  </D:response>",
    )
}

async fn get(state: &AppState, path: &str, head_only: bool) -> Result<Response, AppError> {
    let target = resolve(state, path)?;
    let metadata = tokio::fs::metadata(&target).await.map_err(|_| AppError(StatusCode::NOT_FOUND, "not found".into()))?;
    if metadata.is_dir() {
        return Err(AppError(StatusCode::BAD_REQUEST, "cannot GET a collection".into()));
    }
    if head_only {
        return Ok((StatusCode::OK, [(header::CONTENT_LENGTH, metadata.len().to_string())]).into_response());
    }
    let bytes = tokio::fs::read(&target).await.map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((StatusCode::OK, bytes).into_response())
}

async fn put(state: &AppState, path: &str, body: Body) -> Result<Response, AppError> {
    let target = resolve(state, path)?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }
    let bytes = to_bytes(body, usize::MAX).await.map_err(|e| AppError(StatusCode::BAD_REQUEST, e.to_string()))?;
    let existed = tokio::fs::metadata(&target).await.is_ok();
    tokio::fs::write(&target, &bytes).await.map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok((if existed { StatusCode::NO_CONTENT } else { StatusCode::CREATED }).into_response())
}

async fn delete(state: &AppState, path: &str) -> Result<Response, AppError> {
    let target = resolve(state, path)?;
    let metadata = tokio::fs::metadata(&target).await.map_err(|_| AppError(StatusCode::NOT_FOUND, "not found".into()))?;
    if metadata.is_dir() {
        tokio::fs::remove_dir_all(&target).await
    } else {
        tokio::fs::remove_file(&target).await
    }
    .map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state.webdav_locks.remove(&path.to_string());
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn mkcol(state: &AppState, path: &str) -> Result<Response, AppError> {
    let target = resolve(state, path)?;
    if tokio::fs::metadata(&target).await.is_ok() {
        return Err(AppError(StatusCode::METHOD_NOT_ALLOWED, "already exists".into()));
    }
    tokio::fs::create_dir(&target).await.map_err(|e| AppError(StatusCode::CONFLICT, e.to_string()))?;
    Ok(StatusCode::CREATED.into_response())
}

fn destination_path(headers: &HeaderMap) -> Result<String, AppError> {
    let raw = headers
        .get("Destination")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError(StatusCode::BAD_REQUEST, "missing Destination header".into()))?;
    // Clients send an absolute URL; only the path component matters.
    let path = raw.split_once("/webdav").map(|(_, rest)| rest).unwrap_or(raw);
    Ok(path.to_string())
}

async fn mv(state: &AppState, path: &str, headers: &HeaderMap) -> Result<Response, AppError> {
    let source = resolve(state, path)?;
    let dest = resolve(state, &destination_path(headers)?)?;
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }
    tokio::fs::rename(&source, &dest).await.map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::CREATED.into_response())
}

async fn copy(state: &AppState, path: &str, headers: &HeaderMap) -> Result<Response, AppError> {
    let source = resolve(state, path)?;
    let dest = resolve(state, &destination_path(headers)?)?;
    let metadata = tokio::fs::metadata(&source).await.map_err(|_| AppError(StatusCode::NOT_FOUND, "not found".into()))?;
    if metadata.is_dir() {
        return Err(AppError(StatusCode::NOT_IMPLEMENTED, "recursive collection COPY is not supported".into()));
    }
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }
    tokio::fs::copy(&source, &dest).await.map_err(|e| AppError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(StatusCode::CREATED.into_response())
}

/// `LOCK`/`UNLOCK` (§6 "in-memory lock system"). Locks are advisory only —
/// nothing in `PUT`/`DELETE`/`MOVE` checks them. RFC 4918 treats WebDAV
/// locking as a client-cooperation protocol, not an access-control
/// mechanism, and this mirrors that.
async fn lock(state: &AppState, path: &str, headers: &HeaderMap) -> Result<Response, AppError> {
    resolve(state, path)?;
    if let Some(existing) = state.webdav_locks.get(path) {
        if existing.expires_at > Utc::now() {
            return Err(AppError(StatusCode::LOCKED, "resource is locked".into()));
        }
    }

    let owner = headers.get("X-Lock-Owner").and_then(|v| v.to_str().ok()).unwrap_or("anonymous").to_string();
    let token = format!("opaquelocktoken:{}", Uuid::new_v4());
    let entry = LockEntry { token: token.clone(), owner, expires_at: Utc::now() + chrono::Duration::seconds(600) };
    state.webdav_locks.insert(path.to_string(), entry);

    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<D:prop xmlns:D=\"DAV:\">\n  <D:lockdiscovery>\n    \
         <D:activelock>\n      <D:locktype><D:write/></D:locktype>\n      <D:lockscope><D:exclusive/></D:lockscope>\n      \
         <D:depth>0</D:depth>\n      <D:timeout>Second-600</D:timeout>\n      \
         <D:locktoken><D:href>{token}</D:href></D:locktoken>\n    </D:activelock>\n  </D:lockdiscovery>\n</D:prop>",
    );

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8".to_string())],
        body,
    )
        .into_response();
    if let Ok(value) = header::HeaderValue::from_str(&format!("<{token}>")) {
        response.headers_mut().insert(header::HeaderName::from_static("lock-token"), value);
    }
    Ok(response)
}

async fn unlock(state: &AppState, path: &str, headers: &HeaderMap) -> Result<Response, AppError> {
    let submitted = headers
        .get("Lock-Token")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches('<').trim_end_matches('>').to_string());

    match state.webdav_locks.get(path) {
        Some(entry) if Some(entry.token.clone()) == submitted => {
            state.webdav_locks.remove(path);
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Some(_) => Err(AppError(StatusCode::CONFLICT, "lock token mismatch".into())),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
