//! Streaming multipart upload handler.
//!
//! One request carries exactly one file part and the mockup-name text
//! field, in either order, inside a forward-only multipart stream. File
//! bytes are buffered the moment they arrive; they are released to the
//! object store only once the metadata field has been received and
//! validated, and discarded without any store call otherwise. Waiting for
//! that decision never stalls parsing of the remaining parts.

use crate::buffer::{PayloadChunk, PendingPayload, PendingUploadBuffer};
use crate::error::{ApiError, ApiResult};
use crate::gate::{GateDecision, UploadGate};
use crate::metrics::{
    UPLOAD_BYTES_STORED, UPLOAD_STORE_DURATION, UPLOADS_ACCEPTED, record_upload_rejected,
};
use crate::state::AppState;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use easel_core::upload::{derive_object_key, validate_metadata_value};
use easel_storage::{ObjectStore, StreamingUpload};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Per-request routing state for one multipart submission.
#[derive(Debug, Default)]
struct RequestSession {
    metadata_found: bool,
    file_found: bool,
    /// First unrecognized text field, if any. One unrecognized field
    /// poisons the whole request even if the right parts arrive later.
    unexpected_field: Option<String>,
    /// The file stream was cut short by the size ceiling.
    truncated: bool,
}

/// What the release continuation did with the buffered bytes.
#[derive(Debug)]
enum StoreOutcome {
    /// Gate resolved to abort; bytes were discarded without a store call.
    Discarded,
    /// Bytes were written to the object store under `key`.
    Stored { key: String, bytes: u64 },
}

/// POST /v1/uploads
pub async fn create_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<StatusCode> {
    let mut session = RequestSession::default();
    let gate = UploadGate::new();
    let mut store_task: Option<JoinHandle<ApiResult<StoreOutcome>>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                // The parser cannot make progress, so nothing further will
                // arrive; any buffered file bytes are abandoned.
                gate.resolve(GateDecision::Abort);
                record_upload_rejected("malformed_multipart");
                return Err(ApiError::BadRequest(format!("invalid multipart data: {e}")));
            }
        };

        let name = field.name().unwrap_or_default().to_string();

        if field.file_name().is_some() {
            // A second file part of any name exceeds the one-file cap and
            // invalidates the request, regardless of what it is called.
            if session.file_found {
                gate.resolve(GateDecision::Abort);
                record_upload_rejected("extra_file_part");
                return Err(ApiError::InvalidUploadRequest(
                    "more than one file part submitted".to_string(),
                ));
            }
            if name != state.config.upload.file_field {
                gate.resolve(GateDecision::Abort);
                record_upload_rejected("wrong_file_field");
                tracing::debug!(field = %name, "file part under unexpected field name");
                return Err(ApiError::InvalidUploadField(format!(
                    "expected file field '{}', got '{name}'",
                    state.config.upload.file_field
                )));
            }
            session.file_found = true;

            let filename = field.file_name().unwrap_or_default().to_string();
            let (buffer, payload) = PendingUploadBuffer::new();
            store_task = Some(spawn_release_task(
                state.storage.clone(),
                gate.clone(),
                payload,
                filename,
            ));

            buffer_file_part(
                field,
                buffer,
                state.config.upload.max_file_size,
                &mut session,
            )
            .await;
        } else if name == state.config.upload.metadata_field {
            // Duplicates of the recognized field are tolerated: the first
            // value won at the gate, so later occurrences are ignored
            // here too, valid or not.
            if session.metadata_found {
                continue;
            }
            let value = match field.text().await {
                Ok(value) => value,
                Err(e) => {
                    gate.resolve(GateDecision::Abort);
                    record_upload_rejected("malformed_multipart");
                    return Err(ApiError::BadRequest(format!(
                        "failed to read field '{name}': {e}"
                    )));
                }
            };
            if let Err(e) = validate_metadata_value(&value) {
                gate.resolve(GateDecision::Abort);
                record_upload_rejected("invalid_metadata_value");
                return Err(ApiError::InvalidUploadRequest(e.to_string()));
            }
            session.metadata_found = true;
            // First resolution wins; a duplicate of the field is a no-op.
            gate.resolve(GateDecision::Proceed(value));
        } else {
            // Fail fast: the request is now invalid no matter what else
            // arrives. Keep consuming the stream so the file part, arrived
            // or still arriving, is discarded cleanly.
            gate.resolve(GateDecision::Abort);
            if session.unexpected_field.is_none() {
                tracing::debug!(field = %name, "unexpected form field");
                session.unexpected_field = Some(name);
            }
        }
    }

    finish_request(&state, session, &gate, store_task).await
}

/// Feed a file part's chunks into the pending buffer as they arrive.
///
/// Appending never waits on the gate. Hitting the size ceiling (or losing
/// the stream mid-read) seals the buffer truncated; the remainder of the
/// part is drained and discarded so later parts and end-of-stream still
/// get parsed.
async fn buffer_file_part(
    mut field: Field<'_>,
    mut buffer: PendingUploadBuffer,
    max_file_size: u64,
    session: &mut RequestSession,
) {
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if session.truncated {
                    continue;
                }
                if buffer.bytes_buffered() + chunk.len() as u64 > max_file_size {
                    tracing::warn!(
                        limit = max_file_size,
                        "file part exceeded size ceiling, discarding remainder"
                    );
                    session.truncated = true;
                    buffer.finalize_truncated();
                    continue;
                }
                buffer.append(chunk);
            }
            Ok(None) => {
                if !buffer.is_finalized() {
                    buffer.finalize();
                }
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "file part stream failed mid-read");
                if !buffer.is_finalized() {
                    buffer.finalize_truncated();
                }
                session.truncated = true;
                break;
            }
        }
    }
}

/// End-of-stream evaluation.
///
/// Both required parts must have arrived; when `await_store_write` is set
/// the response additionally reflects the outcome of the store write.
async fn finish_request(
    state: &AppState,
    session: RequestSession,
    gate: &UploadGate,
    store_task: Option<JoinHandle<ApiResult<StoreOutcome>>>,
) -> ApiResult<StatusCode> {
    if let Some(name) = session.unexpected_field {
        // The gate already aborted when the field was seen.
        record_upload_rejected("unexpected_field");
        return Err(ApiError::InvalidUploadRequest(format!(
            "unexpected field: {name}"
        )));
    }

    if !session.metadata_found || !session.file_found {
        // Resolve so a pending continuation discards its buffer.
        gate.resolve(GateDecision::Abort);
        record_upload_rejected("missing_parts");
        let mut missing = Vec::new();
        if !session.metadata_found {
            missing.push(state.config.upload.metadata_field.as_str());
        }
        if !session.file_found {
            missing.push(state.config.upload.file_field.as_str());
        }
        return Err(ApiError::InvalidUploadRequest(format!(
            "missing required part(s): {}",
            missing.join(", ")
        )));
    }

    let task = store_task.ok_or_else(|| {
        ApiError::Internal("file part accepted but no store task spawned".to_string())
    })?;

    if !state.config.upload.await_store_write {
        // Answer as soon as the form is complete. A truncated file is
        // already known to have failed; anything the store reports later
        // is only logged by the release task.
        if session.truncated {
            record_upload_rejected("file_too_large");
            return Err(ApiError::UploadFailed(
                "file exceeded the maximum allowed size".to_string(),
            ));
        }
        UPLOADS_ACCEPTED.inc();
        return Ok(StatusCode::OK);
    }

    match task.await {
        Ok(Ok(StoreOutcome::Stored { key, bytes })) => {
            tracing::info!(key = %key, bytes, "upload stored");
            UPLOADS_ACCEPTED.inc();
            Ok(StatusCode::OK)
        }
        Ok(Ok(StoreOutcome::Discarded)) => Err(ApiError::Internal(
            "upload discarded despite a complete request".to_string(),
        )),
        Ok(Err(e)) => {
            record_upload_rejected(e.code());
            Err(e)
        }
        Err(e) => Err(ApiError::Internal(format!("store task failed: {e}"))),
    }
}

/// Spawn the continuation that waits on the gate and streams the buffered
/// payload to the object store. Runs as its own task so waiting on the
/// gate never stalls ingestion of the remaining multipart stream.
fn spawn_release_task(
    storage: Arc<dyn ObjectStore>,
    gate: UploadGate,
    payload: PendingPayload,
    filename: String,
) -> JoinHandle<ApiResult<StoreOutcome>> {
    tokio::spawn(async move {
        let result = release_to_store(storage, gate, payload, filename).await;
        match &result {
            Ok(StoreOutcome::Stored { key, bytes }) => {
                tracing::debug!(key = %key, bytes, "buffered payload released to object store");
            }
            Ok(StoreOutcome::Discarded) => {
                tracing::debug!("buffered payload discarded");
            }
            Err(e) => {
                // When the handler does not await this task, this log line
                // is the only place the failure surfaces.
                tracing::error!(error = %e, "object store write failed");
            }
        }
        result
    })
}

/// Wait for the gate, then drain the buffer into the object store.
///
/// No store call is made unless the gate resolves to proceed, so an
/// aborted request never produces a partial or zero-byte object.
async fn release_to_store(
    storage: Arc<dyn ObjectStore>,
    gate: UploadGate,
    mut payload: PendingPayload,
    filename: String,
) -> ApiResult<StoreOutcome> {
    let metadata_value = match gate.resolved().await {
        GateDecision::Abort => return Ok(StoreOutcome::Discarded),
        GateDecision::Proceed(value) => value,
    };

    let key = derive_object_key(&metadata_value, &filename);
    let start = Instant::now();
    let mut upload = storage
        .put_stream(&key)
        .await
        .map_err(|e| ApiError::UploadFailed(format!("failed to start store write: {e}")))?;

    while let Some(chunk) = payload.next_chunk().await {
        match chunk {
            PayloadChunk::Data(data) => {
                if let Err(e) = upload.write(data).await {
                    abort_upload(upload, &key).await;
                    return Err(ApiError::UploadFailed(format!("store write failed: {e}")));
                }
            }
            PayloadChunk::Truncated => {
                abort_upload(upload, &key).await;
                return Err(ApiError::UploadFailed(
                    "file exceeded the maximum allowed size".to_string(),
                ));
            }
        }
    }

    let bytes = upload
        .finish()
        .await
        .map_err(|e| ApiError::UploadFailed(format!("failed to finish store write: {e}")))?;

    UPLOAD_STORE_DURATION.observe(start.elapsed().as_secs_f64());
    UPLOAD_BYTES_STORED.inc_by(bytes);

    Ok(StoreOutcome::Stored { key, bytes })
}

/// Best-effort abort of a streaming upload.
async fn abort_upload(upload: Box<dyn StreamingUpload>, key: &str) {
    if let Err(e) = upload.abort().await {
        tracing::warn!(key = %key, error = %e, "failed to abort streaming upload");
    }
}
