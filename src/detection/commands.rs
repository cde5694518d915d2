use tauri::State;
use uuid::Uuid;

use crate::detection::{CameraReply, DetectionReply, ModelsReply, WebviewBridge};
use crate::AppState;

fn bridge_from_state(state: &State<'_, AppState>) -> WebviewBridge {
    state.bridge.clone()
}

fn unknown_request(kind: &str, request_id: Uuid) -> String {
    format!("no pending {kind} request with id {request_id}")
}

#[tauri::command]
pub async fn camera_reply(
    state: State<'_, AppState>,
    request_id: Uuid,
    reply: CameraReply,
) -> Result<(), String> {
    let bridge = bridge_from_state(&state);
    if bridge.resolve_camera(request_id, reply) {
        Ok(())
    } else {
        Err(unknown_request("camera", request_id))
    }
}

#[tauri::command]
pub async fn models_reply(
    state: State<'_, AppState>,
    request_id: Uuid,
    reply: ModelsReply,
) -> Result<(), String> {
    let bridge = bridge_from_state(&state);
    if bridge.resolve_models(request_id, reply) {
        Ok(())
    } else {
        Err(unknown_request("models", request_id))
    }
}

#[tauri::command]
pub async fn detection_reply(
    state: State<'_, AppState>,
    request_id: Uuid,
    reply: DetectionReply,
) -> Result<(), String> {
    let bridge = bridge_from_state(&state);
    // Replies to timed-out requests are expected and dropped by the bridge.
    bridge.resolve_detection(request_id, reply);
    Ok(())
}
