use tauri::State;
use tauri_plugin_opener::OpenerExt;

use crate::content::PlaybackTarget;
use crate::mood::{Mood, MoodProfile};
use crate::session::{MoodController, MoodState};
use crate::AppState;

fn controller_from_state(state: &State<'_, AppState>) -> MoodController {
    state.moods.clone()
}

#[tauri::command]
pub async fn get_mood_state(state: State<'_, AppState>) -> Result<MoodState, String> {
    let controller = controller_from_state(&state);
    Ok(controller.snapshot().await)
}

#[tauri::command]
pub fn list_moods() -> Vec<MoodProfile> {
    Mood::ALL.iter().map(|mood| mood.profile()).collect()
}

#[tauri::command]
pub async fn select_mood(state: State<'_, AppState>, mood: Mood) -> Result<MoodState, String> {
    let controller = controller_from_state(&state);
    Ok(controller.select_mood(mood).await)
}

#[tauri::command]
pub async fn start_detection(state: State<'_, AppState>) -> Result<MoodState, String> {
    let controller = controller_from_state(&state);
    controller.start_detection().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn stop_detection(state: State<'_, AppState>) -> Result<MoodState, String> {
    let controller = controller_from_state(&state);
    controller.stop_detection().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn refresh_content(state: State<'_, AppState>) -> Result<MoodState, String> {
    let controller = controller_from_state(&state);
    controller.refresh_content().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn activate_content(
    state: State<'_, AppState>,
    content_id: String,
) -> Result<PlaybackTarget, String> {
    let controller = controller_from_state(&state);
    controller
        .activate_content(&content_id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn close_playback(state: State<'_, AppState>) -> Result<MoodState, String> {
    let controller = controller_from_state(&state);
    Ok(controller.close_playback().await)
}

/// Opens the item on youtube.com in the default browser.
#[tauri::command]
pub async fn open_content_externally(
    state: State<'_, AppState>,
    app_handle: tauri::AppHandle,
    content_id: String,
) -> Result<(), String> {
    let controller = controller_from_state(&state);
    let target = controller
        .content_target(&content_id)
        .await
        .map_err(|e| e.to_string())?;

    app_handle
        .opener()
        .open_url(target.watch_url, None::<&str>)
        .map_err(|e| e.to_string())
}
