pub mod config;
pub mod content;
pub mod detection;
pub mod error;
pub mod events;
pub mod mood;
pub mod session;
pub mod settings;
mod utils;

pub use config::AppConfig;
pub use content::{ContentItem, ContentProvider, PlaybackTarget, YouTubeClient};
pub use detection::{CameraLease, WebviewBridge};
pub use error::{CameraError, ContentError, DetectionError, MoodError, SessionError};
pub use events::{EventSink, UiEvent};
pub use mood::{map, Mood, MoodStabilizer, StabilizerConfig};
pub use session::{MoodController, MoodState};
pub use settings::SettingsStore;

/// Initializes `env_logger`. `RUST_LOG` wins; otherwise info, or debug when
/// `MOODTUBE_DEBUG` is set.
pub fn init_logging() {
    let level = if config::debug_mode() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}

#[cfg(feature = "desktop")]
pub(crate) struct AppState {
    pub(crate) moods: MoodController,
    pub(crate) bridge: WebviewBridge,
    pub(crate) settings: SettingsStore,
}

#[cfg(feature = "desktop")]
#[tauri::command]
fn get_settings(state: tauri::State<'_, AppState>) -> Result<AppConfig, String> {
    Ok(state.settings.config())
}

/// Persists new settings. Controllers pick them up on next launch.
#[cfg(feature = "desktop")]
#[tauri::command]
fn update_settings(
    settings: AppConfig,
    state: tauri::State<'_, AppState>,
) -> Result<(), String> {
    state.settings.update(settings).map_err(|e| e.to_string())
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;
    use tauri::Manager;

    use detection::commands::{camera_reply, detection_reply, models_reply};
    use session::commands::{
        activate_content, close_playback, get_mood_state, list_moods, open_content_externally,
        refresh_content, select_mood, start_detection, stop_detection,
    };

    init_logging();
    log::info!("MoodTube starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
                let config = settings_store.config();
                config.validate()?;
                if config.content.api_key.is_empty() {
                    log::warn!("No YouTube API key configured; content fetches will fail");
                }

                let content = YouTubeClient::new(config.content.clone())?;
                let sink: Arc<dyn EventSink> = Arc::new(app.handle().clone());
                let bridge = WebviewBridge::new(Arc::clone(&sink))
                    .with_request_timeout(config.detection.request_timeout());

                let moods = MoodController::new(
                    config,
                    Arc::new(content),
                    CameraLease::new(Arc::new(bridge.clone())),
                    Arc::new(bridge.clone()),
                    sink,
                );

                app.manage(AppState {
                    moods,
                    bridge,
                    settings: settings_store,
                });
                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::Destroyed = event {
                let state = window.state::<AppState>();
                let moods = state.moods.clone();
                let bridge = state.bridge.clone();
                // Pending web view requests can no longer be answered.
                bridge.close();
                tauri::async_runtime::block_on(async move {
                    if let Err(err) = moods.stop_detection().await {
                        log::error!("Failed to stop detection on shutdown: {err:#}");
                    }
                });
            }
        })
        .invoke_handler(tauri::generate_handler![
            get_mood_state,
            list_moods,
            select_mood,
            start_detection,
            stop_detection,
            refresh_content,
            activate_content,
            close_playback,
            open_content_externally,
            camera_reply,
            models_reply,
            detection_reply,
            get_settings,
            update_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
