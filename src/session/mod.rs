pub mod controller;
pub mod state;

#[cfg(feature = "desktop")]
pub mod commands;

pub use controller::MoodController;
pub use state::{DetectionStatus, MoodState};
