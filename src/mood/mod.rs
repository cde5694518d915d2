pub mod config;
pub mod history;
pub mod mapper;
pub mod stabilizer;
pub mod types;

pub use config::StabilizerConfig;
pub use history::{CommitSource, HistoryEntry, MoodHistory};
pub use mapper::{map, mood_for_expression};
pub use stabilizer::{MoodStabilizer, StabilizerPhase};
pub use types::{
    Expression, ExpressionScore, ExpressionVector, Mood, MoodProfile, MoodReading, MoodSample,
    MoodTheme,
};
