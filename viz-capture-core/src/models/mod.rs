pub mod audio_models;
pub mod error;
pub mod state;
