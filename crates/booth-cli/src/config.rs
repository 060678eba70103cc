use std::path::PathBuf;

/// Kiosk configuration, loaded from environment variables.
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Backdrop image composited behind the subject.
    pub background_path: PathBuf,
    /// Directory for saved visitor photographs.
    pub photo_dir: PathBuf,
    /// Flat JSON file of registration records.
    pub records_path: PathBuf,
}

impl Config {
    /// Load configuration from `BOOTH_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            model_dir: env_path("BOOTH_MODEL_DIR", "models"),
            background_path: env_path("BOOTH_BACKGROUND", "assets/backdrop.png"),
            photo_dir: env_path("BOOTH_PHOTO_DIR", "photos"),
            records_path: env_path("BOOTH_RECORDS", "registrations.json"),
        }
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}
