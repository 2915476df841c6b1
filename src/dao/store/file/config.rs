use std::path::PathBuf;

const PLAYERS_FILE: &str = "playerData.json";
const QUIZ_FILE: &str = "quiz.json";

/// Runtime configuration describing where the JSON data files live.
#[derive(Debug, Clone)]
pub struct FileConfig {
    /// Directory holding `playerData.json` and `quiz.json`.
    pub data_dir: PathBuf,
}

impl FileConfig {
    /// Construct a configuration rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Build a configuration from `DATA_DIR`, defaulting to `./data`.
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os("DATA_DIR")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("data"));
        Self::new(data_dir)
    }

    /// Location of the player ledger.
    pub fn players_path(&self) -> PathBuf {
        self.data_dir.join(PLAYERS_FILE)
    }

    /// Location of the quiz questions.
    pub fn quiz_path(&self) -> PathBuf {
        self.data_dir.join(QUIZ_FILE)
    }
}
