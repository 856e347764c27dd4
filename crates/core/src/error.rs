use crate::client::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum HmsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("remote call failed: {0}")]
    Client(#[from] ClientError),
    #[error("unexpected response shape: {0}")]
    Decode(String),
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("failed to read settings file: {0}")]
    SettingsRead(std::io::Error),
    #[error("failed to write settings file: {0}")]
    SettingsWrite(std::io::Error),
    #[error("failed to parse settings YAML: {0}")]
    SettingsYaml(serde_yaml::Error),
}

pub type HmsResult<T> = std::result::Result<T, HmsError>;
