use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("config directory not found")]
    ConfigDirNotFound,

    #[error(
        "descriptor file not found. Looked in:\n\
        - current directory: stack.local.kdl, .stack.local.kdl, stack.kdl, .stack.kdl\n\
        - ./.stackflow/ directory\n\
        - ~/.config/stackflow/stack.kdl\n\
        or point STACK_FILE at it directly"
    )]
    StackFileNotFound,

    #[error("invalid settings file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SettingsError>;
