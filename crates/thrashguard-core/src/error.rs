use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Sampler error: {0}")]
    Sampler(String),

    #[error("Scanner error: {0}")]
    Scanner(String),

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Process {0} does not exist")]
    ProcessNotFound(u32),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
