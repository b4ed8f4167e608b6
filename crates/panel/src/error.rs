use outliner_engine::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PanelError>;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("unexpected reply to {request}")]
    UnexpectedReply { request: &'static str },
}
