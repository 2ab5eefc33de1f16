use reqwest::StatusCode;
use thiserror::Error;

/// Failures the client core distinguishes between.
///
/// Read-path failures (`Fetch`, `Status`) are shown to the user. `AuthExpired` is only ever
/// produced through the session guard. `Persistence` is logged and dropped. `InvalidSelection`
/// is rejected without a state change.
#[derive(Debug, Error)]
pub enum Error {
  #[error("{context}: {source}")]
  Fetch {
    context: &'static str,
    #[source]
    source: reqwest::Error,
  },

  #[error("server returned {status}: {message}")]
  Status { status: StatusCode, message: String },

  #[error("session expired, please log in again")]
  AuthExpired,

  #[error("failed to save playback position: {0}")]
  Persistence(Box<Error>),

  #[error("index {index} is out of range for {len} visible entries")]
  InvalidSelection { index: usize, len: usize },

  #[error("player error: {0}")]
  Transport(String),

  #[error("login failed: {0}")]
  Login(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
  pub fn fetch(context: &'static str) -> impl FnOnce(reqwest::Error) -> Error {
    move |source| Error::Fetch { context, source }
  }

  pub fn is_auth_expired(&self) -> bool {
    match self {
      Error::AuthExpired => true,
      Error::Persistence(inner) => inner.is_auth_expired(),
      _ => false,
    }
  }
}
