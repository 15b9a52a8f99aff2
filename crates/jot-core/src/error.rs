use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Usage,
    /// Transport failure, no HTTP response was received.
    Network,
    /// The server answered with success but the body was not usable JSON.
    Parse,
    Server,
    Auth,
    /// Terminal authentication failure; the token has been cleared.
    SessionExpired,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Auth = 3,
    Remote = 4,
    Io = 6,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{message}")]
pub struct JotError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl JotError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message).with_status(status)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionExpired, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn is_terminal_auth(&self) -> bool {
        self.kind == ErrorKind::SessionExpired
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.kind {
            ErrorKind::Usage => ExitCode::Usage,
            ErrorKind::Auth | ErrorKind::SessionExpired => ExitCode::Auth,
            ErrorKind::Network | ErrorKind::Parse | ErrorKind::Server => ExitCode::Remote,
            ErrorKind::Io => ExitCode::Io,
        }
    }
}

impl From<std::io::Error> for JotError {
    fn from(value: std::io::Error) -> Self {
        Self::io(value.to_string())
    }
}

pub type JotResult<T> = Result<T, JotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_share_an_exit_code() {
        assert_eq!(JotError::network("down").exit_code(), ExitCode::Remote);
        assert_eq!(JotError::parse("html").exit_code(), ExitCode::Remote);
        assert_eq!(JotError::server(500, "boom").exit_code(), ExitCode::Remote);
        assert_eq!(
            JotError::session_expired("gone").exit_code(),
            ExitCode::Auth
        );
    }

    #[test]
    fn server_errors_carry_their_status() {
        let error = JotError::server(502, "bad gateway");
        assert_eq!(error.status, Some(502));
        assert_eq!(error.to_string(), "bad gateway");
    }
}
