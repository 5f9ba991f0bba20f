#![doc = include_str!("../README.md")]

mod password;
mod shell;
mod verbose;

pub use crate::password::PasswordShell;
pub use crate::shell::{Output, Shell};
pub use crate::verbose::Verbose;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote host could not be reached, or the transport failed before
    /// authentication completed.
    #[error("cannot connect to {host}:{port}: {source}")]
    Connection {
        host: String,
        port: u16,
        #[source]
        source: russh::Error,
    },

    /// The server rejected the login/password pair.
    #[error("password authentication rejected for user {login}")]
    Authentication { login: String },

    /// The command channel could not be opened, or it died before reporting
    /// an exit status.
    #[error("command channel failed: {0}")]
    Channel(String),

    /// Copying bytes between the channel and the caller's streams failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::Authentication {
            login: "deploy".into(),
        };
        assert_eq!(
            err.to_string(),
            "password authentication rejected for user deploy"
        );

        let err = Error::Channel("closed without an exit status".into());
        assert_eq!(
            err.to_string(),
            "command channel failed: closed without an exit status"
        );
    }
}
