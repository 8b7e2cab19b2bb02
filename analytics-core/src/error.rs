//! Error taxonomy shared by the upstream clients.

use thiserror::Error;

/// Which third-party API an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Meta Marketing API (ad insights).
    Insights,
    /// Hotjar API (session recordings and its OAuth endpoint).
    Recordings,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Insights => "meta-insights",
            Service::Recordings => "hotjar",
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// A required credential or identifier is missing. Never sent to the network.
    #[error("configuration error: {0}")]
    Config(String),

    /// The OAuth token endpoint was unreachable or rejected the client.
    #[error("authentication with {service} failed: {detail}")]
    Auth { service: Service, detail: String },

    /// An authenticated call was answered with 403.
    #[error("{service} denied access (403): {detail}")]
    Forbidden { service: Service, detail: String },

    /// Any other non-2xx answer, transport failure, or timeout.
    #[error("{service} request failed{}: {detail}", status_suffix(.status))]
    Upstream {
        service: Service,
        status: Option<u16>,
        detail: String,
    },

    /// The inbound request was malformed.
    #[error("invalid request: {0}")]
    Validation(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

impl Error {
    pub fn upstream(service: Service, status: Option<u16>, detail: impl Into<String>) -> Self {
        Error::Upstream {
            service,
            status,
            detail: detail.into(),
        }
    }

    /// Map a reqwest transport error (connect, timeout, decode) to [`Error::Upstream`].
    pub fn transport(service: Service, err: &reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        Error::Upstream {
            service,
            status: err.status().map(|s| s.as_u16()),
            detail,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
