use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("an endpoint must be set with bind, unix or stdio")]
    MissingEndpoint,

    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },

    #[error("address resolved to nothing")]
    NoAddress,

    #[error("tls is only available for http")]
    TlsWithFastCgi,

    #[error("{endpoint} endpoint is only available for fastcgi")]
    RequiresFastCgi { endpoint: &'static str },

    #[error("read buffer size must be greater than zero")]
    InvalidBufferSize,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("can't bind {endpoint}: {source}")]
    Bind { endpoint: String, source: io::Error },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ServerError {
    pub fn bind<S: ToString>(endpoint: S, source: io::Error) -> Self {
        Self::Bind { endpoint: endpoint.to_string(), source }
    }
}
