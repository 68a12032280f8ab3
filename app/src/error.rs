use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use err_derive::Error;
use log::*;
use serde::Serialize;

use crate::persistence::{ConcurrencyError, DuplicateDrink};
use crate::visitor::InsufficientFunds;

#[derive(Debug, Error)]
pub enum BarError {
    #[error(display = "unauthenticated")]
    Unauthenticated,
    #[error(display = "unauthorized")]
    Unauthorized,
    #[error(display = "{} not found", _0)]
    NotFound(&'static str),
    #[error(display = "drink {:?} already exists", _0)]
    AlreadyExists(String),
    #[error(display = "no money")]
    InsufficientFunds,
    #[error(display = "you are dead")]
    Dead,
    #[error(display = "you drank yourself to death")]
    Died,
    #[error(display = "visitor was updated concurrently, try again")]
    Conflict,
    #[error(display = "bad request: {}", _0)]
    BadRequest(String),
    #[error(display = "store failure: {}", _0)]
    Persistence(anyhow::Error),
    /// Signing or hashing went wrong; nothing the caller can fix.
    #[error(display = "internal failure: {}", _0)]
    Internal(anyhow::Error),
}

#[derive(Serialize, Debug)]
struct ErrorBody<'a> {
    message: &'a str,
}

impl From<anyhow::Error> for BarError {
    fn from(err: anyhow::Error) -> Self {
        if err.downcast_ref::<ConcurrencyError>().is_some() {
            return BarError::Conflict;
        }
        if let Some(DuplicateDrink(name)) = err.downcast_ref::<DuplicateDrink>() {
            return BarError::AlreadyExists(name.clone());
        }
        BarError::Persistence(err)
    }
}

impl From<r2d2::Error> for BarError {
    fn from(err: r2d2::Error) -> Self {
        BarError::Persistence(anyhow::Error::new(err).context("checkout connection"))
    }
}

impl From<BlockingError> for BarError {
    fn from(err: BlockingError) -> Self {
        BarError::Persistence(anyhow::anyhow!("blocking task: {}", err))
    }
}

impl From<InsufficientFunds> for BarError {
    fn from(_: InsufficientFunds) -> Self {
        BarError::InsufficientFunds
    }
}

impl ResponseError for BarError {
    fn status_code(&self) -> StatusCode {
        match self {
            BarError::Unauthenticated
            | BarError::Unauthorized
            | BarError::Dead
            | BarError::Died => StatusCode::UNAUTHORIZED,
            BarError::NotFound(_)
            | BarError::AlreadyExists(_)
            | BarError::InsufficientFunds
            | BarError::BadRequest(_) => StatusCode::BAD_REQUEST,
            BarError::Conflict => StatusCode::CONFLICT,
            BarError::Persistence(_) | BarError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            BarError::Unauthenticated => HttpResponse::build(status).finish(),
            BarError::Persistence(err) | BarError::Internal(err) => {
                error!("{}: {:?}", status, err);
                HttpResponse::build(status).json(ErrorBody {
                    message: "server error",
                })
            }
            other => {
                debug!("Rejecting with {}: {}", status, other);
                HttpResponse::build(status).json(ErrorBody {
                    message: &other.to_string(),
                })
            }
        }
    }
}
