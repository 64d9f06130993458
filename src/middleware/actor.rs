use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::{Error, FromRequest, HttpRequest, HttpResponse};
use futures::future::{ready, Ready};
use serde_json::json;

/// Header set by the authenticating gateway in front of the service.
pub const ACTOR_HEADER: &str = "X-Atlas-Actor";

/// The acting user of a request. None is an anonymous caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Actor {
    name: Option<String>,
}

impl Actor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Require an authenticated actor. Returns the name or ErrorUnauthorized.
    pub fn require(&self) -> Result<&str, Error> {
        self.name().ok_or_else(|| {
            InternalError::from_response(
                "Authentication required",
                HttpResponse::Unauthorized().json(json!({
                    "status": "error",
                    "code": "not_authenticated",
                    "message": "Authentication credentials were not provided.",
                })),
            )
            .into()
        })
    }

    fn from_header(req: &HttpRequest) -> Self {
        let name = req
            .headers()
            .get(ACTOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty() && name.len() <= 150)
            .map(str::to_string);
        Self { name }
    }
}

impl FromRequest for Actor {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(Actor::from_header(req)))
    }
}
