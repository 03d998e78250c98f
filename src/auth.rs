//! Minimal admin auth guard: a single bearer token from `AppConfig`, just
//! enough for the operability surface (work item list/requeue) to exist
//! behind a gate. Per-user authentication is out of scope; callers identify
//! themselves by `user_id` path/body parameters, as the rest of this crate's
//! repositories already assume.

use rocket::Request;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest};

use crate::config::AppConfig;

pub struct AdminGuard;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminGuard {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match request.rocket().state::<AppConfig>() {
            Some(config) => config,
            None => return Outcome::Error((Status::InternalServerError, ())),
        };

        let provided = request
            .headers()
            .get_one("Authorization")
            .and_then(|header| header.strip_prefix("Bearer "));

        match provided {
            Some(token) if token == config.admin_bearer_token => Outcome::Success(AdminGuard),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}
