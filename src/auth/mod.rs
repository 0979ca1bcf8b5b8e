use crate::state::AppState;
use axum::Router;

mod claims;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod repo;
pub(crate) mod validate;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
