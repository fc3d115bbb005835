pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

use repo_types::Collection;

pub fn router(state: &AppState) -> Router<AppState> {
    let mut router = Router::new();
    for c in Collection::LISTS {
        router = router.nest(&format!("/{}", c.slug()), handlers::collection_router(state, c));
    }
    for s in Collection::SECTIONS {
        router = router.nest(&format!("/{}", s.slug()), handlers::section_router(state, s));
    }
    router
}
