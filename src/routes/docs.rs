use crate::openapi::DOCS_PATH;
use axum::response::Redirect;

pub async fn redirect_to_docs() -> Redirect {
    Redirect::temporary(DOCS_PATH)
}
