use actix_cors::Cors;
use actix_web::http::header;

/// The web client sends the session cookie, so credentials are allowed and
/// origins are pinned to `public_url` outside development.
pub fn create_cors(public_url: &str, development: bool) -> Cors {
    let cors = if development {
        Cors::default().allowed_origin_fn(|_, _req_head| true)
    } else {
        Cors::default().allowed_origin(public_url.trim_end_matches('/'))
    };

    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .supports_credentials()
        .max_age(3600)
}
