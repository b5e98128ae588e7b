pub mod layout;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, get_service, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::services::listing_form_service::{MAX_IMAGES, MAX_IMAGE_BYTES};
use middleware::auth as auth_middleware;
use routes::{auth, home, listings, locations, profile, publish, search};
pub use state::AppState;

/// Room for the largest allowed submission plus the text fields.
const LISTING_FORM_BODY_LIMIT: usize = MAX_IMAGES * MAX_IMAGE_BYTES + 1024 * 1024;

pub fn router(state: AppState) -> Router {
    // Protected routes under one middleware layer
    let protected_routes = Router::new()
        .route("/publicar", get(publish::publish_index_handler))
        .route(
            "/publicar/:category_tag",
            get(publish::new_listing_page).post(publish::create_listing_handler),
        )
        .route(
            "/a/:listing_id/editar",
            get(publish::edit_listing_page).post(publish::update_listing_handler),
        )
        .route(
            "/a/:listing_id/eliminar",
            post(publish::delete_listing_handler),
        )
        .route("/a/:listing_id/favorito", post(listings::favorite_handler))
        .route("/perfil", get(profile::profile_handler))
        .route("/sign-out", post(auth::sign_out_handler))
        .layer(DefaultBodyLimit::max(LISTING_FORM_BODY_LIMIT))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::require_auth,
        ));

    let mut app = Router::new()
        // Public routes
        .route("/", get(home::home_handler))
        .route("/anuncios", get(listings::listings_handler))
        .route("/buscar", get(listings::listings_handler))
        .route("/categorias", get(home::categories_handler))
        .route("/a/:listing_id", get(listings::listing_detail_handler))
        .route("/sign-in", get(auth::sign_in_page).post(auth::sign_in_handler))
        .route("/api/locations/states", get(locations::states_handler))
        .route(
            "/api/locations/states/:state_id/cities",
            get(locations::cities_handler),
        )
        .route(
            "/api/search/suggestions",
            get(search::suggestions_handler),
        )
        // Protected routes
        .merge(protected_routes)
        // Static files
        .nest_service(
            "/assets",
            get_service(ServeDir::new("assets")).layer(SetResponseHeaderLayer::if_not_present(
                CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            )),
        )
        .fallback(|| async { AppError::NotFound });

    // Uploaded images are served from here unless they live on another host.
    let objects_path = state.config.storage_public_url.as_str();
    if objects_path.starts_with('/') && objects_path.len() > 1 {
        app = app.nest_service(
            objects_path,
            get_service(ServeDir::new(&state.config.storage_dir)),
        );
    }

    app
        // Layers
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::load_session,
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use base64::{engine::general_purpose, Engine as _};
    use tower::ServiceExt;

    use crate::config::tests::test_config;
    use crate::database::listings_repo::tests::{insert, seed};
    use crate::database::pool::test_pool;
    use crate::error::{Result, GENERIC_ERROR_MESSAGE};
    use crate::services::auth_service::tests::{jwt_with_exp, FakeAuth};
    use crate::storage::{LocalObjectStorage, ObjectStorage};

    /// Storage whose uploads always fail.
    struct UnavailableStorage;

    #[async_trait::async_trait]
    impl ObjectStorage for UnavailableStorage {
        async fn upload(&self, _key: &str, _bytes: &[u8], _content_type: &str) -> Result<String> {
            Err(AppError::storage("bucket unavailable"))
        }

        async fn remove(&self, _keys: &[String]) -> Result<()> {
            Ok(())
        }

        fn key_for_url(&self, _url: &str) -> Option<String> {
            None
        }
    }

    fn fake_auth() -> FakeAuth {
        FakeAuth::default()
            .with_access_token("token-user-1", "user-1", "ana@example.com")
            .with_access_token("token-user-2", "user-2", "bob@example.com")
            .with_refresh_token("refresh-user-1", "user-1", "ana@example.com")
    }

    async fn app_with_storage(
        storage: Option<Arc<dyn ObjectStorage>>,
    ) -> (Router, sqlx::SqlitePool, tempfile::TempDir) {
        let pool = test_pool().await;
        seed(&pool).await;
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.storage_dir = dir.path().to_path_buf();
        let storage: Arc<dyn ObjectStorage> = match storage {
            Some(storage) => storage,
            None => Arc::new(LocalObjectStorage::new(dir.path(), "/storage")),
        };
        let state = AppState {
            pool: pool.clone(),
            storage,
            config: Arc::new(config),
            auth: Arc::new(fake_auth()),
        };
        (router(state), pool, dir)
    }

    async fn app() -> (Router, sqlx::SqlitePool, tempfile::TempDir) {
        app_with_storage(None).await
    }

    fn cookie_for(user_id: &str) -> String {
        format!("access_token=token-{}", user_id)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn home_page_renders() {
        let (app, pool, _dir) = app().await;
        insert(&pool, 1, Some(5), Some(12), "Casa en la playa").await;

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Casa en la playa"));
    }

    #[tokio::test]
    async fn listings_page_filters_by_category() {
        let (app, pool, _dir) = app().await;
        insert(&pool, 1, Some(5), Some(12), "Casa en la playa").await;
        insert(&pool, 2, Some(5), Some(12), "Moto deportiva").await;

        let response = app
            .oneshot(get("/anuncios?category=inmuebles"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Casa en la playa"));
        assert!(!body.contains("Moto deportiva"));
    }

    #[tokio::test]
    async fn protected_pages_redirect_to_sign_in() {
        let (app, _pool, _dir) = app().await;
        let response = app.oneshot(get("/perfil")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/sign-in?return_to=/perfil"
        );
    }

    #[tokio::test]
    async fn profile_is_shown_to_its_owner() {
        let (app, _pool, _dir) = app().await;
        let request = Request::builder()
            .uri("/perfil")
            .header(header::COOKIE, cookie_for("user-1"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("ana@example.com"));
    }

    #[tokio::test]
    async fn non_owners_cannot_delete() {
        let (app, pool, _dir) = app().await;
        let id = insert(&pool, 9, None, None, "Laptop").await;
        sqlx::query("INSERT INTO users (id, email) VALUES ('user-2', 'bob@example.com')")
            .execute(&pool)
            .await
            .unwrap();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/a/{}/eliminar", id))
            .header(header::COOKIE, cookie_for("user-2"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_listing_is_not_found() {
        let (app, _pool, _dir) = app().await;
        let response = app.oneshot(get("/a/4242")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn json_endpoints() {
        let (app, _pool, _dir) = app().await;

        let response = app
            .clone()
            .oneshot(get("/api/locations/states/5/cities"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cities: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(cities[0]["name"], "Maracaibo");

        let response = app
            .oneshot(get("/api/search/suggestions?q=motos"))
            .await
            .unwrap();
        let hits: Vec<String> = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(hits, vec!["Motos usadas".to_string()]);
    }

    #[tokio::test]
    async fn create_listing_end_to_end() {
        let (app, pool, dir) = app().await;

        let boundary = "XBOUNDARY";
        let mut body = Vec::new();
        for (name, value) in [
            ("price", "350"),
            ("product_title", "Bicicleta"),
            ("product_state", "used"),
            ("description", "Rodado 29"),
        ] {
            body.extend_from_slice(
                format!(
                    "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"\r\n\r\n{v}\r\n",
                    b = boundary,
                    n = name,
                    v = value
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"bici.png\"\r\nContent-Type: image/png\r\n\r\n",
                b = boundary
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"\x89PNG fake");
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/publicar/deportes-fitness")
            .header(header::COOKIE, cookie_for("user-1"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        let id: i64 = location.trim_start_matches("/a/").parse().unwrap();
        let listing = crate::services::listings_service::load_listing(&pool, id)
            .await
            .unwrap();
        assert_eq!(listing.category.id, 6);
        assert_eq!(listing.images.len(), 1);
        assert!(dir.path().join("listing_images").exists());
    }

    #[tokio::test]
    async fn invalid_form_is_rendered_with_errors() {
        let (app, _pool, _dir) = app().await;
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"price\"\r\n\r\n-1\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/publicar/hogar")
            .header(header::COOKIE, cookie_for("user-1"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("El precio debe ser un número positivo."));
        assert!(body.contains("Debes subir al menos una imagen"));
    }

    #[tokio::test]
    async fn forged_cookies_cannot_delete() {
        let (app, pool, _dir) = app().await;
        let id = insert(&pool, 9, None, None, "Laptop").await;

        let payload = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"sub":"user-1"}"#);
        let request = Request::builder()
            .method("POST")
            .uri(format!("/a/{}/eliminar", id))
            .header(
                header::COOKIE,
                format!("access_token=x.{}.not-a-signature", payload),
            )
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("/sign-in"));
        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(left, 1);
    }

    #[tokio::test]
    async fn expired_sessions_are_renewed() {
        let (app, _pool, _dir) = app().await;
        let request = Request::builder()
            .uri("/perfil")
            .header(
                header::COOKIE,
                format!("access_token={}; refresh_token=refresh-user-1", jwt_with_exp(1)),
            )
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("access_token=fresh-access-user-1")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=fresh-refresh-user-1")));
        assert!(body_text(response).await.contains("ana@example.com"));
    }

    #[tokio::test]
    async fn storage_failures_show_the_generic_notice() {
        let (app, pool, _dir) = app_with_storage(Some(Arc::new(UnavailableStorage))).await;

        let boundary = "XBOUNDARY";
        let mut body = String::new();
        for (name, value) in [
            ("price", "80"),
            ("product_title", "Pesas"),
            ("product_state", "new"),
        ] {
            body.push_str(&format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{n}\"\r\n\r\n{v}\r\n",
                b = boundary,
                n = name,
                v = value
            ));
        }
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"pesas.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n--{b}--\r\n",
            b = boundary
        ));

        let request = Request::builder()
            .method("POST")
            .uri("/publicar/deportes-fitness")
            .header(header::COOKIE, cookie_for("user-1"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains(GENERIC_ERROR_MESSAGE));
        let listings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM listings")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(listings, 0);
    }
}
