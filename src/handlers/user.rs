use actix_multipart::Multipart;
use actix_web::{HttpResponse, ResponseError, Result, web};
use futures_util::StreamExt;
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::UserService;

#[utoipa::path(
    get,
    path = "/api/user/profile",
    tag = "user",
    security(
        ("session_cookie" = [])
    ),
    responses(
        (status = 200, description = "Profile with referral list and stats", body = UserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_profile(
    user_service: web::Data<UserService>,
    user: AuthUser,
) -> Result<HttpResponse> {
    match user_service.get_profile(user.0).await {
        Ok(profile) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "user": profile
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/user/referrals",
    tag = "user",
    security(
        ("session_cookie" = [])
    ),
    params(PaginationParams),
    responses(
        (status = 200, description = "One page of referred accounts plus totals", body = ReferralPage),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_referrals(
    user_service: web::Data<UserService>,
    user: AuthUser,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match user_service.get_referrals(user.0, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": page
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/user/change-password",
    tag = "user",
    security(
        ("session_cookie" = [])
    ),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Wrong current password or weak new password"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn change_password(
    user_service: web::Data<UserService>,
    user: AuthUser,
    request: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    match user_service.change_password(user.0, request.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Password updated successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

struct AvatarUpload {
    file: Option<Vec<u8>>,
    user_id: Option<String>,
}

fn multipart_error(e: actix_multipart::MultipartError) -> AppError {
    AppError::ValidationError(format!("Malformed multipart body: {e}"))
}

async fn read_avatar_upload(mut payload: Multipart, max_bytes: usize) -> AppResult<AvatarUpload> {
    let mut upload = AvatarUpload {
        file: None,
        user_id: None,
    };

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(multipart_error)?;
        let name = field.name().unwrap_or_default().to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(multipart_error)?;
            if data.len() + chunk.len() > max_bytes {
                return Err(AppError::ValidationError(format!(
                    "File exceeds the {max_bytes} byte limit"
                )));
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" | "avatar" => upload.file = Some(data),
            "userId" => {
                upload.user_id = Some(String::from_utf8_lossy(&data).trim().to_string())
            }
            _ => {}
        }
    }

    Ok(upload)
}

#[utoipa::path(
    post,
    path = "/api/user/upload-avatar",
    tag = "user",
    security(
        ("session_cookie" = [])
    ),
    request_body(content = AvatarUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Avatar stored", body = UserResponse),
        (status = 400, description = "Missing or oversized file"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "userId does not match the session"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Upload failed")
    )
)]
pub async fn upload_avatar(
    user_service: web::Data<UserService>,
    user: AuthUser,
    payload: Multipart,
) -> Result<HttpResponse> {
    let upload = match read_avatar_upload(payload, user_service.max_avatar_bytes()).await {
        Ok(upload) => upload,
        Err(e) => return Ok(e.error_response()),
    };

    let Some(form_user_id) = upload.user_id.filter(|id| !id.is_empty()) else {
        return Ok(AppError::ValidationError("userId is required".to_string()).error_response());
    };
    if Uuid::parse_str(&form_user_id).ok() != Some(user.0) {
        log::warn!("User {} tried to change the avatar of {}", user.0, form_user_id);
        return Ok(AppError::Forbidden.error_response());
    }
    let Some(file) = upload.file else {
        return Ok(AppError::ValidationError("No file uploaded".to_string()).error_response());
    };

    match user_service.update_avatar(user.0, file).await {
        Ok(profile) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "user": profile,
            "message": "Avatar updated successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user")
            .route("/profile", web::get().to(get_profile))
            .route("/referrals", web::get().to(get_referrals))
            .route("/upload-avatar", web::post().to(upload_avatar))
            .route("/change-password", web::post().to(change_password)),
    );
}

#[cfg(test)]
mod tests {
    use crate::store::UserStore;
    use crate::testing::TestContext;
    use actix_web::test;
    use chrono::Utc;
    use serde_json::{Value, json};

    const BOUNDARY: &str = "----avatar-boundary";

    fn multipart_body(user_id: &str, file: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"userId\"\r\n\r\n{user_id}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"me.png\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(
        cookie: actix_web::cookie::Cookie<'static>,
        body: Vec<u8>,
    ) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/user/upload-avatar")
            .cookie(cookie)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn test_profile_includes_referrals_and_stats() {
        let ctx = TestContext::new();
        let alice = ctx.seed_user("alice", true).await;
        let bob = ctx.seed_user("bob", true).await;
        ctx.store.add_referral(alice.id, bob.id, Utc::now()).await.unwrap();
        ctx.store
            .set_referral_activity(alice.id, bob.id, true, 200.0, Some(12.5))
            .await
            .unwrap();
        let app = init_app!(ctx);

        let req = test::TestRequest::get()
            .uri("/api/user/profile")
            .cookie(ctx.session_for(alice.id))
            .to_request();
        let json: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(json["success"], true);
        assert_eq!(json["user"]["id"], alice.id.to_string());
        assert_eq!(json["user"]["referredUsers"][0]["user"]["username"], "bob");
        assert_eq!(json["user"]["referralStats"]["activeReferrals"], 1);
        assert_eq!(json["user"]["referralStats"]["totalEarnings"], 12.5);
        assert!(json["user"].get("passwordHash").is_none());
    }

    #[actix_web::test]
    async fn test_referral_pages_past_the_end_are_empty() {
        let ctx = TestContext::new();
        let alice = ctx.seed_user("alice", true).await;
        for name in ["bob", "carol", "dave"] {
            let u = ctx.seed_user(name, false).await;
            ctx.store.add_referral(alice.id, u.id, Utc::now()).await.unwrap();
        }
        let app = init_app!(ctx);

        let req = test::TestRequest::get()
            .uri("/api/user/referrals?page=2&per_page=2")
            .cookie(ctx.session_for(alice.id))
            .to_request();
        let json: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(json["data"]["items"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"]["items"][0]["user"]["username"], "dave");
        assert_eq!(json["data"]["pagination"]["total"], 3);
        assert_eq!(json["data"]["stats"]["totalReferrals"], 3);

        let req = test::TestRequest::get()
            .uri("/api/user/referrals?page=9&per_page=2")
            .cookie(ctx.session_for(alice.id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let json: Value = test::read_body_json(resp).await;
        assert!(json["data"]["items"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_avatar_upload_stores_avatar() {
        let ctx = TestContext::new();
        let alice = ctx.seed_user("alice", true).await;
        let app = init_app!(ctx);

        let req = upload_request(
            ctx.session_for(alice.id),
            multipart_body(&alice.id.to_string(), b"\x89PNG fake"),
        )
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(
            json["user"]["avatar"]["public_id"],
            format!("avatars/avatar_{}", alice.id)
        );
        assert_eq!(ctx.storage.uploads().await, 1);

        let stored = ctx.store.find_by_id(alice.id).await.unwrap().unwrap();
        assert!(stored.avatar.is_some());
    }

    #[actix_web::test]
    async fn test_avatar_upload_for_someone_else_is_forbidden() {
        let ctx = TestContext::new();
        let alice = ctx.seed_user("alice", true).await;
        let bob = ctx.seed_user("bob", true).await;
        let app = init_app!(ctx);

        let req = upload_request(
            ctx.session_for(alice.id),
            multipart_body(&bob.id.to_string(), b"\x89PNG fake"),
        )
        .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);
        assert_eq!(ctx.storage.uploads().await, 0);
    }

    #[actix_web::test]
    async fn test_change_password_endpoint() {
        let ctx = TestContext::new();
        let alice = ctx.seed_user("alice", true).await;
        let app = init_app!(ctx);

        let req = test::TestRequest::post()
            .uri("/api/user/change-password")
            .cookie(ctx.session_for(alice.id))
            .set_json(json!({"currentPassword": "Password123", "newPassword": "Changed123"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"email": "alice@example.com", "password": "Changed123"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }
}
