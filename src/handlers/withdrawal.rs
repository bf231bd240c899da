use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::middlewares::AuthUser;
use crate::services::WithdrawalService;

#[utoipa::path(
    get,
    path = "/api/withdrawals",
    tag = "withdrawal",
    security(
        ("session_cookie" = [])
    ),
    responses(
        (status = 200, description = "Withdrawal history, newest first", body = [WithdrawalResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_withdrawals(
    withdrawal_service: web::Data<WithdrawalService>,
    user: AuthUser,
) -> Result<HttpResponse> {
    match withdrawal_service.history(user.0).await {
        Ok(withdrawals) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": withdrawals
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn withdrawal_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/withdrawals", web::get().to(get_withdrawals));
}

#[cfg(test)]
mod tests {
    use crate::entities::WithdrawalStatus;
    use crate::models::Withdrawal;
    use crate::store::WithdrawalStore;
    use crate::testing::TestContext;
    use actix_web::cookie::Cookie;
    use actix_web::test;
    use chrono::{Duration, Utc};
    use serde_json::Value;
    use uuid::Uuid;

    #[actix_web::test]
    async fn test_withdrawals_require_a_session() {
        let ctx = TestContext::new();
        let app = init_app!(ctx);

        let req = test::TestRequest::get().uri("/api/withdrawals").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["message"], "Not authenticated");

        let req = test::TestRequest::get()
            .uri("/api/withdrawals")
            .cookie(Cookie::new("authToken", "not-a-jwt"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }

    #[actix_web::test]
    async fn test_withdrawals_are_listed_newest_first() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("alice", true).await;
        let now = Utc::now();
        for (amount, hours_ago) in [(10.0, 48), (30.0, 1), (20.0, 24)] {
            WithdrawalStore::create(
                ctx.store.as_ref(),
                Withdrawal {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    amount,
                    address: None,
                    status: WithdrawalStatus::Pending,
                    created_at: now - Duration::hours(hours_ago),
                },
            )
            .await
            .unwrap();
        }
        let app = init_app!(ctx);

        let req = test::TestRequest::get()
            .uri("/api/withdrawals")
            .cookie(ctx.session_for(user.id))
            .to_request();
        let json: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(json["success"], true);
        let amounts: Vec<f64> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["amount"].as_f64().unwrap())
            .collect();
        assert_eq!(amounts, vec![30.0, 20.0, 10.0]);
        assert_eq!(json["data"][0]["status"], "pending");
    }
}
