use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use referral_backend::{
    config::Config,
    database::connect_stores,
    error::expose_internal_errors,
    external::{CloudinaryService, create_mailer},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::{api_doc, swagger_config},
    utils::{JwtService, SessionCookie},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().context("Failed to load configuration")?;
    let development = config.app.is_development();
    expose_internal_errors(development);

    let stores = connect_stores(&config.database)
        .await
        .context("Failed to open the document store")?;

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.expires_in);
    let session_cookie = SessionCookie::new(
        &config.jwt.cookie_name,
        config.jwt.cookie_secure,
        config.jwt.expires_in,
    );

    let cloudinary = CloudinaryService::new(config.cloudinary.clone());
    if !cloudinary.is_configured() {
        log::warn!("Cloudinary credentials missing, avatar uploads will fail");
    }
    let mailer = create_mailer(&config.smtp).context("Failed to set up the mailer")?;

    let auth_service = AuthService::new(
        &stores,
        mailer,
        jwt_service.clone(),
        AuthSettings::from_config(&config),
    );
    let user_service = UserService::new(
        &stores,
        Arc::new(cloudinary),
        config.security.bcrypt_cost,
        config.cloudinary.folder.clone(),
        config.cloudinary.max_file_bytes,
    );
    let withdrawal_service = WithdrawalService::new(&stores);

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let public_url = config.app.public_url.clone();
    let cookie_name = config.jwt.cookie_name.clone();
    let openapi = api_doc(&cookie_name);

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone(), &cookie_name))
            .wrap(create_cors(&public_url, development))
            .wrap(Logger::default())
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(withdrawal_service.clone()))
            .app_data(web::Data::new(session_cookie.clone()))
            .configure(|cfg| swagger_config(cfg, openapi.clone()))
            .configure(handlers::api_config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
