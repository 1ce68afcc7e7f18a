use crate::service::schedules::Room;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub app_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    // Transactional email API
    pub email_api_url: String,
    pub email_api_key: Option<String>,
    pub email_sender: String,
    // Object storage for attachments
    pub storage_api_url: Option<String>,
    pub storage_api_token: Option<String>,
    pub storage_public_url: Option<String>,
    pub rooms: Vec<Room>,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");
        let app_url = std::env::var("APP_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let redis_url = std::env::var("REDIS_URL").ok();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["http://localhost:3000".to_string()]);

        let email_api_url = std::env::var("EMAIL_API_URL")
            .unwrap_or_else(|_| "https://api.smtp2go.com/v3/email/send".to_string());
        let email_api_key = std::env::var("EMAIL_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        let email_sender = std::env::var("EMAIL_SENDER")
            .unwrap_or_else(|_| "Help Desk <noreply@helpdesk.local>".to_string());

        let storage_api_url = std::env::var("STORAGE_API_URL").ok();
        let storage_api_token = std::env::var("STORAGE_API_TOKEN").ok();
        let storage_public_url = std::env::var("STORAGE_PUBLIC_URL").ok();

        let rooms = match std::env::var("ROOMS_JSON") {
            Ok(raw) => serde_json::from_str::<Vec<Room>>(&raw).unwrap_or_else(|e| {
                tracing::warn!("Invalid ROOMS_JSON ({}), using default rooms", e);
                Room::defaults()
            }),
            Err(_) => Room::defaults(),
        };

        Config {
            database_url,
            redis_url,
            app_url,
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().expect("JWT_MAXAGE must be a number of minutes"),
            port,
            allowed_origins,
            email_api_url,
            email_api_key,
            email_sender,
            storage_api_url,
            storage_api_token,
            storage_public_url,
            rooms,
        }
    }
}
