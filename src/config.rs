use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub auth_max: usize,
    pub api_max: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub environment: String,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "auth-app".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "auth-app-users".into()),
            ttl_days: std::env::var("JWT_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(7),
        };
        let rate_limit = RateLimitConfig {
            window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(15 * 60),
            auth_max: std::env::var("RATE_LIMIT_AUTH_MAX")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(5),
            api_max: std::env::var("RATE_LIMIT_API_MAX")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(100),
        };
        Ok(Self {
            database_url,
            environment,
            jwt,
            rate_limit,
        })
    }
}
