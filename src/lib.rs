pub mod config;
pub mod error;
pub mod state;
pub mod db;
pub mod routes;

pub mod crypto {
    pub mod jwt;
    pub mod password;
    pub mod token;
}

pub mod models {
    pub mod user;
    pub mod refresh_token;
}

pub mod repositories {
    pub mod user;
    pub mod refresh_token;
    pub mod login_attempts;
    pub mod memory;
}

pub mod services {
    pub mod auth;
    pub mod users;
}

pub mod handlers {
    pub mod auth;
    pub mod users;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
}
