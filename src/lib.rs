pub mod api;
pub mod client;
pub mod config;
pub mod database;

pub mod middleware {
    pub mod auth;
}

pub mod models {
    pub mod active_stream;
    pub mod channel;
    pub mod invite_token;
    pub mod message;
    pub mod server;
    pub mod server_member;
    pub mod user;
}

pub mod server {
    pub mod route_builder;
}

pub mod services {
    pub mod bootstrap;
    pub mod channel;
    pub mod invite;
    pub mod server;
    pub mod stream;
    pub mod timeline;
    pub mod upload;
    pub mod user;
}

pub mod tasks {
    pub mod retention;
}

pub mod utils {
    pub mod crypto;
    pub mod error;
    pub mod helpers;
    pub mod jwt;
    pub mod time;
    pub mod validation;
}

pub mod websocket {
    pub mod events;
    pub mod handlers;
    pub mod hub;
}
