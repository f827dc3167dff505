use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Settings {
    pub port: u16,
    pub addr: SocketAddr,
    pub database_url: Option<String>,
    pub media_root: PathBuf,
    pub media_base_url: String,
    pub feed_limit: usize,
}

impl Settings {
    pub fn new() -> Self {
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let database_url = env::var("DATABASE_URL").ok();
        let media_root = env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("media"));
        let media_base_url = env::var("MEDIA_BASE_URL").unwrap_or_else(|_| "/media".to_string());
        let feed_limit: usize = env::var("FEED_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Self {
            port,
            addr,
            database_url,
            media_root,
            media_base_url,
            feed_limit,
        }
    }
}
