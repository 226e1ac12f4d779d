#[derive(Clone)]
pub struct Config {
    pub listen_addr: String,
    pub static_root: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        let listen_addr = std::env::var("LISTEN").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let static_root = std::env::var("STATIC_ROOT").ok();
        Self {
            listen_addr,
            static_root,
        }
    }
}
