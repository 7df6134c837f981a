//! Web server command

use std::path::Path;

use anyhow::Result;

use pocketmate_server::ServerConfig;

pub async fn cmd_serve(db_path: &Path, host: &str, port: u16, no_encrypt: bool) -> Result<()> {
    let db = super::open_db(db_path, no_encrypt)?;

    let allowed_origins = std::env::var("POCKETMATE_ALLOWED_ORIGINS")
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let config = ServerConfig { allowed_origins };

    pocketmate_server::serve(db, host, port, config).await
}
