//! Server command implementation

use std::path::Path;

use anyhow::Result;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    config_path: Option<&Path>,
    host: &str,
    port: u16,
) -> Result<()> {
    println!("🚀 Starting Conciliar web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!();
    println!("   ⚠️  No authentication - the acting user comes from the x-user-id header");
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, config_path)?;
    conciliar_server::serve(db, host, port).await?;

    Ok(())
}
