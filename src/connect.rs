use anyhow::Context;
use mysql_async::{Conn, Opts};

// Open a single MySQL connection from a URL
pub async fn connect_mysql(uri: &str) -> anyhow::Result<Conn> {
    let opts = Opts::from_url(uri).with_context(|| format!("Invalid MySQL URL {uri}"))?;
    Conn::new(opts)
        .await
        .with_context(|| format!("Failed to connect to {uri}"))
}
