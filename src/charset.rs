//! Character set negotiation for the bulk-load path.

use mysql_async::Value;
use tracing::debug;

use crate::error::Result;
use crate::session::Session;

const UTF8MB4: &str = "utf8mb4";
const UTF8: &str = "utf8";

/// Requested charset and the one the destination actually supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetPreference {
    pub requested: String,
    pub negotiated: Option<String>,
}

impl CharsetPreference {
    /// `SET NAMES` for the negotiated charset, if any.
    pub fn set_names_statement(&self) -> Option<String> {
        self.negotiated
            .as_deref()
            .map(|charset| format!("SET NAMES {charset}"))
    }

    /// `CHARACTER SET` clause for `LOAD DATA`, if any.
    pub fn load_clause(&self) -> Option<String> {
        self.negotiated
            .as_deref()
            .map(|charset| format!(" CHARACTER SET {charset}"))
    }

    pub fn is_degraded(&self) -> bool {
        self.negotiated.is_none()
    }
}

async fn is_supported<S: Session + ?Sized>(dest: &mut S, charset: &str) -> Result<bool> {
    let found = dest
        .scalar(
            "SELECT CHARACTER_SET_NAME FROM information_schema.CHARACTER_SETS WHERE CHARACTER_SET_NAME = ?",
            vec![Value::Bytes(charset.as_bytes().to_vec())],
        )
        .await?;
    Ok(found.is_some())
}

/// Find a charset the destination supports for `requested`.
///
/// `utf8mb4` falls back to its 3-byte alias `utf8`; any other missing
/// charset yields no preference.
pub async fn negotiate<S: Session + ?Sized>(
    dest: &mut S,
    requested: &str,
) -> Result<CharsetPreference> {
    let negotiated = if is_supported(dest, requested).await? {
        Some(requested.to_string())
    } else if requested.eq_ignore_ascii_case(UTF8MB4) && is_supported(dest, UTF8).await? {
        Some(UTF8.to_string())
    } else {
        None
    };

    debug!(
        "Charset negotiation: requested {}, negotiated {:?}",
        requested, negotiated
    );

    Ok(CharsetPreference {
        requested: requested.to_string(),
        negotiated,
    })
}
