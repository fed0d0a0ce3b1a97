//! Session URL derivation.
//!
//! The WebSocket endpoint is derived from the page origin: scheme swapped
//! to the matching WebSocket scheme, path fixed to `/ws`, and the identity
//! token appended as the `socket_id` query parameter.
//!
//! | Origin | Session URL |
//! |--------|-------------|
//! | `http://host:8000/` | `ws://host:8000/ws?socket_id=<token>` |
//! | `https://host/` | `wss://host/ws?socket_id=<token>` |

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SocketId;

// ============================================================================
// Constants
// ============================================================================

/// WebSocket endpoint path on the origin server.
const WS_PATH: &str = "/ws";

/// Query parameter carrying the identity token.
const SOCKET_ID_PARAM: &str = "socket_id";

// ============================================================================
// Derivation
// ============================================================================

/// Derives the WebSocket session URL from a page origin.
///
/// Secure origins (`https`) map to `wss`, insecure (`http`) to `ws`;
/// already-WebSocket origins pass through. Path, query and fragment of the
/// origin are replaced.
///
/// # Errors
///
/// Returns [`Error::Config`] for origins with any other scheme or origins
/// that cannot carry a WebSocket scheme (e.g. `data:` URLs).
pub fn session_url(origin: &Url, socket_id: &SocketId) -> Result<Url> {
    let scheme = match origin.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::config(format!(
                "cannot derive session URL from '{other}' origin"
            )));
        }
    };

    let mut url = origin.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::config("origin does not support a WebSocket scheme"))?;
    url.set_path(WS_PATH);
    url.set_fragment(None);
    url.query_pairs_mut()
        .clear()
        .append_pair(SOCKET_ID_PARAM, &socket_id.to_string());

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
