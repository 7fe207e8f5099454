//! Addresses of the chat sockets exposed by the Careline API.

use url::Url;

use crate::Result;
use crate::error::Error;

/// Path segments shared by every real-time channel.
const API_SEGMENTS: [&str; 3] = ["api", "v1", "ws"];

/// Channel used by help-desk staff: `{base}/api/v1/ws/admin/help`.
pub fn admin_help(base: &str) -> Result<Url> {
    channel(base, &["admin", "help"])
}

/// Personal chat channel of `user_id`: `{base}/api/v1/ws/chats/{user_id}`.
pub fn user_chats(base: &str, user_id: &str) -> Result<Url> {
    channel(base, &["chats", user_id])
}

/// Live health monitoring room: `{base}/api/v1/ws/monitoring/{room_id}`.
pub fn monitoring(base: &str, room_id: &str) -> Result<Url> {
    channel(base, &["monitoring", room_id])
}

/// Appointment requests addressed to the doctor `user_id`:
/// `{base}/api/v1/ws/appointment/requests/{user_id}`.
pub fn appointment_requests(base: &str, user_id: &str) -> Result<Url> {
    channel(base, &["appointment", "requests", user_id])
}

/// Join `segments` onto `base`, mapping `http(s)` to `ws(s)`.
fn channel(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(Error::unsupported_scheme(&url)),
    };
    url.set_scheme(scheme)
        .map_err(|()| Error::validation(format!("unable to switch {base} to {scheme}")))?;

    url.path_segments_mut()
        .map_err(|()| Error::validation(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(API_SEGMENTS)
        .extend(segments);

    Ok(url)
}
