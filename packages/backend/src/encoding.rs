//! Percent-encoding of cue text for the synthesis request.
//!
//! Every byte outside `[A-Za-z0-9]` and the unreserved set `- . _ ~` is
//! written as `%XX` with uppercase hex digits.

use std::borrow::Cow;

/// Query key the server expects the text under.
pub const TEXT_PARAM: &str = "text=";

/// Percent-encode arbitrary bytes.
pub fn percent_encode(bytes: &[u8]) -> Cow<'_, str> {
    urlencoding::encode_binary(bytes)
}

/// Reverse of [`percent_encode`]. Malformed escapes are kept literally.
pub fn percent_decode(encoded: &str) -> Cow<'_, [u8]> {
    urlencoding::decode_binary(encoded.as_bytes())
}

/// `server + "text=" + percent_encode(text)`.
///
/// The server string is used verbatim; it is expected to end with `?` or
/// `&` so that the text lands in the query.
pub fn request_url(server: &str, text: &str) -> String {
    let encoded = percent_encode(text.as_bytes());
    let mut url = String::with_capacity(server.len() + TEXT_PARAM.len() + encoded.len());
    url.push_str(server);
    url.push_str(TEXT_PARAM);
    url.push_str(&encoded);
    url
}
