use crate::AuthError;

/// Split an `Authorization` header value into its bearer token.
///
/// The value must be exactly `<scheme> <token>` with a `Bearer` scheme
/// (case-insensitive).
pub fn parse_authorization_header(raw: &str) -> Result<&str, AuthError> {
    let mut parts = raw.split_whitespace();
    let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::malformed_header("expected '<scheme> <token>'"));
    };

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::malformed_header(format!(
            "unsupported scheme '{scheme}'"
        )));
    }

    Ok(token)
}
