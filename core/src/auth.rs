//! HTTP Basic authentication.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::lookup_encoding;
use crate::error::Result;

/// `Authorization` header value for `user:password`.
///
/// The credential text is converted to bytes with `encoding` before being
/// Base64 encoded (standard alphabet, padded, single line). A missing
/// password encodes as an empty one.
pub fn basic_auth_header(user: &str, password: Option<&str>, encoding: &str) -> Result<String> {
    let credentials = format!("{user}:{}", password.unwrap_or_default());
    let (bytes, _, _) = lookup_encoding(encoding)?.encode(&credentials);
    Ok(format!("Basic {}", STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_user_and_password() {
        assert_eq!(
            basic_auth_header("Aladdin", Some("open sesame"), "UTF-8").unwrap(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn missing_password_is_empty() {
        assert_eq!(basic_auth_header("jdoe", None, "UTF-8").unwrap(), "Basic amRvZTo=");
    }

    #[test]
    fn credential_bytes_follow_the_encoding() {
        // "ä:ö" is 0xE4 0x3A 0xF6 in Latin-1, 0xC3A4 0x3A 0xC3B6 in UTF-8.
        assert_eq!(basic_auth_header("ä", Some("ö"), "ISO-8859-1").unwrap(), "Basic 5Dr2");
        assert_eq!(basic_auth_header("ä", Some("ö"), "UTF-8").unwrap(), "Basic w6Q6w7Y=");
    }

    #[test]
    fn long_credentials_are_not_wrapped() {
        let user = "u".repeat(200);
        let header = basic_auth_header(&user, Some(&"p".repeat(200)), "UTF-8").unwrap();
        assert!(!header.contains('\n'));
        assert!(!header.contains('\r'));
    }

    #[test]
    fn unknown_encoding_fails() {
        assert!(basic_auth_header("a", Some("b"), "x-unknown").is_err());
    }
}
