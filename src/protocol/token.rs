//! The policy request token.

/// What a Flash client sends to ask for the policy: the tag plus a NUL byte.
pub const REQUEST_TOKEN: &[u8; 23] = b"<policy-file-request/>\0";

/// Bytes read from a client per read event.
pub const INPUT_BUFFER_SIZE: usize = 64;

/// Whether one read's worth of bytes is a policy request.
///
/// The tag must match exactly at the start of `received`. The terminating NUL
/// is optional, but if a 23rd byte arrived it has to be that NUL.
pub fn is_policy_request(received: &[u8]) -> bool {
    let (tag, terminator) = REQUEST_TOKEN.split_at(REQUEST_TOKEN.len() - 1);
    match received.strip_prefix(tag) {
        Some(rest) => rest.first().map_or(true, |b| *b == terminator[0]),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_23_bytes() {
        assert_eq!(REQUEST_TOKEN.len(), 23);
    }

    #[test]
    fn full_token_matches() {
        assert!(is_policy_request(REQUEST_TOKEN));
    }

    #[test]
    fn terminator_is_optional() {
        assert!(is_policy_request(b"<policy-file-request/>"));
    }

    #[test]
    fn bytes_after_terminator_are_ignored() {
        assert!(is_policy_request(b"<policy-file-request/>\0garbage"));
    }

    #[test]
    fn non_nul_23rd_byte_does_not_match() {
        assert!(!is_policy_request(b"<policy-file-request/>\n"));
        assert!(!is_policy_request(b"<policy-file-request/>x"));
    }

    #[test]
    fn other_input_does_not_match() {
        assert!(!is_policy_request(b"hello"));
        assert!(!is_policy_request(b""));
        assert!(!is_policy_request(b"<policy-file-request"));
        assert!(!is_policy_request(b" <policy-file-request/>\0"));
        assert!(!is_policy_request(b"<POLICY-FILE-REQUEST/>\0"));
    }
}
