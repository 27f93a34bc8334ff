use crate::base::neterror::{ErrorKind, NetError};

#[test]
fn test_net_error_roundtrip() {
    let original = NetError::ConnectionRefused;
    let code = original.as_i32();
    assert_eq!(code, -102);
    let converted = NetError::from(code);
    assert!(matches!(converted, NetError::ConnectionRefused));

    let custom = NetError::RedirectCycleDetected;
    let custom_code = custom.as_i32();
    assert_eq!(custom_code, -900);
    assert!(matches!(NetError::from(custom_code), NetError::RedirectCycleDetected));
}

#[test]
fn test_unknown_error() {
    let err = NetError::from(-9999);
    assert!(matches!(err, NetError::Unknown(-9999)));
}

#[test]
fn test_kinds_are_distinguishable() {
    assert_eq!(NetError::UnknownProfile("x".into()).kind(), ErrorKind::UnknownProfile);
    assert_eq!(NetError::NameNotResolved.kind(), ErrorKind::Connect);
    assert_eq!(NetError::SslProtocolError.kind(), ErrorKind::Handshake);
    assert_eq!(NetError::CertAuthorityInvalid.kind(), ErrorKind::Certificate);
    assert_eq!(NetError::InvalidHttpResponse.kind(), ErrorKind::Protocol);
    assert_eq!(NetError::TimedOut.kind(), ErrorKind::Timeout);
    assert_eq!(NetError::Aborted.kind(), ErrorKind::Cancelled);
    assert_eq!(NetError::JsonDecodeFailed("eof".into()).kind(), ErrorKind::Decode);
}

#[test]
fn test_session_fatality() {
    assert!(NetError::Http2ProtocolError.is_fatal_to_session());
    assert!(NetError::TimedOut.is_fatal_to_session());
    assert!(!NetError::JsonDecodeFailed(String::new()).is_fatal_to_session());
    assert!(!NetError::ConnectionRefused.is_fatal_to_session());
}

#[test]
fn test_io_mapping() {
    let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "rst");
    assert_eq!(NetError::from(reset), NetError::ConnectionReset);

    let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "no");
    assert_eq!(NetError::from_connect_io(&refused), NetError::ConnectionRefused);
}

#[test]
fn test_display_carries_context() {
    let err = NetError::UnknownProfile("chrome_9000".into());
    assert_eq!(err.to_string(), "Unknown profile: chrome_9000");
}

#[test]
fn test_every_code_roundtrips() {
    for code in [-3, -7, -100, -118, -130, -202, -207, -310, -365, -376, -900, -904, -908] {
        assert_eq!(NetError::from(code).as_i32(), code);
    }
    assert_eq!(NetError::from(-907), NetError::InvalidConfig(String::new()));
    assert_eq!(NetError::Unknown(-12345).kind(), ErrorKind::Protocol);
}
