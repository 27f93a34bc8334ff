//! TLS tests against local listeners.
//!
//! Covers:
//! - ClientHello captured off the wire vs. the profile descriptor
//! - JA3 / JA4 over a captured hello
//! - Certificate verification on and off, custom CA bundle

mod common;

use impersonet::socket::tls::codepoints::{cipher_name, extension, group_name, is_grease, is_post_quantum_group};
use impersonet::socket::tls::{ClientHello, TlsConnector, VerifyPolicy};
use impersonet::{lookup, Client, Emulation, ErrorKind, Ja3, Ja4};
use std::io::Write;
use std::sync::Arc;
use tokio::net::TcpStream;

async fn captured_hello(profile: &str) -> (Arc<Emulation>, ClientHello) {
    let emulation = lookup(profile).unwrap();
    let connector = TlsConnector::new(emulation.tls_options(), &VerifyPolicy::insecure()).unwrap();
    let (addr, record) = common::capture_client_hello().await;

    let tcp = TcpStream::connect(addr).await.unwrap();
    let handshake = tokio::spawn(async move { connector.negotiate(tcp, "localhost").await.map(|_| ()) });
    let record = record.await.unwrap();
    // The listener hangs up after the hello, so the handshake itself fails.
    assert!(handshake.await.unwrap().is_err());

    (emulation, ClientHello::parse(&record).unwrap())
}

fn no_grease(values: Vec<u16>) -> Vec<u16> {
    values.into_iter().filter(|v| !is_grease(*v)).collect()
}

/// Descriptor suites the connector can name, in descriptor order.
fn offered_suites(descriptor: &[u16]) -> Vec<u16> {
    descriptor.iter().copied().filter(|c| cipher_name(*c).is_some()).collect()
}

/// Extension order without GREASE and padding, whose slots BoringSSL fixes.
fn ordered_extensions(extensions: Vec<u16>) -> Vec<u16> {
    no_grease(extensions).into_iter().filter(|e| *e != extension::PADDING).collect()
}

/// Groups the linked BoringSSL will offer, with and without post-quantum
/// support.
fn expected_groups(descriptor: &[u16]) -> (Vec<u16>, Vec<u16>) {
    let known: Vec<u16> = descriptor.iter().copied().filter(|g| group_name(*g).is_some()).collect();
    let classical = known.iter().copied().filter(|g| !is_post_quantum_group(*g)).collect();
    (known, classical)
}

#[tokio::test]
async fn test_chrome_hello_matches_descriptor() {
    let (emulation, hello) = captured_hello("chrome_120").await;
    let tls = emulation.tls_options();

    assert_eq!(hello.server_name().as_deref(), Some("localhost"));
    assert_eq!(hello.alpn_protocols(), vec!["h2", "http/1.1"]);
    assert!(is_grease(hello.cipher_suites[0]), "GREASE cipher leads");

    assert_eq!(no_grease(hello.cipher_suites.clone()), offered_suites(&tls.cipher_suites));

    let (groups, classical) = expected_groups(&tls.supported_groups);
    let wire_groups = no_grease(hello.supported_groups());
    assert!(wire_groups == groups || wire_groups == classical, "{:?}", wire_groups);

    assert_eq!(hello.signature_algorithms(), tls.signature_algorithms);
    assert_eq!(no_grease(hello.supported_versions()), no_grease(tls.supported_versions.clone()));

    let extensions = hello.extension_types_no_grease();
    for ext in [
        extension::SERVER_NAME,
        extension::ALPN,
        extension::SUPPORTED_VERSIONS,
        extension::KEY_SHARE,
        extension::APPLICATION_SETTINGS,
        extension::COMPRESS_CERTIFICATE,
    ] {
        assert!(extensions.contains(&ext), "missing extension {}", ext);
    }
}

#[tokio::test]
async fn test_firefox_hello_has_no_grease() {
    let (emulation, hello) = captured_hello("firefox_133").await;
    let tls = emulation.tls_options();

    assert!(hello.cipher_suites.iter().all(|c| !is_grease(*c)));
    assert!(hello.extension_types().iter().all(|e| !is_grease(*e)));
    assert_eq!(hello.alpn_protocols(), vec!["h2", "http/1.1"]);

    let (groups, classical) = expected_groups(&tls.supported_groups);
    let wire_groups = hello.supported_groups();
    assert!(wire_groups == groups || wire_groups == classical, "{:?}", wire_groups);
}

#[tokio::test]
async fn test_firefox_hello_follows_descriptor_order() {
    let (emulation, hello) = captured_hello("firefox_133").await;
    let tls = emulation.tls_options();

    // TLS 1.3 suites lead in Firefox's order (AES-128, ChaCha20, AES-256).
    assert_eq!(&hello.cipher_suites[..3], &tls.cipher_suites[..3]);
    assert_eq!(hello.cipher_suites, offered_suites(&tls.cipher_suites));
    assert_eq!(
        ordered_extensions(hello.extension_types()),
        ordered_extensions(tls.extensions.clone())
    );

    let delegated = hello.extension(extension::DELEGATED_CREDENTIALS).expect("delegated_credentials");
    assert_eq!(delegated.data.len(), 2 + 2 * tls.delegated_credentials.len());
    let record_limit = hello.extension(extension::RECORD_SIZE_LIMIT).expect("record_size_limit");
    assert_eq!(record_limit.data, vec![0x40, 0x01]);
    assert_eq!(hello.key_share_groups(), tls.key_share_groups);
}

#[tokio::test]
async fn test_safari_hello_follows_descriptor_order() {
    let (emulation, hello) = captured_hello("safari_18").await;
    let tls = emulation.tls_options();

    assert!(is_grease(hello.cipher_suites[0]));
    // Every descriptor suite is offered, 3DES included, in order.
    assert_eq!(offered_suites(&tls.cipher_suites), tls.cipher_suites);
    assert_eq!(no_grease(hello.cipher_suites.clone()), tls.cipher_suites);
    assert_eq!(
        ordered_extensions(hello.extension_types()),
        ordered_extensions(tls.extensions.clone())
    );
    assert!(hello.extension(extension::SESSION_TICKET).is_none());
}

#[tokio::test]
async fn test_firefox_hello_is_stable_across_connections() {
    let (_, first) = captured_hello("firefox_133").await;
    let (_, second) = captured_hello("firefox_133").await;
    assert_eq!(first.extension_types(), second.extension_types());
    assert_eq!(Ja3::from_hello(&first).hash, Ja3::from_hello(&second).hash);
}

#[tokio::test]
async fn test_okhttp_hello_has_no_alps() {
    let (_, hello) = captured_hello("okhttp_3_14").await;
    assert!(!hello.alpn_protocols().is_empty());
    assert!(!hello.extension_types().iter().any(|e| *e == extension::APPLICATION_SETTINGS));
}

#[tokio::test]
async fn test_fingerprints_of_captured_hello() {
    let (_, first) = captured_hello("chrome_120").await;
    let (_, second) = captured_hello("chrome_120").await;

    let ja3 = Ja3::from_hello(&first);
    assert!(ja3.text.starts_with("771,"));
    assert_eq!(ja3.hash.len(), 32);
    // Extension order is permuted per connection; the cipher field is not.
    assert_eq!(ja3.cipher_field(), Ja3::from_hello(&second).cipher_field());

    let ja4 = Ja4::from_hello(&first);
    assert!(ja4.as_str().starts_with("t13d"), "{}", ja4.as_str());
    assert!(ja4.as_str()[..10].ends_with("h2"), "{}", ja4.as_str());
    // JA4 sorts ciphers, so permutation does not move the first two parts.
    let second_ja4 = Ja4::from_hello(&second);
    let head = |ja4: &Ja4| ja4.as_str().split('_').take(2).collect::<Vec<_>>().join("_");
    assert_eq!(head(&ja4), head(&second_ja4));
}

#[tokio::test]
async fn test_self_signed_rejected_when_verifying() {
    let (addr, _cert, _rx) = common::serve_https_h1(|_| common::ok("hi")).await;
    let client = Client::builder().impersonate("chrome_120").build().unwrap();

    let err = client
        .get(format!("https://localhost:{}/", addr.port()))
        .send()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Certificate, "{:?}", err);
}

#[tokio::test]
async fn test_self_signed_accepted_without_verification() {
    let (addr, _cert, mut rx) = common::serve_https_h1(|_| common::ok("hi")).await;
    let client = Client::builder()
        .impersonate("chrome_120")
        .verify(false)
        .build()
        .unwrap();

    let response = client
        .get(format!("https://localhost:{}/tls", addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.version(), http::Version::HTTP_11);
    assert_eq!(response.text().await.unwrap(), "hi");
    assert_eq!(rx.recv().await.unwrap().request_line(), "GET /tls HTTP/1.1");
}

#[tokio::test]
async fn test_custom_ca_bundle_is_trusted() {
    let (addr, cert, _rx) = common::serve_https_h1(|_| common::ok("trusted")).await;
    let mut bundle = tempfile::NamedTempFile::new().unwrap();
    bundle.write_all(&cert.to_pem().unwrap()).unwrap();

    let client = Client::builder()
        .impersonate("firefox_133")
        .ca_cert_file(bundle.path())
        .build()
        .unwrap();
    let response = client
        .get(format!("https://localhost:{}/", addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "trusted");
}

#[tokio::test]
async fn test_handshake_against_plain_tcp_fails() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        use tokio::io::AsyncWriteExt;
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
    });
    let client = Client::builder()
        .impersonate("chrome_120")
        .verify(false)
        .build()
        .unwrap();

    let err = client
        .get(format!("https://127.0.0.1:{}/", addr.port()))
        .send()
        .await
        .unwrap_err();
    assert!(
        matches!(err.kind(), ErrorKind::Handshake | ErrorKind::Protocol),
        "{:?}",
        err
    );
}
