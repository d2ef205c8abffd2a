use super::*;

const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

fn verifier() -> SignatureVerifier {
    SignatureVerifier::new("key")
}

#[test]
fn test_known_hmac_vectors_are_accepted() {
    let v = verifier();
    assert_eq!(
        v.verify_sha1(FOX, "sha1=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"),
        Verification::Valid
    );
    assert_eq!(
        v.verify_sha256(
            FOX,
            "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        ),
        Verification::Valid
    );
}

#[test]
fn test_sign_produces_prefixed_hex() {
    assert_eq!(
        verifier().sign_sha1(FOX),
        "sha1=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
    );
}

#[test]
fn test_any_single_bit_flip_in_body_is_rejected() {
    let v = verifier();
    let header = v.sign_sha1(FOX);

    for byte in 0..FOX.len() {
        for bit in 0..8 {
            let mut mutated = FOX.to_vec();
            mutated[byte] ^= 1 << bit;
            assert_eq!(
                v.verify_sha1(&mutated, &header),
                Verification::Invalid,
                "flip of bit {bit} in byte {byte} was accepted"
            );
        }
    }
}

#[test]
fn test_bare_hex_header_without_prefix_is_accepted() {
    let v = verifier();
    assert_eq!(
        v.verify_sha1(FOX, "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"),
        Verification::Valid
    );
    let prefixed = v.sign_sha256(FOX);
    let bare = prefixed.trim_start_matches("sha256=");
    assert_eq!(v.verify_sha256(FOX, bare), Verification::Valid);
}

#[test]
fn test_wrong_digest_or_bad_hex_is_rejected() {
    let v = verifier();
    assert_eq!(
        v.verify_sha1(FOX, "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d8"),
        Verification::Invalid
    );
    assert_eq!(v.verify_sha1(FOX, "sha1=not-hex"), Verification::Invalid);
    assert_eq!(v.verify_sha1(FOX, "sha1="), Verification::Invalid);
    assert_eq!(
        v.verify_sha256(FOX, "sha1=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"),
        Verification::Invalid
    );
}

#[test]
fn test_wrong_secret_is_rejected() {
    let header = SignatureVerifier::new("other").sign_sha1(FOX);
    assert_eq!(verifier().verify_sha1(FOX, &header), Verification::Invalid);
}

#[test]
fn test_delivery_prefers_sha256_header() {
    let v = verifier();
    let delivery = WebhookDelivery {
        body: FOX.to_vec(),
        signature_sha1: Some("sha1=0000".to_string()),
        signature_sha256: Some(v.sign_sha256(FOX)),
        ..WebhookDelivery::default()
    };
    assert!(v.verify(&delivery).is_ok());

    let tampered = WebhookDelivery {
        signature_sha256: Some("sha256=00".to_string()),
        signature_sha1: Some(v.sign_sha1(FOX)),
        ..delivery
    };
    assert!(matches!(
        v.verify(&tampered),
        Err(Rejection::AuthenticationFailed { .. })
    ));
}

#[test]
fn test_delivery_without_signature_is_rejected() {
    let delivery = WebhookDelivery {
        body: FOX.to_vec(),
        ..WebhookDelivery::default()
    };
    assert_eq!(
        verifier().verify(&delivery),
        Err(Rejection::AuthenticationFailed {
            reason: "no signature header".to_string()
        })
    );
}
