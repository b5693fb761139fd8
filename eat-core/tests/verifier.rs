//! End-to-end verification scenarios.

use eat::token::unix_now;
use eat::{
    AccessToken, AccessTokenVerifier, Address, Domain, Error, FunctionCall, MemoryReplayGuard,
    ReplayStore, Selector, SigningKey, VerifierConfig,
};
use std::sync::Arc;

struct Setup {
    verifier: AccessTokenVerifier,
    issuer: SigningKey,
    intermediate: SigningKey,
}

fn setup() -> Setup {
    let root = SigningKey::generate();
    let intermediate = SigningKey::generate();
    let issuer = SigningKey::generate();

    let verifier = AccessTokenVerifier::new(
        Domain::access_token(31337, Address::from_bytes([0x5f; 20])),
        root.address(),
    );
    verifier
        .rotate_intermediate(&root.address(), intermediate.address())
        .unwrap();
    verifier
        .activate_issuers(&intermediate.address(), &[issuer.address()])
        .unwrap();

    Setup {
        verifier,
        issuer,
        intermediate,
    }
}

fn token(caller: Address, expiry: u64) -> AccessToken {
    AccessToken::new(
        expiry,
        FunctionCall {
            function_signature: Selector::from_bytes([0xde, 0xad, 0xbe, 0xef]),
            target: Address::from_bytes([0x11; 20]),
            caller,
            parameters: vec![0xff],
        },
    )
}

#[test]
fn consume_once_then_replay_then_swapped_caller() {
    let s = setup();
    let caller = Address::from_bytes([0xcc; 20]);
    let t = token(caller, unix_now() + 10);
    let sig = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();

    assert!(s.verifier.verify(&t, &sig).unwrap());
    s.verifier.verify_and_consume(&t, &sig).unwrap();

    let replay = s.verifier.verify_and_consume(&t, &sig).unwrap_err();
    assert_eq!(replay, Error::AlreadyUsed);
    assert_eq!(replay.to_string(), "AccessToken: already used");

    // Same signature presented by another caller.
    let mut swapped = t.clone();
    swapped.function_call.caller = Address::from_bytes([0xcd; 20]);
    let err = s.verifier.verify_and_consume(&swapped, &sig).unwrap_err();
    assert_eq!(err, Error::VerificationFailure);
    assert_eq!(err.to_string(), "AccessToken: verification failure");
}

#[test]
fn expiry_boundary() {
    let s = setup();
    let t = token(Address::from_bytes([0xcc; 20]), 5_000);
    let sig = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();

    assert!(s.verifier.verify_at(&t, &sig, 5_000).unwrap());
    let err = s.verifier.verify_at(&t, &sig, 5_001).unwrap_err();
    assert_eq!(err.to_string(), "AccessToken: has expired");

    assert_eq!(
        s.verifier.verify_and_consume_at(&t, &sig, 5_001),
        Err(Error::Expired {
            expiry: 5_000,
            now: 5_001
        })
    );
    s.verifier.verify_and_consume_at(&t, &sig, 5_000).unwrap();
}

#[test]
fn expired_token_never_consumed() {
    let s = setup();
    let t = token(Address::from_bytes([0xcc; 20]), 10);
    let sig = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();

    assert!(s.verifier.verify_and_consume_at(&t, &sig, 11).is_err());
    assert!(!s.verifier.is_consumed(&t, &sig));
}

#[test]
fn signer_fidelity() {
    let s = setup();
    let other = SigningKey::generate();
    let t = token(Address::from_bytes([0xcc; 20]), 10);

    let sig = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();
    assert_eq!(s.verifier.verify_signer_of(&t, &sig).unwrap(), s.issuer.address());

    let other_sig = other.sign_token(s.verifier.domain(), &t).unwrap();
    let recovered = s.verifier.verify_signer_of(&t, &other_sig).unwrap();
    assert_eq!(recovered, other.address());
    assert_ne!(recovered, s.issuer.address());

    // Recovery ignores expiry and membership entirely.
    assert!(!s.verifier.verify_at(&t, &other_sig, 0).unwrap());
}

#[test]
fn binding_exactness() {
    let s = setup();
    let t = token(Address::from_bytes([0xcc; 20]), 1_000);
    let sig = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();

    type Mutation = Box<dyn Fn(&mut AccessToken)>;
    let mutations: Vec<Mutation> = vec![
        Box::new(|t: &mut AccessToken| t.expiry += 1),
        Box::new(|t: &mut AccessToken| {
            t.function_call.function_signature = Selector::from_bytes([0, 0, 0, 0])
        }),
        Box::new(|t: &mut AccessToken| t.function_call.target = Address::from_bytes([0x12; 20])),
        Box::new(|t: &mut AccessToken| t.function_call.caller = Address::from_bytes([0xce; 20])),
        Box::new(|t: &mut AccessToken| t.function_call.parameters = vec![0xfe]),
        Box::new(|t: &mut AccessToken| t.function_call.parameters.push(0)),
        Box::new(|t: &mut AccessToken| t.function_call.parameters.clear()),
    ];

    for mutate in &mutations {
        let mut altered = t.clone();
        mutate(&mut altered);
        assert_eq!(
            s.verifier.verify_and_consume_at(&altered, &sig, 0),
            Err(Error::VerificationFailure)
        );
    }

    // The untouched token still works afterwards.
    s.verifier.verify_and_consume_at(&t, &sig, 0).unwrap();
}

#[test]
fn token_bound_to_one_verifier() {
    let s = setup();
    let t = token(Address::from_bytes([0xcc; 20]), 1_000);
    let sig = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();

    // Identical key state, different endpoint identity.
    let root = SigningKey::generate();
    let elsewhere = AccessTokenVerifier::new(
        Domain::access_token(31337, Address::from_bytes([0x60; 20])),
        root.address(),
    );
    elsewhere
        .rotate_intermediate(&root.address(), s.intermediate.address())
        .unwrap();
    elsewhere
        .activate_issuers(&s.intermediate.address(), &[s.issuer.address()])
        .unwrap();

    assert_eq!(
        elsewhere.verify_and_consume_at(&t, &sig, 0),
        Err(Error::VerificationFailure)
    );
}

#[test]
fn malformed_signatures() {
    let s = setup();
    let t = token(Address::from_bytes([0xcc; 20]), 1_000);
    let good = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();

    let mut bad_v = good;
    bad_v.v = 26;
    assert_eq!(
        s.verifier.verify_and_consume_at(&t, &bad_v, 0),
        Err(Error::InvalidSignatureV(26))
    );

    let mut high_s = good;
    high_s.s = [0xff; 32];
    assert_eq!(
        s.verifier.verify_and_consume_at(&t, &high_s, 0),
        Err(Error::InvalidSignatureS)
    );

    let mut zero_r = good;
    zero_r.r = [0; 32];
    assert_eq!(
        s.verifier.verify_and_consume_at(&t, &zero_r, 0),
        Err(Error::InvalidSignature)
    );

    // Flipping v gives a valid-looking signature by someone else.
    let mut flipped = good;
    flipped.v = if good.v == 27 { 28 } else { 27 };
    assert!(matches!(
        s.verifier.verify_and_consume_at(&t, &flipped, 0),
        Err(Error::VerificationFailure) | Err(Error::InvalidSignature)
    ));
}

#[test]
fn revoked_issuer_tokens_stop_working() {
    let s = setup();
    let t = token(Address::from_bytes([0xcc; 20]), 1_000);
    let sig = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();
    assert!(s.verifier.verify_at(&t, &sig, 0).unwrap());

    s.verifier
        .deactivate_issuers(&s.intermediate.address(), &[s.issuer.address()])
        .unwrap();
    assert!(!s.verifier.verify_at(&t, &sig, 0).unwrap());

    s.verifier
        .activate_issuers(&s.intermediate.address(), &[s.issuer.address()])
        .unwrap();
    s.verifier.verify_and_consume_at(&t, &sig, 0).unwrap();
}

#[test]
fn concurrent_consumption_has_one_winner() {
    let s = setup();
    let t = token(Address::from_bytes([0xcc; 20]), 1_000);
    let sig = s.issuer.sign_token(s.verifier.domain(), &t).unwrap();
    let verifier = Arc::new(s.verifier);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let verifier = Arc::clone(&verifier);
            let t = t.clone();
            std::thread::spawn(move || verifier.verify_and_consume_at(&t, &sig, 0))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| *r == Err(Error::AlreadyUsed)));
}

#[test]
fn shared_replay_store() {
    // Two verifier handles over one store see each other's consumptions.
    let store: Arc<dyn ReplayStore> = Arc::new(MemoryReplayGuard::new());
    let root = SigningKey::generate();
    let intermediate = SigningKey::generate();
    let issuer = SigningKey::generate();
    let domain = Domain::access_token(1, Address::from_bytes([0x5f; 20]));

    let make = || {
        let v = AccessTokenVerifier::with_replay_store(
            domain.clone(),
            root.address(),
            Arc::clone(&store),
        );
        v.rotate_intermediate(&root.address(), intermediate.address())
            .unwrap();
        v.activate_issuers(&intermediate.address(), &[issuer.address()])
            .unwrap();
        v
    };
    let a = make();
    let b = make();

    let t = token(Address::from_bytes([0xcc; 20]), 1_000);
    let sig = issuer.sign_token(&domain, &t).unwrap();
    a.verify_and_consume_at(&t, &sig, 0).unwrap();
    assert!(b.is_consumed(&t, &sig));
    assert_eq!(b.verify_and_consume_at(&t, &sig, 0), Err(Error::AlreadyUsed));
    assert_eq!(store.len(), 1);
}

#[test]
fn bootstrap_from_config() {
    let root = SigningKey::generate();
    let intermediate = SigningKey::generate();
    let issuer = SigningKey::generate();
    let yaml = format!(
        r#"
domain:
  chain_id: 31337
  verifying_contract: "0x5fbdb2315678afecb367f032d93f642f64180aa3"
keys:
  root: "{}"
  intermediate: "{}"
  issuers:
    - "{}"
"#,
        root.address(),
        intermediate.address(),
        issuer.address()
    );

    let config = VerifierConfig::from_yaml(&yaml).unwrap();
    let v = AccessTokenVerifier::from_config(&config).unwrap();
    assert_eq!(v.root_key(), root.address());
    assert_eq!(v.intermediate_key(), intermediate.address());
    assert_eq!(v.active_issuers(), vec![issuer.address()]);

    let t = token(Address::from_bytes([0xcc; 20]), 1_000);
    let sig = issuer.sign_token(v.domain(), &t).unwrap();
    v.verify_and_consume_at(&t, &sig, 0).unwrap();
}

#[test]
fn config_issuers_without_intermediate() {
    let yaml = r#"
domain:
  chain_id: 1
  verifying_contract: "0x5fbdb2315678afecb367f032d93f642f64180aa3"
keys:
  root: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
  issuers:
    - "0x3c44cdddb6a900fa2b585dd299e03d12fa4293bc"
"#;
    let config = VerifierConfig::from_yaml(yaml).unwrap();
    assert!(matches!(
        AccessTokenVerifier::from_config(&config),
        Err(Error::InvalidConfiguration(_))
    ));
}
