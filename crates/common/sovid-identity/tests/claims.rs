mod common;

use assert_matches::assert_matches;
use common::{account, claim_from, identity_with, TestHost};
use sovid_identity::{
    claim_id, ClaimOutcome, ClaimScheme, DigestVersion, Execution, IdentityError, IdentityEvent, KeyPair,
    KeyType, Purpose,
};

const RESIDENCE: u64 = 2;
const PROFILE: u64 = 4;
const LABEL: u64 = 5;

#[test]
fn self_claim_is_added_and_updated_in_place() {
    let manager = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let first = claim_from(&me, me, &manager, LABEL, b"alice");
    let outcome = identity.add_claim(manager.address, first, &mut host).unwrap();
    let id = claim_id(&me, LABEL);
    assert_eq!(outcome, ClaimOutcome::Added(id));
    assert_eq!(identity.get_claim_ids_by_topic(LABEL), &[id]);

    let second = claim_from(&me, me, &manager, LABEL, b"alice smith");
    assert_eq!(
        identity.add_claim(manager.address, second, &mut host).unwrap(),
        ClaimOutcome::Updated(id)
    );
    assert_eq!(identity.num_claims(), 1);

    let stored = identity.get_claim(&id).unwrap();
    assert_eq!(stored.data, b"alice smith");
    assert_eq!(stored.layout, DigestVersion::V1);
    assert!(stored.is_self_issued(&me));
    assert!(identity
        .events()
        .iter()
        .any(|e| matches!(e, IdentityEvent::ClaimChanged { claim_id, .. } if *claim_id == id)));
}

#[test]
fn invalid_signature_is_rejected() {
    let manager = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let mut claim = claim_from(&me, me, &manager, LABEL, b"alice");
    claim.signature = sovid_crypto::keccak256(b"random").0.to_vec();
    assert_matches!(
        identity.add_claim(manager.address, claim, &mut host),
        Err(IdentityError::InvalidSignature(_))
    );

    // Signed over different data
    let mut claim = claim_from(&me, me, &manager, LABEL, b"alice");
    claim.data = b"mallory".to_vec();
    assert_matches!(
        identity.add_claim(manager.address, claim, &mut host),
        Err(IdentityError::SignerMismatch { .. })
    );

    let mut claim = claim_from(&me, me, &manager, LABEL, b"alice");
    claim.scheme = ClaimScheme::Rsa;
    assert_matches!(
        identity.add_claim(manager.address, claim, &mut host),
        Err(IdentityError::UnsupportedScheme(ClaimScheme::Rsa))
    );
    assert_eq!(identity.num_claims(), 0);
}

#[test]
fn claim_key_signs_and_submits() {
    let manager = KeyPair::generate();
    let claimer = KeyPair::generate();
    let mut identity = identity_with(
        &manager,
        0,
        &[(&manager, Purpose::Management), (&claimer, Purpose::Claim)],
        1,
        1,
    );
    let mut host = TestHost::default();
    let me = identity.address();

    let claim = claim_from(&me, me, &claimer, PROFILE, b"profile");
    assert_matches!(
        identity.add_claim(claimer.address, claim, &mut host),
        Ok(ClaimOutcome::Added(_))
    );
}

#[test]
fn plain_account_issuer_must_sign_its_own_claim() {
    let manager = KeyPair::generate();
    let issuer = KeyPair::generate();
    let impostor = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let forged = claim_from(&me, issuer.address, &impostor, RESIDENCE, b"berlin");
    assert_matches!(
        identity.add_claim(manager.address, forged, &mut host),
        Err(IdentityError::SignerMismatch { signer, .. }) if signer == impostor.address
    );

    let genuine = claim_from(&me, issuer.address, &issuer, RESIDENCE, b"berlin");
    assert_matches!(
        identity.add_claim(manager.address, genuine, &mut host),
        Ok(ClaimOutcome::Added(_))
    );
}

#[test]
fn outsiders_stage_claim_requests() {
    let manager = KeyPair::generate();
    let issuer = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let claim = claim_from(&me, issuer.address, &issuer, RESIDENCE, b"berlin");
    let outcome = identity.add_claim(issuer.address, claim, &mut host).unwrap();
    let ClaimOutcome::Requested { request_id, claim_id } = outcome else {
        panic!("expected a claim request, got {:?}", outcome);
    };
    assert!(identity.get_claim(&claim_id).is_none());
    assert_eq!(identity.nonce(), 1);
    assert!(identity.events().iter().any(|e| matches!(
        e,
        IdentityEvent::ClaimRequested { request_id: r, .. } if *r == request_id
    )));

    let request = identity.get_execution(&request_id).unwrap();
    assert_eq!(request.to, me);
    assert_eq!(request.approval_count(), 0);

    assert_matches!(
        identity.approve(issuer.address, request_id, true, &mut host),
        Err(IdentityError::AuthorizationDenied(_))
    );
    assert_matches!(
        identity.approve(manager.address, request_id, true, &mut host),
        Ok(Execution::Executed { .. })
    );
    assert!(identity.get_claim(&claim_id).is_some());
}

#[test]
fn manager_claims_are_staged_above_threshold() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let mut identity = identity_with(&a, 0, &[(&a, Purpose::Management), (&b, Purpose::Management)], 2, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let claim = claim_from(&me, me, &a, LABEL, b"shared");
    let ClaimOutcome::Requested { request_id, claim_id } = identity.add_claim(a.address, claim, &mut host).unwrap() else {
        panic!("expected a claim request");
    };
    assert!(identity.get_execution(&request_id).unwrap().has_approved(&a.key));

    identity.approve(b.address, request_id, true, &mut host).unwrap();
    assert_eq!(identity.get_claim(&claim_id).unwrap().data, b"shared");
}

#[test]
fn claims_are_removed_by_manager_or_issuer() {
    let manager = KeyPair::generate();
    let issuer = KeyPair::generate();
    let stranger = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let first = claim_from(&me, issuer.address, &issuer, RESIDENCE, b"berlin");
    let second = claim_from(&me, issuer.address, &issuer, PROFILE, b"profile");
    let first_id = identity.add_claim(manager.address, first, &mut host).unwrap().claim_id();
    let second_id = identity.add_claim(manager.address, second, &mut host).unwrap().claim_id();

    assert_matches!(
        identity.remove_claim(stranger.address, first_id, &mut host),
        Err(IdentityError::AuthorizationDenied(_))
    );
    assert_eq!(identity.remove_claim(issuer.address, first_id, &mut host), Ok(true));
    assert_eq!(identity.remove_claim(manager.address, second_id, &mut host), Ok(true));
    assert_eq!(identity.remove_claim(manager.address, second_id, &mut host), Ok(false));
    assert_eq!(identity.num_claims(), 0);
    assert!(identity.get_claim_ids_by_topic(RESIDENCE).is_empty());
}

#[test]
fn refresh_drops_claims_whose_signer_lost_claim_purpose() {
    let manager = KeyPair::generate();
    let claimer = KeyPair::generate();
    let mut identity = identity_with(
        &manager,
        0,
        &[(&manager, Purpose::Management), (&claimer, Purpose::Claim)],
        1,
        1,
    );
    let mut host = TestHost::default();
    let me = identity.address();

    let by_manager = claim_from(&me, me, &manager, LABEL, b"label");
    let by_claimer = claim_from(&me, me, &claimer, PROFILE, b"profile");
    let kept = identity.add_claim(manager.address, by_manager, &mut host).unwrap().claim_id();
    let dropped = identity.add_claim(manager.address, by_claimer, &mut host).unwrap().claim_id();

    assert!(!identity.refresh_claim(kept, &host));
    assert!(!identity.refresh_claim(dropped, &host));

    identity.remove_key(manager.address, claimer.key, Purpose::Claim).unwrap();
    assert!(!identity.refresh_claim(kept, &host));
    assert!(identity.refresh_claim(dropped, &host));
    assert!(identity.get_claim(&dropped).is_none());
    assert!(identity.get_claim(&kept).is_some());
    assert!(!identity.refresh_claim(dropped, &host));
}

#[test]
fn third_party_claims_follow_issuer_keys() {
    let issuer_manager = KeyPair::generate();
    let issuer_claimer = KeyPair::generate();
    let issuer = identity_with(
        &issuer_manager,
        1,
        &[(&issuer_manager, Purpose::Management), (&issuer_claimer, Purpose::Claim)],
        1,
        1,
    );
    let issuer_address = issuer.address();

    let manager = KeyPair::generate();
    let mut identity = identity_with(&manager, 2, &[(&manager, Purpose::Management)], 1, 1);
    let me = identity.address();
    let mut host = TestHost::default();
    host.identities.insert(issuer_address, issuer);

    // A management key of the issuer is not a claim key
    let wrong_key = claim_from(&me, issuer_address, &issuer_manager, RESIDENCE, b"berlin");
    assert_matches!(
        identity.add_claim(manager.address, wrong_key, &mut host),
        Err(IdentityError::SignerMismatch { .. })
    );

    let claim = claim_from(&me, issuer_address, &issuer_claimer, RESIDENCE, b"berlin");
    let id = identity.add_claim(manager.address, claim, &mut host).unwrap().claim_id();
    assert!(!identity.refresh_claim(id, &host));

    // The issuer revokes its claim key
    let issuer = host.identities.get_mut(&issuer_address).unwrap();
    issuer
        .remove_key(issuer_manager.address, issuer_claimer.key, Purpose::Claim)
        .unwrap();
    assert!(identity.refresh_claim(id, &host));
    assert_eq!(identity.num_claims(), 0);
}

#[test]
fn issuer_identity_keys_may_remove_its_claims() {
    let issuer_manager = KeyPair::generate();
    let issuer_actor = KeyPair::generate();
    let issuer = identity_with(
        &issuer_manager,
        1,
        &[
            (&issuer_manager, Purpose::Management),
            (&issuer_manager, Purpose::Claim),
            (&issuer_actor, Purpose::Action),
        ],
        1,
        1,
    );
    let issuer_address = issuer.address();

    let manager = KeyPair::generate();
    let mut identity = identity_with(&manager, 2, &[(&manager, Purpose::Management)], 1, 1);
    let me = identity.address();
    let mut host = TestHost::default();
    host.identities.insert(issuer_address, issuer);

    let claim = claim_from(&me, issuer_address, &issuer_manager, RESIDENCE, b"berlin");
    let id = identity.add_claim(manager.address, claim, &mut host).unwrap().claim_id();

    assert_eq!(identity.remove_claim(issuer_actor.address, id, &mut host), Ok(true));
}

#[test]
fn proxy_claims_need_a_management_signature() {
    let manager = KeyPair::generate();
    let issuer = KeyPair::generate();
    let relayer = account(42);
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let claim = claim_from(&me, issuer.address, &issuer, RESIDENCE, b"berlin");

    let nonce = identity.nonce();
    let by_issuer = issuer.sign_proxy_claim(&me, &claim, nonce).unwrap();
    assert_matches!(
        identity.add_claim_by_proxy(relayer, claim.clone(), nonce, &by_issuer, &mut host),
        Err(IdentityError::SignerMismatch { .. })
    );

    let by_manager = manager.sign_proxy_claim(&me, &claim, nonce).unwrap();
    let mut tampered = claim.clone();
    tampered.uri = "https://elsewhere.example.org".to_string();
    assert_matches!(
        identity.add_claim_by_proxy(relayer, tampered, nonce, &by_manager, &mut host),
        Err(IdentityError::SignerMismatch { .. })
    );

    assert_matches!(
        identity.add_claim_by_proxy(relayer, claim, nonce, &by_manager, &mut host),
        Ok(ClaimOutcome::Added(_))
    );
    assert_eq!(identity.nonce(), nonce + 1);
}

#[test]
fn proxy_authorization_cannot_be_replayed() {
    let manager = KeyPair::generate();
    let issuer = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let claim = claim_from(&me, issuer.address, &issuer, RESIDENCE, b"berlin");
    let nonce = identity.nonce();
    let proxy = manager.sign_proxy_claim(&me, &claim, nonce).unwrap();
    let id = identity
        .add_claim_by_proxy(account(42), claim.clone(), nonce, &proxy, &mut host)
        .unwrap()
        .claim_id();
    assert_eq!(identity.remove_claim(manager.address, id, &mut host), Ok(true));

    // Resubmitting the captured authorization must not restore the claim.
    assert_matches!(
        identity.add_claim_by_proxy(account(99), claim.clone(), nonce, &proxy, &mut host),
        Err(IdentityError::ReplayRejected(_))
    );
    assert_matches!(
        identity.add_claim_by_proxy(account(99), claim, identity.nonce(), &proxy, &mut host),
        Err(IdentityError::SignerMismatch { .. })
    );
    assert_eq!(identity.num_claims(), 0);
    assert!(identity.get_claim(&id).is_none());
}

#[test]
fn proxy_claims_are_staged_above_threshold() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let mut identity = identity_with(&a, 0, &[(&a, Purpose::Management), (&b, Purpose::Management)], 2, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let claim = claim_from(&me, me, &a, LABEL, b"proxied");
    let nonce = identity.nonce();
    let proxy = a.sign_proxy_claim(&me, &claim, nonce).unwrap();
    let outcome = identity
        .add_claim_by_proxy(account(1), claim, nonce, &proxy, &mut host)
        .unwrap();
    let ClaimOutcome::Requested { request_id, claim_id } = outcome else {
        panic!("expected a claim request");
    };
    assert!(identity.get_execution(&request_id).unwrap().has_approved(&a.key));

    identity.approve(b.address, request_id, true, &mut host).unwrap();
    assert!(identity.get_claim(&claim_id).is_some());
}

#[test]
fn genesis_claims_are_verified() {
    let creator = KeyPair::generate();
    let issuer = KeyPair::generate();
    let subject = sovid_identity::Identity::derive_address(&creator.address, 11);

    let good = claim_from(&subject, issuer.address, &issuer, RESIDENCE, b"berlin");
    let config = sovid_identity::GenesisConfig::new(creator.address, 11).with_claim(good);
    let identity = sovid_identity::Identity::genesis(config, &TestHost::default()).unwrap();
    assert_eq!(identity.num_claims(), 1);
    assert_eq!(identity.get_key(&creator.key).unwrap().key_type, KeyType::Ecdsa);

    let forged = claim_from(&subject, issuer.address, &creator, RESIDENCE, b"berlin");
    let config = sovid_identity::GenesisConfig::new(creator.address, 11).with_claim(forged);
    assert!(sovid_identity::Identity::genesis(config, &TestHost::default()).is_err());
}

#[test]
fn stored_claim_keeps_every_field() {
    let manager = KeyPair::generate();
    let issuer = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let mut claim = claim_from(&me, issuer.address, &issuer, PROFILE, b"{\"name\":\"alice\"}");
    claim.uri = "ipfs://profile/alice".to_string();
    let id = identity.add_claim(manager.address, claim.clone(), &mut host).unwrap().claim_id();

    let stored = identity.get_claim(&id).unwrap();
    assert_eq!(stored.id, claim_id(&issuer.address, PROFILE));
    assert_eq!(stored.topic, PROFILE);
    assert_eq!(stored.scheme, ClaimScheme::Ecdsa);
    assert_eq!(stored.issuer, issuer.address);
    assert_eq!(stored.signature, claim.signature);
    assert_eq!(stored.data, claim.data);
    assert_eq!(stored.uri, "ipfs://profile/alice");
}

#[test]
fn uri_can_change_without_resigning() {
    let manager = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    let claim = claim_from(&me, me, &manager, LABEL, b"alice");
    identity.add_claim(manager.address, claim.clone(), &mut host).unwrap();

    let mut moved = claim;
    moved.uri = "https://mirror.example.org/label".to_string();
    let outcome = identity.add_claim(manager.address, moved, &mut host).unwrap();
    assert_matches!(outcome, ClaimOutcome::Updated(_));
    assert_eq!(identity.num_claims(), 1);
    assert_eq!(
        identity.get_claim(&outcome.claim_id()).unwrap().uri,
        "https://mirror.example.org/label"
    );
}

#[test]
fn rejected_claim_leaves_store_unchanged() {
    let manager = KeyPair::generate();
    let stranger = KeyPair::generate();
    let mut identity = identity_with(&manager, 0, &[(&manager, Purpose::Management)], 1, 1);
    let mut host = TestHost::default();
    let me = identity.address();

    identity
        .add_claim(manager.address, claim_from(&me, me, &manager, LABEL, b"alice"), &mut host)
        .unwrap();
    let before = identity.get_claim(&claim_id(&me, LABEL)).unwrap().clone();

    // Same topic and issuer, signed by a key the identity does not hold.
    let forged = claim_from(&me, me, &stranger, LABEL, b"mallory");
    assert_matches!(
        identity.add_claim(manager.address, forged, &mut host),
        Err(IdentityError::SignerMismatch { .. })
    );
    assert_eq!(identity.num_claims(), 1);
    assert_eq!(identity.get_claim(&claim_id(&me, LABEL)), Some(&before));
}
