//! Aliases are stable 8-char hex keys derived from the subject name.

mod common;

use certgate::alias::alias_for_subject;
use certgate::cert::Certificate;

// SEQUENCE { SET { SEQUENCE { OID 2.5.4.3, UTF8String "habpanel.local" } } }
const HABPANEL_SUBJECT: &str = "30193117301506035504030c0e68616270616e656c2e6c6f63616c";

#[test]
fn fixed_subject_has_fixed_alias() {
    let subject = hex::decode(HABPANEL_SUBJECT).unwrap();
    assert_eq!(alias_for_subject(&subject), "6c6615e9");
    assert_eq!(alias_for_subject(&subject), alias_for_subject(&subject));
}

#[test]
fn certificate_alias_uses_raw_subject() {
    let c = common::self_signed("habpanel.local", &["habpanel.local"]);
    let cert = Certificate::from_der(c.der.clone()).unwrap();
    assert_eq!(cert.subject_der(), hex::decode(HABPANEL_SUBJECT).unwrap());
    assert_eq!(cert.alias(), "6c6615e9");
}

#[test]
fn pem_and_der_give_same_alias() {
    let c = common::self_signed("panel.test", &["panel.test"]);
    let from_der = Certificate::from_bytes(&c.der).unwrap();
    let from_pem = Certificate::from_bytes(c.pem.as_bytes()).unwrap();
    assert_eq!(from_der.alias(), from_pem.alias());
    assert_eq!(from_der.der(), from_pem.der());
}

#[test]
fn same_subject_different_keys_collide() {
    let a = common::self_signed("panel.test", &["panel.test"]);
    let b = common::self_signed("panel.test", &["panel.test"]);
    assert_ne!(a.der, b.der);
    let a = Certificate::from_der(a.der).unwrap();
    let b = Certificate::from_der(b.der).unwrap();
    assert_eq!(a.alias(), b.alias());
}
