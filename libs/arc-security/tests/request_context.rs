#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Instant;

use arc_security::{
    Category, ContextError, ContextKey, Credential, CredentialTag, Permission, RequestContext,
    TenantDomain, User,
};

#[test]
fn missing_slots_report_their_key() {
    let ctx = RequestContext::new(Instant::now());
    assert_eq!(
        ctx.category(),
        Err(ContextError::Missing(ContextKey::Category))
    );
    assert_eq!(
        ctx.domain().unwrap_err(),
        ContextError::Missing(ContextKey::Domain)
    );
    assert_eq!(
        ctx.credential_tag(),
        Err(ContextError::Missing(ContextKey::CredentialTag))
    );
    assert!(ctx.rs_query().is_empty());
}

#[test]
fn slots_are_write_once() {
    let mut ctx = RequestContext::new(Instant::now());
    ctx.set_category(Category::Docs).unwrap();
    assert_eq!(
        ctx.set_category(Category::Search),
        Err(ContextError::AlreadySet(ContextKey::Category))
    );
    assert_eq!(ctx.category().unwrap(), Category::Docs);
}

#[test]
fn credential_variant_decides_user_or_permission_slot() {
    let mut ctx = RequestContext::new(Instant::now());
    ctx.set_domain(TenantDomain::new("acme.io", Some("ff00".to_owned())))
        .unwrap();
    ctx.set_credential(Credential::from(Permission::new("key", "secret", "foo")))
        .unwrap();

    assert_eq!(ctx.credential_tag().unwrap(), CredentialTag::Permission);
    assert_eq!(ctx.permission().unwrap().username, "key");
    assert_eq!(
        ctx.user().unwrap_err(),
        ContextError::Missing(ContextKey::User)
    );
    assert_eq!(ctx.domain().unwrap().encrypted(), Some("ff00"));
}

#[test]
fn applied_middlewares_keep_order() {
    let mut ctx = RequestContext::new(Instant::now());
    ctx.record_middleware("classify");
    ctx.record_middleware("auth");
    assert_eq!(ctx.applied_middlewares(), &["classify", "auth"]);
}

#[test]
fn admin_user_credential() {
    let mut user = User::new("foo", "hash");
    user.is_admin = true;
    let cred = Credential::from(user);
    assert!(cred.is_admin());
    assert_eq!(cred.username(), "foo");
    assert!(cred.has_category(Category::Auth));
}

#[test]
fn pipelines_gate_permissions_only() {
    let mut ctx = RequestContext::new(Instant::now());
    assert_eq!(
        ctx.pipelines().unwrap_err(),
        ContextError::Missing(ContextKey::Pipelines)
    );
    ctx.set_pipelines(vec!["allowed-1".to_owned()]).unwrap();
    assert_eq!(ctx.pipelines().unwrap(), ["allowed-1"]);

    let mut permission = Permission::new("key", "secret", "foo");
    permission.pipelines = vec![arc_security::IndexPattern::new("allowed-*").unwrap()];
    let cred = Credential::from(permission);
    assert!(cred.can_access_pipeline("allowed-1"));
    assert!(!cred.can_access_pipeline("secret"));
    assert!(Credential::from(User::new("u", "h")).can_access_pipeline("secret"));
}
