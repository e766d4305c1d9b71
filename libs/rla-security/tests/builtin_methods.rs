#![allow(clippy::unwrap_used, clippy::expect_used)]

use rla_security::{ScalarValue, SecurityContext, UserMethodRegistry, UserValue, builtin};
use uuid::Uuid;

#[test]
fn tenant_method_returns_home_tenant() {
    let tenant = Uuid::new_v4();
    let ctx = SecurityContext::builder()
        .subject_id(Uuid::new_v4())
        .subject_tenant_id(tenant)
        .build();

    let method = UserMethodRegistry::with_builtins()
        .bind(builtin::SUBJECT_TENANT_ID)
        .unwrap();
    assert_eq!(
        method.call(&ctx).to_scalar(),
        Some(ScalarValue::Uuid(tenant))
    );
}

#[test]
fn token_scopes_method_returns_list() {
    let ctx = SecurityContext::builder()
        .token_scopes(vec!["read".to_owned(), "write".to_owned()])
        .build();

    let method = UserMethodRegistry::with_builtins()
        .bind(builtin::TOKEN_SCOPES)
        .unwrap();
    let UserValue::List(items) = method.call(&ctx) else {
        panic!("expected list");
    };
    assert_eq!(
        items.iter().filter_map(UserValue::to_scalar).collect::<Vec<_>>(),
        vec![ScalarValue::from("read"), ScalarValue::from("write")]
    );
}

#[test]
fn custom_method_replaces_builtin() {
    let mut registry = UserMethodRegistry::with_builtins();
    registry.register(builtin::SUBJECT_TYPE, |_: &SecurityContext| {
        UserValue::from("robot")
    });

    let method = registry.bind(builtin::SUBJECT_TYPE).unwrap();
    assert_eq!(method.name(), builtin::SUBJECT_TYPE);
    assert_eq!(
        method.call(&SecurityContext::anonymous()).to_scalar(),
        Some(ScalarValue::from("robot"))
    );
}
