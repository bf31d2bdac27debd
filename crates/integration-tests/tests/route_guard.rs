//! Route guard decisions against sessions produced by the real manager.

#![allow(clippy::unwrap_used)]

use pharmadesk_core::UserRole;
use pharmadesk_integration_tests::TestContext;
use pharmadesk_session::routes::{self, post_login_target, redirect_from_query};
use pharmadesk_session::{Credentials, GuardDecision, Requirement, RouteGuard};

const PHARMACIST: &str = "pharmacist@example.com";
const PASSWORD: &str = "pill-counter";

async fn signed_in_pharmacist() -> TestContext {
    let ctx = TestContext::new().await;
    ctx.api.add_account(PHARMACIST, PASSWORD, UserRole::Pharmacist);
    ctx.manager.rehydrate();
    ctx.manager
        .login(Credentials::new(PHARMACIST, PASSWORD).unwrap())
        .await
        .unwrap();
    ctx
}

#[tokio::test]
async fn test_guard_waits_for_rehydration() {
    let ctx = TestContext::new().await;
    let guard = RouteGuard::authenticated();

    assert_eq!(
        guard.evaluate(&ctx.manager.snapshot(), "/customer/orders"),
        GuardDecision::Pending
    );

    ctx.manager.rehydrate();

    assert_eq!(
        guard.evaluate(&ctx.manager.snapshot(), "/customer/orders"),
        GuardDecision::Redirect {
            to: "/login?redirect=%2Fcustomer%2Forders".to_string()
        }
    );
}

#[tokio::test]
async fn test_signed_in_role_is_allowed() {
    let ctx = signed_in_pharmacist().await;
    let session = ctx.manager.snapshot();

    assert_eq!(
        RouteGuard::role(UserRole::Pharmacist).evaluate(&session, "/pharmacist/queue"),
        GuardDecision::Allow
    );
    let staff = RouteGuard::new(Requirement::AnyRole(vec![
        UserRole::Pharmacist,
        UserRole::PharmacyAdmin,
    ]));
    assert_eq!(staff.evaluate(&session, "/pharmacy/stock"), GuardDecision::Allow);
}

#[tokio::test]
async fn test_wrong_role_goes_to_login_with_return_path() {
    let ctx = signed_in_pharmacist().await;
    let session = ctx.manager.snapshot();

    let decision = RouteGuard::role(UserRole::Admin).evaluate(&session, "/admin/users?page=2");

    let GuardDecision::Redirect { to } = decision else {
        panic!("expected redirect, got {decision:?}");
    };
    let (login, query) = to.split_once('?').unwrap();
    assert_eq!(login, routes::ADMIN_LOGIN);
    assert_eq!(
        redirect_from_query(query).as_deref(),
        Some("/admin/users?page=2")
    );
}

#[tokio::test]
async fn test_logout_revokes_access() {
    let ctx = signed_in_pharmacist().await;
    let guard = RouteGuard::role(UserRole::Pharmacist);

    ctx.manager.logout().await;

    assert!(matches!(
        guard.evaluate(&ctx.manager.snapshot(), "/pharmacist"),
        GuardDecision::Redirect { .. }
    ));
}

#[tokio::test]
async fn test_landing_page_after_login() {
    let ctx = signed_in_pharmacist().await;
    let role = ctx.manager.snapshot().role().unwrap();

    assert_eq!(
        post_login_target(role, Some("/pharmacist/prescriptions/7")),
        "/pharmacist/prescriptions/7"
    );
    assert_eq!(post_login_target(role, Some("/customer/cart")), "/pharmacist");
    assert_eq!(post_login_target(role, None), "/pharmacist");
}
