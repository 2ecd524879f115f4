mod common;

use storefront_api::{
    dto::auth::{LoginRequest, RegisterRequest},
    error::AppError,
    services::auth_service::{decode_token, issue_token, login_user, me, register_user},
};

fn registration(email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        username: "tester".into(),
        email: email.into(),
        password: password.into(),
    }
}

#[tokio::test]
async fn register_then_login_issues_a_token_for_that_user() -> anyhow::Result<()> {
    let state = common::setup_state().await?;

    let user = register_user(&state, registration("Tester@Example.com", "secret1"))
        .await?
        .into_data()
        .expect("user");
    assert_eq!(user.email, "tester@example.com");
    assert_eq!(user.role, "User");

    let login = login_user(
        &state,
        LoginRequest {
            email: "tester@example.com".into(),
            password: "secret1".into(),
        },
    )
    .await?
    .into_data()
    .expect("login");
    assert_eq!(login.token_type, "Bearer");
    assert_eq!(login.expires_in, 3600);

    let claims = decode_token(&state.jwt, &login.token)?;
    assert_eq!(claims.sub, user.id.to_string());
    assert_eq!(claims.email, "tester@example.com");
    assert_eq!(claims.role, "User");
    assert_eq!(claims.iss, "storefront-api-test");
    Ok(())
}

#[tokio::test]
async fn registration_validates_input_and_rejects_duplicates() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    register_user(&state, registration("dup@example.com", "secret1")).await?;

    let dup = register_user(&state, registration("DUP@example.com", "another1")).await;
    assert!(matches!(dup, Err(AppError::BadRequest(_))));

    let short = register_user(&state, registration("short@example.com", "123")).await;
    assert!(matches!(short, Err(AppError::Validation(_))));

    let no_at = register_user(&state, registration("not-an-email", "secret1")).await;
    assert!(matches!(no_at, Err(AppError::Validation(_))));

    let mut blank = registration("blank@example.com", "secret1");
    blank.username = "   ".into();
    assert!(matches!(
        register_user(&state, blank).await,
        Err(AppError::Validation(_))
    ));
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_unauthorized() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    register_user(&state, registration("real@example.com", "secret1")).await?;

    let wrong = login_user(
        &state,
        LoginRequest {
            email: "real@example.com".into(),
            password: "secret2".into(),
        },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::Unauthorized(_))));

    let unknown = login_user(
        &state,
        LoginRequest {
            email: "ghost@example.com".into(),
            password: "secret1".into(),
        },
    )
    .await;
    assert!(matches!(unknown, Err(AppError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn tokens_from_another_issuer_or_secret_are_rejected() -> anyhow::Result<()> {
    let state = common::setup_state().await?;

    let mut foreign = common::jwt_config();
    foreign.issuer = "someone-else".into();
    let token = issue_token(&foreign, 1, "a@example.com", "User")?;
    assert!(matches!(
        decode_token(&state.jwt, &token),
        Err(AppError::Unauthorized(_))
    ));

    let mut other_secret = common::jwt_config();
    other_secret.secret = "a-completely-different-secret-value-123".into();
    let token = issue_token(&other_secret, 1, "a@example.com", "User")?;
    assert!(matches!(
        decode_token(&state.jwt, &token),
        Err(AppError::Unauthorized(_))
    ));
    Ok(())
}

#[tokio::test]
async fn me_echoes_the_authenticated_identity() -> anyhow::Result<()> {
    let state = common::setup_state().await?;
    let admin = common::admin(&state).await?;

    let identity = me(&admin).into_data().expect("identity");
    assert_eq!(identity.user_id, admin.user_id);
    assert_eq!(identity.email, admin.email);
    assert_eq!(identity.role, "Admin");
    Ok(())
}
