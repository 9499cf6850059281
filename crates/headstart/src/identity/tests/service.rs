use super::common::*;
use crate::identity::provider::IdentityError;
use crate::identity::provider::IdentityUser;
use crate::identity::service::{is_strong_password, profile_from_identity};
use crate::identity::{AuthServiceError, IdentityProvider, MEMBER_GROUP};
use crate::profiles::domain::{IdeaStatus, IdentitySubject, UserProfile};
use crate::profiles::repository::ProfileRepository;

fn invalid_message(err: AuthServiceError) -> String {
    match err {
        AuthServiceError::Invalid(message) => message,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[tokio::test]
async fn registration_input_is_validated_before_the_provider() {
    let h = harness();
    let cases = [
        ("", PASSWORD, "Email is required"),
        ("a@x.com", "", "Password is required"),
        ("not-an-email", PASSWORD, "Please provide a valid email address"),
    ];
    for (email, password, expected) in cases {
        let err = h
            .service
            .register(email, password, None)
            .await
            .expect_err("rejected");
        assert_eq!(invalid_message(err), expected);
    }

    let err = h
        .service
        .register("a@x.com", "password1", None)
        .await
        .expect_err("weak password");
    assert!(invalid_message(err).starts_with("Password must be at least 8 characters"));
    assert!(h.provider.lookup_user("a@x.com").await.expect("lookup").is_none());
}

#[test]
fn password_strength_rules() {
    assert!(is_strong_password("P@ssw0rd1"));
    assert!(!is_strong_password("P@ss0rd"));
    assert!(!is_strong_password("passw0rd!"));
    assert!(!is_strong_password("PASSW0RD!"));
    assert!(!is_strong_password("Password!"));
    assert!(!is_strong_password("Passw0rd#"));
}

#[tokio::test]
async fn duplicate_registration_surfaces_provider_error() {
    let h = harness();
    h.service
        .register("dup@example.com", PASSWORD, None)
        .await
        .expect("first registration");
    let err = h
        .service
        .register("dup@example.com", PASSWORD, None)
        .await
        .expect_err("second registration");
    assert!(matches!(
        err,
        AuthServiceError::Provider(IdentityError::UserExists)
    ));
}

#[tokio::test]
async fn verification_confirms_and_creates_the_profile() {
    let h = harness();
    let outcome = h
        .service
        .register("jo@example.com", PASSWORD, Some("  Jo  "))
        .await
        .expect("register");
    assert!(!outcome.user_confirmed);
    assert!(h.repository.all().is_empty());

    let code = h
        .provider
        .pending_confirmation_code("jo@example.com")
        .expect("code issued");
    let profile = h
        .service
        .verify("jo@example.com", &code)
        .await
        .expect("verified")
        .expect("profile resolved");

    assert_eq!(profile.name, "Jo");
    assert_eq!(profile.identity_id.0, outcome.user_sub);
    assert_eq!(profile.groups, [MEMBER_GROUP]);
    assert_eq!(h.repository.all().len(), 1);
}

#[tokio::test]
async fn verification_rejects_missing_and_wrong_codes() {
    let h = harness();
    h.service
        .register("jo@example.com", PASSWORD, None)
        .await
        .expect("register");

    let err = h
        .service
        .verify("jo@example.com", " ")
        .await
        .expect_err("missing code");
    assert_eq!(
        invalid_message(err),
        "Email and verification code are required"
    );

    let err = h
        .service
        .verify("jo@example.com", "not-the-code")
        .await
        .expect_err("wrong code");
    assert!(matches!(
        err,
        AuthServiceError::Provider(IdentityError::InvalidCode)
    ));
    assert!(h.repository.all().is_empty());
}

#[tokio::test]
async fn login_with_bad_credentials_is_rejected_uniformly() {
    let h = harness();
    h.confirmed_account("sam@example.com").await;
    h.service
        .register("pending@example.com", PASSWORD, None)
        .await
        .expect("register");

    for (email, password) in [
        ("sam@example.com", "Wr0ng!pass"),
        ("nobody@example.com", PASSWORD),
        ("pending@example.com", PASSWORD),
    ] {
        let err = h
            .service
            .login(email, password)
            .await
            .expect_err("rejected");
        assert!(matches!(err, AuthServiceError::InvalidCredentials));
        assert_eq!(err.to_string(), "Invalid credentials");
    }
}

#[tokio::test]
async fn first_login_creates_a_default_profile() {
    let h = harness();
    h.confirmed_account("sam@example.com").await;

    let outcome = h
        .service
        .login("sam@example.com", PASSWORD)
        .await
        .expect("login");

    let profile = outcome.profile;
    assert_eq!(profile.name, "sam");
    assert_eq!(profile.idea_status, Some(IdeaStatus::FewIdeas));
    assert!(profile.skills.is_empty());
    assert!(profile.last_login.is_some());
    assert_eq!(profile.contact.email.as_deref(), Some("sam@example.com"));
    assert!(!outcome.tokens.access_token.is_empty());
    assert_eq!(h.repository.all(), vec![profile]);
}

#[tokio::test]
async fn login_rebinds_a_profile_found_by_contact_email() {
    let h = harness();
    let legacy = UserProfile::new(IdentitySubject("old-subject".to_string()), "legacy@example.com");
    let legacy = h.repository.insert(legacy).expect("seed");
    h.confirmed_account("legacy@example.com").await;

    let outcome = h
        .service
        .login("legacy@example.com", PASSWORD)
        .await
        .expect("login");

    assert_eq!(outcome.profile.id, legacy.id);
    assert_ne!(outcome.profile.identity_id, legacy.identity_id);
    let claims = h
        .provider
        .verify_access_token(&outcome.tokens.access_token)
        .await
        .expect("token verifies");
    assert_eq!(outcome.profile.identity_id, claims.subject);
    assert_eq!(h.repository.all().len(), 1);
}

#[tokio::test]
async fn later_logins_refresh_provider_attributes() {
    let h = harness();
    h.confirmed_account("sam@example.com").await;
    let first = h
        .service
        .login("sam@example.com", PASSWORD)
        .await
        .expect("first login");

    h.provider
        .set_attribute("sam@example.com", "custom:skills", "Finances, Sales/Marketing,")
        .expect("skills");
    h.provider
        .set_attribute("sam@example.com", "custom:slack", "@sam")
        .expect("slack");
    h.provider
        .add_to_group("sam@example.com", "Admins")
        .await
        .expect("group");

    let second = h
        .service
        .login("sam@example.com", PASSWORD)
        .await
        .expect("second login")
        .profile;

    assert_eq!(second.id, first.profile.id);
    assert_eq!(second.skills, ["Finances", "Sales/Marketing"]);
    assert_eq!(second.contact.slack.as_deref(), Some("@sam"));
    assert_eq!(second.groups, ["Admins"]);
    assert_eq!(h.repository.all(), vec![second]);
}

#[test]
fn provider_attributes_are_cut_before_escaping() {
    let user = IdentityUser {
        subject: IdentitySubject("sub-r-and-d".to_string()),
        attributes: [
            (
                "preferred_username".to_string(),
                format!("{}R&D team", "a".repeat(47)),
            ),
            (
                "custom:skills".to_string(),
                format!("{}&, Finances", "s".repeat(49)),
            ),
        ]
        .into_iter()
        .collect(),
        groups: Vec::new(),
    };

    let profile = profile_from_identity("r@example.com", &user);
    assert_eq!(profile.name, format!("{}R&amp;D", "a".repeat(47)));
    assert_eq!(profile.skills, [format!("{}&amp;", "s".repeat(49)), "Finances".to_string()]);
}

#[tokio::test]
async fn forgot_password_never_reveals_accounts() {
    let h = harness();
    h.service
        .forgot_password("ghost@example.com")
        .await
        .expect("unknown address accepted");

    let err = h
        .service
        .forgot_password("  ")
        .await
        .expect_err("blank address");
    assert_eq!(invalid_message(err), "Email is required");
}

#[tokio::test]
async fn reset_password_replaces_the_credential() {
    let h = harness();
    h.confirmed_account("sam@example.com").await;

    let err = h
        .service
        .reset_password("sam@example.com", "", "N3w!passw0rd")
        .await
        .expect_err("missing code");
    assert_eq!(
        invalid_message(err),
        "Email, code, and new password are required"
    );

    h.service
        .forgot_password("sam@example.com")
        .await
        .expect("requested");
    let code = h
        .provider
        .pending_reset_code("sam@example.com")
        .expect("reset code");
    h.service
        .reset_password("sam@example.com", &code, "N3w!passw0rd")
        .await
        .expect("reset");

    assert!(h.service.login("sam@example.com", PASSWORD).await.is_err());
    h.service
        .login("sam@example.com", "N3w!passw0rd")
        .await
        .expect("login with new password");
}

#[test]
fn me_requires_a_stored_profile() {
    let h = harness();
    let err = h
        .service
        .me(&IdentitySubject("unknown".to_string()))
        .expect_err("absent");
    assert!(matches!(err, AuthServiceError::NotFound));
}
