//! Regression coverage for user value types.

use super::*;
use rstest::rstest;
use serde_json::json;

const ALICE_ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";

fn alice() -> User {
    User::new(
        UserId::new(ALICE_ID).expect("fixture id"),
        DisplayName::new("Alice Mushi").expect("fixture name"),
        Role::Client,
        SessionToken::new("token-1"),
    )
    .with_email("alice@x.com")
}

#[rstest]
#[case("", UserValidationError::EmptyId)]
#[case("not-a-uuid", UserValidationError::InvalidId)]
#[case(" 3fa85f64-5717-4562-b3fc-2c963f66afa6", UserValidationError::InvalidId)]
fn rejects_invalid_user_ids(#[case] raw: &str, #[case] expected: UserValidationError) {
    assert_eq!(UserId::new(raw).expect_err("invalid id"), expected);
}

#[rstest]
#[case("   ", UserValidationError::EmptyDisplayName)]
#[case("Bad\u{7}Name", UserValidationError::DisplayNameControlCharacters)]
fn rejects_invalid_display_names(#[case] raw: &str, #[case] expected: UserValidationError) {
    assert_eq!(DisplayName::new(raw).expect_err("invalid name"), expected);
}

#[rstest]
fn display_name_is_trimmed_and_allows_apostrophes() {
    let name = DisplayName::new("  Ng'wana Juma-Said ").expect("valid name");
    assert_eq!(name.as_ref(), "Ng'wana Juma-Said");
}

#[rstest]
fn display_name_length_is_bounded() {
    let long = "a".repeat(DISPLAY_NAME_MAX + 1);
    assert_eq!(
        DisplayName::new(long).expect_err("too long"),
        UserValidationError::DisplayNameTooLong {
            max: DISPLAY_NAME_MAX
        }
    );
}

#[rstest]
#[case("alice@x.com", "alice@x.com", true)]
#[case("  BOB@Example.COM ", "bob@example.com", true)]
#[case("+255 712 345 678", "+255712345678", false)]
#[case("0712-345-678", "0712345678", false)]
fn normalises_identifiers(#[case] raw: &str, #[case] expected: &str, #[case] is_email: bool) {
    let identifier = Identifier::parse(raw).expect("valid identifier");
    assert_eq!(identifier.as_ref(), expected);
    assert_eq!(identifier.is_email(), is_email);
}

#[rstest]
#[case("", UserValidationError::EmptyIdentifier)]
#[case("alice@", UserValidationError::InvalidEmail)]
#[case("12ab", UserValidationError::InvalidPhone)]
#[case("1234", UserValidationError::InvalidPhone)]
fn rejects_invalid_identifiers(#[case] raw: &str, #[case] expected: UserValidationError) {
    assert_eq!(Identifier::parse(raw).expect_err("invalid"), expected);
}

#[rstest]
fn email_constructor_rejects_phone_numbers() {
    assert_eq!(
        Identifier::email("+255712345678").expect_err("phone is not email"),
        UserValidationError::InvalidEmail
    );
}

#[rstest]
#[case("client", Role::Client)]
#[case(" Broker ", Role::Broker)]
fn parses_roles(#[case] raw: &str, #[case] expected: Role) {
    assert_eq!(raw.parse::<Role>().expect("valid role"), expected);
}

#[rstest]
fn role_landing_paths() {
    assert_eq!(Role::Client.landing_path(), "/");
    assert_eq!(Role::Broker.landing_path(), "/dashboard");
}

#[rstest]
fn session_token_debug_is_redacted() {
    let token = SessionToken::new("super-secret");
    assert!(!format!("{token:?}").contains("super-secret"));
}

#[rstest]
fn random_tokens_differ() {
    assert_ne!(SessionToken::random(), SessionToken::random());
}

#[rstest]
fn user_serialises_with_camel_case_keys() {
    let value = serde_json::to_value(alice()).expect("serialise user");
    assert_eq!(
        value,
        json!({
            "id": ALICE_ID,
            "displayName": "Alice Mushi",
            "email": "alice@x.com",
            "role": "client",
            "token": "token-1",
        })
    );
}

#[rstest]
fn user_accepts_legacy_name_field() {
    let user: User = serde_json::from_value(json!({
        "id": ALICE_ID,
        "name": "Alice Mushi",
        "role": "broker",
        "token": "t",
    }))
    .expect("legacy payload");
    assert_eq!(user.role(), Role::Broker);
    assert_eq!(user.display_name().as_ref(), "Alice Mushi");
}

#[rstest]
fn with_role_changes_only_the_role() {
    let broker = alice().with_role(Role::Broker);
    assert_eq!(broker.role(), Role::Broker);
    assert_eq!(broker.email(), Some("alice@x.com"));
}
