//! Parameter resolution integration tests
//!
//! Tests for how a vault finds its bucket, key and region:
//! - Stack outputs as the default source
//! - Explicit overrides and their precedence
//! - Failures raised before any KMS or storage traffic

mod common;

use std::sync::Arc;

use common::*;
use strongbox_vault::config::{BUCKET_OUTPUT, KEY_OUTPUT};
use strongbox_vault::memory::MemoryStacks;
use strongbox_vault::{
    AmbientSettings, BackendError, ConfigError, Credentials, OperationContext, RetryPolicy, Vault,
    VaultError, VaultOverrides,
};

const OTHER_KEY: &str = "arn:aws:kms:eu-west-1:111122223333:key/9a8b7c6d";

fn assert_no_backend_traffic(fixture: &Fixture) {
    assert_eq!(fixture.kms.generate_calls(), 0);
    assert_eq!(fixture.kms.decrypt_calls(), 0);
    assert_eq!(fixture.store.total_calls(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Stack outputs
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_default_stack_supplies_bucket_and_key() {
    let fixture = Fixture::new();
    let vault = fixture.connect(&VaultOverrides::new()).await.unwrap();

    let info = vault.stack_info();
    assert_eq!(info.stack_name, "vault");
    assert_eq!(info.bucket, BUCKET);
    assert_eq!(info.key_arn, KEY_ARN);
    assert_eq!(vault.config().region(), REGION);
    assert_eq!(fixture.stacks.describe_calls(), 1);
}

#[tokio::test]
async fn test_named_stack() {
    let fixture = Fixture::new();
    fixture.stacks.add_stack(
        "team-vault",
        [(BUCKET_OUTPUT, "team-bucket"), (KEY_OUTPUT, OTHER_KEY)],
    );

    let vault = fixture
        .connect(&VaultOverrides::new().with_stack_name("team-vault"))
        .await
        .unwrap();

    assert_eq!(vault.config().bucket(), "team-bucket");
    assert_eq!(vault.config().key_arn(), OTHER_KEY);
}

#[tokio::test]
async fn test_stack_info_display() {
    let fixture = Fixture::new();
    let vault = fixture.vault("").await;

    let text = vault.stack_info().to_string();
    assert!(text.contains("stack: vault"));
    assert!(text.contains(&format!("bucket: {BUCKET}")));
    assert!(text.contains(&format!("key: {KEY_ARN}")));
}

// ═══════════════════════════════════════════════════════════════════════════
// Overrides
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_key_override_beats_stack_output() {
    let fixture = Fixture::new();
    fixture.kms.add_key(OTHER_KEY);

    let vault = fixture
        .connect(&VaultOverrides::new().with_key_arn(OTHER_KEY))
        .await
        .unwrap();
    vault.store("k", b"v", true).await.unwrap();

    assert_eq!(vault.config().key_arn(), OTHER_KEY);
    assert_eq!(vault.config().bucket(), BUCKET);
    assert_eq!(fixture.stacks.describe_calls(), 1);

    // Records written under the override key are not readable under the stack key.
    let stack_keyed = fixture.vault("").await;
    assert!(matches!(
        stack_keyed.lookup("k").await.unwrap_err(),
        VaultError::Crypto(_)
    ));
}

#[tokio::test]
async fn test_full_overrides_skip_stack_lookup() {
    let fixture = Fixture::new();
    let overrides = VaultOverrides::new()
        .with_stack_name("does-not-exist")
        .with_bucket(BUCKET)
        .with_key_arn(KEY_ARN);

    let vault = fixture.connect(&overrides).await.unwrap();
    vault.store("k", b"v", true).await.unwrap();

    assert_eq!(fixture.stacks.describe_calls(), 0);
    assert_eq!(vault.lookup("k").await.unwrap().as_str(), Some("v"));
}

#[tokio::test]
async fn test_blank_overrides_are_ignored() {
    let fixture = Fixture::new();
    let overrides = VaultOverrides::new()
        .with_stack_name("")
        .with_bucket("  ")
        .with_key_arn("");

    let vault = fixture.connect(&overrides).await.unwrap();

    assert_eq!(vault.config().bucket(), BUCKET);
    assert_eq!(vault.config().stack_name(), "vault");
    assert_eq!(fixture.stacks.describe_calls(), 1);
}

#[tokio::test]
async fn test_region_override_beats_ambient() {
    let fixture = Fixture::new();
    let vault = fixture
        .connect(&VaultOverrides::new().with_region("us-east-2"))
        .await
        .unwrap();

    assert_eq!(vault.config().region(), "us-east-2");
}

#[tokio::test]
async fn test_credentials_are_carried_not_printed() {
    let fixture = Fixture::new();
    let overrides = VaultOverrides::new()
        .with_credentials(Credentials::new("AKIAEXAMPLE", "very-secret-key"));

    let vault = fixture.connect(&overrides).await.unwrap();

    let credentials = vault.config().credentials().unwrap();
    assert_eq!(credentials.access_key_id(), "AKIAEXAMPLE");
    assert!(!format!("{vault:?}").contains("very-secret-key"));
    assert!(!vault.to_string().contains("very-secret-key"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Resolution failures
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_missing_stack_fails_before_backend_calls() {
    let fixture = Fixture::new();

    let err = fixture
        .connect(&VaultOverrides::new().with_stack_name("missing"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VaultError::Config(ConfigError::StackNotFound { ref stack }) if stack == "missing"
    ));
    assert_no_backend_traffic(&fixture);
}

#[tokio::test]
async fn test_missing_output_names_the_output() {
    let fixture = Fixture::new();
    fixture.stacks.add_stack("partial", [(BUCKET_OUTPUT, BUCKET)]);

    let err = fixture
        .connect(&VaultOverrides::new().with_stack_name("partial"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VaultError::Config(ConfigError::MissingOutput { output, .. }) if output == KEY_OUTPUT
    ));
    assert_no_backend_traffic(&fixture);
}

#[tokio::test]
async fn test_missing_output_ignored_when_overridden() {
    let fixture = Fixture::new();
    fixture.stacks.add_stack("partial", [(BUCKET_OUTPUT, BUCKET)]);

    let vault = fixture
        .connect(
            &VaultOverrides::new()
                .with_stack_name("partial")
                .with_key_arn(KEY_ARN),
        )
        .await
        .unwrap();

    assert_eq!(vault.config().key_arn(), KEY_ARN);
}

#[tokio::test]
async fn test_missing_region_checked_first() {
    let stacks = Arc::new(MemoryStacks::new());
    let fixture = Fixture::new();

    let err = Vault::connect(
        &VaultOverrides::new(),
        &AmbientSettings::new(),
        stacks.clone(),
        fixture.kms.clone(),
        fixture.store.clone(),
        &fast_policy(),
        &OperationContext::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, VaultError::Config(ConfigError::MissingRegion)));
    assert_eq!(stacks.describe_calls(), 0);
    assert_no_backend_traffic(&fixture);
}

#[tokio::test]
async fn test_denied_stack_lookup_is_not_retried() {
    let fixture = Fixture::new();
    fixture
        .stacks
        .fail_next(1, BackendError::denied("not authorized to DescribeStacks"));

    let err = fixture.connect(&VaultOverrides::new()).await.unwrap_err();

    assert!(matches!(
        err,
        VaultError::Config(ConfigError::StackLookup { .. })
    ));
    assert_eq!(fixture.stacks.describe_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_throttled_stack_lookup_recovers() {
    let fixture = Fixture::new();
    fixture
        .stacks
        .fail_next(2, BackendError::transient("Rate exceeded").with_code("Throttling"));

    let vault = fixture.connect(&VaultOverrides::new()).await.unwrap();

    assert_eq!(vault.config().bucket(), BUCKET);
    assert_eq!(fixture.stacks.describe_calls(), 3);
}

#[tokio::test]
async fn test_stack_lookup_follows_vault_retry_policy() {
    let fixture = Fixture::new();
    let patient = RetryPolicy {
        max_attempts: 5,
        ..fast_policy()
    };
    fixture.stacks.fail_next(4, BackendError::transient("Rate exceeded"));

    let vault = fixture
        .connect_with(&VaultOverrides::new(), &patient, &OperationContext::new())
        .await
        .unwrap();

    assert_eq!(vault.config().bucket(), BUCKET);
    assert_eq!(fixture.stacks.describe_calls(), 5);
}

#[tokio::test]
async fn test_single_attempt_policy_stops_stack_lookup() {
    let fixture = Fixture::new();
    let impatient = RetryPolicy {
        max_attempts: 1,
        ..fast_policy()
    };
    fixture.stacks.fail_next(1, BackendError::transient("Rate exceeded"));

    let err = fixture
        .connect_with(&VaultOverrides::new(), &impatient, &OperationContext::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VaultError::Config(ConfigError::StackLookup { .. })
    ));
    assert_eq!(fixture.stacks.describe_calls(), 1);
}

#[tokio::test]
async fn test_cancelled_resolution() {
    let fixture = Fixture::new();
    let (ctx, handle) = OperationContext::new().cancellable();
    handle.cancel();

    let err = fixture
        .connect_with(&VaultOverrides::new(), &fast_policy(), &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::Cancelled));
    assert_eq!(fixture.stacks.describe_calls(), 0);
}
