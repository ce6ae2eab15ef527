mod common;

use std::sync::Arc;
use std::time::Duration;

use vaultvoice::{
    AuthDecision, AuthMethod, AuthResult, GovernorState, Vault, VaultConfig, VaultError,
    WavFileSource, write_wav,
};

use common::{alice, impostor, voice};

const PASSWORD: &str = "Secret#123";

async fn enrolled_vault() -> Vault {
    let vault = Vault::in_memory(VaultConfig::default()).unwrap();
    vault.register("alice", PASSWORD).await.unwrap();
    vault.enroll("alice", alice()).await.unwrap();
    vault
}

async fn wrong_password(vault: &Vault, user: &str) -> AuthResult {
    vault.login_password(user, "Wrong#999x").await.unwrap()
}

#[tokio::test]
async fn own_voice_is_granted() {
    let vault = enrolled_vault().await;
    let r = vault.login_voice("alice", alice().remove(0)).await.unwrap();
    assert!(r.granted(), "denied with score {:?}", r.score);
    assert_eq!(r.attempt.method, AuthMethod::Voice);
    assert!(r.score.unwrap() > -50.0);
    assert_eq!(r.threshold, Some(-50.0));
    assert_eq!(r.attempt.attempts_remaining, 3);
}

#[tokio::test]
async fn impostor_voice_is_denied() {
    let vault = enrolled_vault().await;
    let r = vault.login_voice("alice", impostor()).await.unwrap();
    assert_eq!(r.attempt.decision, AuthDecision::Denied);
    assert!(r.score.unwrap() <= -50.0);
    assert_eq!(r.attempt.attempts_remaining, 2);
}

#[tokio::test]
async fn unenrolled_voice_scores_negative_infinity() {
    let vault = Vault::in_memory(VaultConfig::default()).unwrap();
    let r = vault.login_voice("ghost", voice(120.0, 1.0, 0)).await.unwrap();
    assert_eq!(r.attempt.decision, AuthDecision::Denied);
    assert_eq!(r.score, Some(f64::NEG_INFINITY));
    assert_eq!(r.attempt.attempts_remaining, 2);
}

#[tokio::test]
async fn password_login() {
    let vault = enrolled_vault().await;
    assert!(vault.login_password("alice", PASSWORD).await.unwrap().granted());
    let r = wrong_password(&vault, "alice").await;
    assert_eq!(r.attempt.decision, AuthDecision::Denied);
    assert_eq!(r.score, None);
    assert!(!wrong_password(&vault, "nobody").await.granted());
}

#[tokio::test(start_paused = true)]
async fn mixed_failures_lock_and_escalate() {
    let vault = enrolled_vault().await;

    let r = vault.login_voice("alice", impostor()).await.unwrap();
    assert_eq!(r.attempt.attempts_remaining, 2);
    let r = wrong_password(&vault, "alice").await;
    assert_eq!(r.attempt.attempts_remaining, 1);
    let r = vault.login_voice("alice", impostor()).await.unwrap();
    assert_eq!(r.attempt.state, GovernorState::Locked);
    assert_eq!(r.attempt.lockout_seconds_remaining, 30);

    let mut durations = vec![r.attempt.lockout_seconds_remaining];
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(*durations.last().unwrap())).await;
        wrong_password(&vault, "alice").await;
        wrong_password(&vault, "alice").await;
        let r = wrong_password(&vault, "alice").await;
        assert_eq!(r.attempt.state, GovernorState::Locked);
        durations.push(r.attempt.lockout_seconds_remaining);
    }
    assert_eq!(durations, vec![30, 60, 300, 600, 600]);
}

#[tokio::test(start_paused = true)]
async fn locked_out_attempts_are_refused_unscored() {
    let vault = enrolled_vault().await;
    for _ in 0..3 {
        wrong_password(&vault, "alice").await;
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    let r = vault.login_voice("alice", alice().remove(0)).await.unwrap();
    assert_eq!(r.attempt.decision, AuthDecision::LockedOut);
    assert_eq!(r.score, None);
    assert_eq!(r.attempt.lockout_seconds_remaining, 20);

    let r = vault.login_password("alice", PASSWORD).await.unwrap();
    assert_eq!(r.attempt.decision, AuthDecision::LockedOut);

    tokio::time::sleep(Duration::from_secs(20)).await;
    let status = vault.status("alice").unwrap();
    assert_eq!(status.auth.state, GovernorState::Ready);
    assert_eq!(status.auth.attempts_remaining, 3);
    assert_eq!(status.auth.lockout_tier, 1);
}

#[tokio::test(start_paused = true)]
async fn success_resets_tier() {
    let vault = enrolled_vault().await;
    for _ in 0..3 {
        wrong_password(&vault, "alice").await;
    }
    tokio::time::sleep(Duration::from_secs(30)).await;

    let r = vault.login_voice("alice", alice().remove(1)).await.unwrap();
    assert!(r.granted());
    assert_eq!(r.attempt.lockout_tier, 0);
    assert_eq!(r.attempt.attempts_remaining, 3);

    for _ in 0..2 {
        wrong_password(&vault, "alice").await;
    }
    let r = wrong_password(&vault, "alice").await;
    assert_eq!(r.attempt.lockout_seconds_remaining, 30);
}

#[tokio::test(start_paused = true)]
async fn lockouts_are_per_user() {
    let vault = enrolled_vault().await;
    vault.register("bob", "Builder#42").await.unwrap();
    for _ in 0..3 {
        wrong_password(&vault, "bob").await;
    }
    assert_eq!(vault.status("bob").unwrap().auth.state, GovernorState::Locked);
    assert!(vault.login_password("alice", PASSWORD).await.unwrap().granted());
}

#[tokio::test]
async fn delete_removes_profile_and_password() {
    let vault = enrolled_vault().await;
    assert!(vault.list_enrolled().unwrap().contains("alice"));

    vault.delete_user("alice").unwrap();
    vault.delete_user("alice").unwrap();

    let r = vault.login_voice("alice", alice().remove(0)).await.unwrap();
    assert_eq!(r.score, Some(f64::NEG_INFINITY));
    assert!(!r.granted());
    assert!(!vault.login_password("alice", PASSWORD).await.unwrap().granted());
    assert!(vault.list_users().unwrap().is_empty());

    let status = vault.status("alice").unwrap();
    assert!(!status.registered);
    assert!(status.profile.is_none());
}

#[tokio::test]
async fn enroll_needs_exactly_three_samples() {
    let vault = Vault::in_memory(VaultConfig::default()).unwrap();
    let mut samples = alice();
    samples.pop();
    let err = vault.enroll("alice", samples).await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::Voiceprint(vaultvoice_voiceprint::VoiceprintError::EnrollmentSamples { .. })
    ));
    assert!(vault.list_enrolled().unwrap().is_empty());
}

#[tokio::test]
async fn enroll_and_login_from_wav_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for (i, take) in alice().iter().enumerate() {
        let path = dir.path().join(format!("take{i}.wav"));
        write_wav(take, &path).unwrap();
        paths.push(path);
    }

    let vault = Vault::in_memory(VaultConfig::default()).unwrap();
    let source = Arc::new(WavFileSource::new(paths.clone()));
    let info = vault.enroll_from_source("alice", source.clone()).await.unwrap();
    assert_eq!(info.sample_count, 3);
    assert_eq!(source.remaining(), 0);

    let probe = Arc::new(WavFileSource::new([paths[0].clone()]));
    let r = vault.login_voice_from_source("alice", probe).await.unwrap();
    assert!(r.granted(), "denied with score {:?}", r.score);
}

#[tokio::test]
async fn capture_failure_consumes_no_attempt() {
    let vault = enrolled_vault().await;
    let empty = Arc::new(WavFileSource::new(Vec::<std::path::PathBuf>::new()));

    let err = vault.login_voice_from_source("alice", empty.clone()).await.unwrap_err();
    assert!(matches!(err, VaultError::Capture(_)));
    assert_eq!(vault.status("alice").unwrap().auth.attempts_remaining, 3);

    let err = vault.enroll_from_source("carol", empty).await.unwrap_err();
    assert!(matches!(err, VaultError::Capture(_)));
    assert!(!vault.list_enrolled().unwrap().contains("carol"));
}

#[tokio::test]
async fn profiles_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = VaultConfig::default();
    cfg.store.path = Some(dir.path().join("vault.redb"));

    {
        let vault = Vault::open(cfg.clone()).unwrap();
        vault.register("alice", PASSWORD).await.unwrap();
        vault.enroll("alice", alice()).await.unwrap();
    }

    let vault = Vault::open(cfg).unwrap();
    let status = vault.status("alice").unwrap();
    assert!(status.registered);
    assert_eq!(status.profile.unwrap().sample_count, 3);
    assert!(vault.login_voice("alice", alice().remove(2)).await.unwrap().granted());
}

#[tokio::test]
async fn invalid_user_ids_are_rejected() {
    let vault = Vault::in_memory(VaultConfig::default()).unwrap();
    assert!(matches!(
        vault.login_password("bad id", PASSWORD).await,
        Err(VaultError::InvalidUserId(_))
    ));
    assert!(matches!(
        vault.delete_user(""),
        Err(VaultError::InvalidUserId(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_during_voice_logins_leaves_no_profile() {
    let vault = Arc::new(enrolled_vault().await);
    let logins: Vec<_> = (0..3)
        .map(|i| {
            let vault = Arc::clone(&vault);
            tokio::spawn(async move { vault.login_voice("alice", alice().remove(i)).await })
        })
        .collect();
    vault.delete_user("alice").unwrap();

    for login in logins {
        let r = login.await.unwrap().unwrap();
        assert!(
            r.granted()
                || r.score == Some(f64::NEG_INFINITY)
                || r.attempt.decision == AuthDecision::LockedOut
        );
    }

    let status = vault.status("alice").unwrap();
    assert!(!status.registered);
    assert!(status.profile.is_none());
    assert!(vault.list_enrolled().unwrap().is_empty());
}

#[tokio::test]
async fn enroll_from_files_checks_count_before_reading() {
    let vault = Vault::in_memory(VaultConfig::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let missing: Vec<_> = (0..4)
        .map(|i| dir.path().join(format!("missing{i}.wav")))
        .collect();

    for n in [2, 4] {
        let err = vault
            .enroll_from_files("alice", missing[..n].to_vec())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                VaultError::Voiceprint(
                    vaultvoice_voiceprint::VoiceprintError::EnrollmentSamples { expected: 3, got }
                ) if got == n
            ),
            "unexpected error: {err}"
        );
    }

    let err = vault
        .enroll_from_files("alice", missing[..3].to_vec())
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Capture(_)));
    assert!(vault.list_enrolled().unwrap().is_empty());
}
