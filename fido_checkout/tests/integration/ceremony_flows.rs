use std::sync::Arc;
use std::time::Duration;

use fido_checkout::{
    AssertionErrorKind, CeremonyError, CeremonyPauses, CeremonyStep, CredentialErrorKind,
    FailureKind, HeldCredential, RegistrationErrorKind, SoftwareAuthenticator,
};
use tokio::time::timeout;

use crate::common::{
    GatedProvider, TEST_ORIGIN, TEST_TRANSACTION_ID, WAIT, reach, software_authenticator,
    start_and_register, start_with, test_settings,
};

#[tokio::test]
async fn test_fresh_registration_then_assertion_completes() {
    let authenticator = software_authenticator();
    let handle = start_and_register(authenticator.clone(), test_settings()).await;

    let handoff = timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert_eq!(handoff.transaction_id, TEST_TRANSACTION_ID);
    assert_eq!(handoff.amount.value(), 1563.84);

    let view = handle.view();
    assert_eq!(view.step, CeremonyStep::Succeeded);
    assert_eq!(view.progress, 100.0);
    assert!(matches!(view.credential, Some(HeldCredential::Registered(_))));
    assert!(view.error.is_none());
    assert!(!view.bypassed);
    assert_eq!(authenticator.credential_count(), 1);
}

#[tokio::test]
async fn test_existing_credential_proceeds_with_sentinel() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(TEST_ORIGIN).rejecting_duplicates());

    // A first checkout leaves a credential on the authenticator
    let first = start_and_register(authenticator.clone(), test_settings()).await;
    timeout(WAIT, first.completion()).await.unwrap().unwrap();

    let settings = test_settings().with_pauses(CeremonyPauses {
        already_exists: Duration::from_millis(200),
        ..CeremonyPauses::none()
    });
    let handle = start_and_register(authenticator.clone(), settings).await;

    let view = reach(&handle, CeremonyStep::AwaitingAssertion).await;
    assert_eq!(view.credential, Some(HeldCredential::AssumedExisting));
    assert!(view.error.is_none(), "already-exists is not a blocking error");
    assert!(view.notice.as_deref().unwrap().contains("already exists"));
    assert!(view.troubleshooting.is_empty());

    // Advances on its own after the pause, with no allow-list restriction
    timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert_eq!(authenticator.credential_count(), 1);
}

#[tokio::test]
async fn test_cancelled_registration_fails_then_retry_succeeds() {
    let authenticator = software_authenticator();
    authenticator.fail_next_registration(CredentialErrorKind::NotAllowed, "The operation was denied");
    let handle = start_and_register(authenticator.clone(), test_settings()).await;

    let view = reach(&handle, CeremonyStep::Failed).await;
    assert_eq!(
        view.failure,
        Some(FailureKind::Registration(RegistrationErrorKind::CancelledOrDenied))
    );
    assert!(view.error.as_deref().unwrap().contains("cancelled"));
    assert!(view.credential.is_none());
    assert!(view.can_retry);
    assert!(view.can_bypass);
    assert_eq!(view.troubleshooting.len(), 4);

    handle.retry().await.unwrap();
    assert!(matches!(
        handle.register().await,
        Err(CeremonyError::InvalidTransition { .. } | CeremonyError::Closed)
    ));
    timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert!(!handle.view().bypassed);
    assert_eq!(authenticator.credential_count(), 1);
}

#[tokio::test]
async fn test_failed_assertion_retry_keeps_credential() {
    let authenticator = software_authenticator();
    authenticator.fail_next_assertion(CredentialErrorKind::NotAllowed, "timed out");
    let provider = Arc::new(GatedProvider::new(authenticator.clone()));
    let handle = start_and_register(provider.clone(), test_settings()).await;

    let view = reach(&handle, CeremonyStep::Failed).await;
    assert_eq!(
        view.failure,
        Some(FailureKind::Assertion(AssertionErrorKind::CancelledOrTimeout))
    );
    let held = view.credential.clone();
    assert!(matches!(held, Some(HeldCredential::Registered(_))));

    handle.retry().await.unwrap();
    timeout(WAIT, handle.completion()).await.unwrap().unwrap();

    assert_eq!(handle.view().credential, held);
    assert_eq!(provider.registration_calls(), 1, "retry resumes at the assertion");
    assert_eq!(provider.assertion_calls(), 2);
}

#[tokio::test]
async fn test_missing_credentials_return_to_registration() {
    let authenticator = software_authenticator();
    authenticator.fail_next_assertion(CredentialErrorKind::InvalidState, "no credentials");
    let provider = Arc::new(GatedProvider::new(authenticator.clone()));
    let settings = test_settings().with_pauses(CeremonyPauses {
        no_credentials: Duration::from_millis(200),
        ..CeremonyPauses::none()
    });
    let handle = start_and_register(provider.clone(), settings).await;

    // Back in awaiting-registration with the credential dropped, for a pause
    let view = timeout(
        WAIT,
        handle.subscribe().wait_for(|v| {
            v.step == CeremonyStep::AwaitingRegistration && v.notice.is_some()
        }),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert!(view.credential.is_none());
    assert!(view.error.is_none());
    assert!(view.advancing);
    assert!(view.notice.as_deref().unwrap().contains("register"));
    assert_eq!(provider.registration_calls(), 1);

    // Registers again on its own once the pause is over
    timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert_eq!(provider.registration_calls(), 2);
    assert_eq!(provider.assertion_calls(), 2);
}

#[tokio::test]
async fn test_register_during_no_credentials_pause_takes_over() {
    let authenticator = software_authenticator();
    authenticator.fail_next_assertion(CredentialErrorKind::InvalidState, "no credentials");
    let provider = Arc::new(GatedProvider::new(authenticator.clone()));
    let settings = test_settings().with_pauses(CeremonyPauses {
        no_credentials: Duration::from_millis(300),
        completion: Duration::from_millis(500),
        ..CeremonyPauses::none()
    });
    let handle = start_and_register(provider.clone(), settings).await;

    timeout(
        WAIT,
        handle.subscribe().wait_for(|v| {
            v.step == CeremonyStep::AwaitingRegistration && v.advancing
        }),
    )
    .await
    .unwrap()
    .unwrap();
    handle.register().await.unwrap();

    // The scheduled begin fires while the ceremony waits to hand off
    timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert_eq!(provider.registration_calls(), 2);
}

#[tokio::test]
async fn test_unsupported_environment_bypass() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(TEST_ORIGIN).unsupported());
    let handle = start_with(authenticator, test_settings());

    let view = reach(&handle, CeremonyStep::ProbingFailed).await;
    assert_eq!(view.failure, Some(FailureKind::Unsupported));
    assert!(view.error.as_deref().unwrap().contains("not supported"));
    assert!(!view.can_retry);
    assert!(view.can_bypass);

    assert!(matches!(
        handle.register().await,
        Err(CeremonyError::InvalidTransition { .. })
    ));

    handle.bypass().await.unwrap();
    let handoff = timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert_eq!(handoff.transaction_id, TEST_TRANSACTION_ID);
    assert!(handle.view().bypassed);
}

#[tokio::test]
async fn test_bypass_disabled() {
    let authenticator = Arc::new(SoftwareAuthenticator::new(TEST_ORIGIN).unsupported());
    let handle = start_with(authenticator, test_settings().with_bypass(false));

    let view = reach(&handle, CeremonyStep::ProbingFailed).await;
    assert!(!view.can_bypass);
    assert!(matches!(
        handle.bypass().await,
        Err(CeremonyError::BypassDisabled)
    ));
    assert_eq!(handle.view().step, CeremonyStep::ProbingFailed);
}

#[tokio::test]
async fn test_single_attempt_in_flight() {
    let provider = Arc::new(GatedProvider::new(software_authenticator()).holding_registration());
    let handle = start_and_register(provider.clone(), test_settings()).await;
    assert_eq!(handle.view().step, CeremonyStep::Registering);

    for result in [handle.register().await, handle.authenticate().await] {
        assert!(matches!(
            result,
            Err(CeremonyError::InvalidTransition {
                step: CeremonyStep::Registering,
                ..
            })
        ));
    }

    // Milestone reached before the provider call, ticker capped below 100
    let view = timeout(WAIT, handle.subscribe().wait_for(|v| v.progress >= 30.0))
        .await
        .unwrap()
        .unwrap()
        .clone();
    assert!(view.progress <= 90.0);

    provider.release();
    timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert_eq!(provider.registration_calls(), 1);
    assert_eq!(provider.assertion_calls(), 1);
}

#[tokio::test]
async fn test_progress_is_monotonic_within_attempt() {
    let provider = Arc::new(GatedProvider::new(software_authenticator()).holding_registration());
    let handle = start_and_register(provider.clone(), test_settings()).await;

    let mut rx = handle.subscribe();
    let mut last = 0.0;
    for _ in 0..5 {
        timeout(WAIT, rx.changed()).await.unwrap().unwrap();
        let progress = rx.borrow_and_update().progress;
        assert!(progress >= last, "{progress} < {last}");
        assert!(progress <= 90.0);
        last = progress;
    }
    provider.release();
    timeout(WAIT, handle.completion()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cancel_abandons_pending_request() {
    let provider = Arc::new(GatedProvider::new(software_authenticator()).holding_registration());
    let handle = start_and_register(provider.clone(), test_settings()).await;

    handle.cancel().await;
    assert!(matches!(
        timeout(WAIT, handle.completion()).await.unwrap(),
        Err(CeremonyError::Closed)
    ));

    // A late release has nowhere to report to
    provider.release();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(handle.view().step, CeremonyStep::Registering);
    assert!(matches!(handle.retry().await, Err(CeremonyError::Closed)));
}

#[tokio::test]
async fn test_scheduled_advance_is_dropped_after_manual_start() {
    let provider = Arc::new(GatedProvider::new(software_authenticator()));
    let settings = test_settings().with_pauses(CeremonyPauses {
        advance_to_assertion: Duration::from_millis(200),
        completion: Duration::from_millis(500),
        ..CeremonyPauses::none()
    });
    let handle = start_and_register(provider.clone(), settings).await;

    reach(&handle, CeremonyStep::AwaitingAssertion).await;
    handle.authenticate().await.unwrap();

    // The first schedule fires while the ceremony waits to hand off
    reach(&handle, CeremonyStep::Succeeded).await;
    timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert_eq!(provider.assertion_calls(), 1);
    assert_eq!(handle.view().step, CeremonyStep::Succeeded);
}
