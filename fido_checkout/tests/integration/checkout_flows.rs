use fido_checkout::{
    CeremonyEntry, CeremonyPorts, ConfirmationHandoff, OrderTotals, PaymentMethod, SystemClock,
    start_ceremony,
};
use tokio::time::timeout;

use crate::common::{WAIT, reach, software_authenticator, test_settings};

fn demo_card() -> PaymentMethod {
    PaymentMethod::Card {
        number: "4000 0000 0000 0002".to_string(),
        expiry: "12/27".to_string(),
        cvv: "123".to_string(),
        holder: "Demo Shopper".to_string(),
    }
}

#[tokio::test]
async fn test_checkout_to_confirmation_preserves_transaction() {
    let totals = OrderTotals::demo();
    let redirect = fido_checkout::initiate_checkout(
        &totals,
        &demo_card(),
        "http://localhost:3000/checkout/success",
        &SystemClock,
    )
    .unwrap();
    assert!(redirect.context.transaction_id().starts_with("TX-"));

    // The ceremony page parses what checkout sent
    let (_, query) = redirect.url.split_once('?').unwrap();
    let entry = CeremonyEntry::from_query(query, &SystemClock);
    assert_eq!(entry.context, redirect.context);

    let handle = start_ceremony(
        entry.context.clone(),
        CeremonyPorts::new(software_authenticator()),
        test_settings(),
    );
    reach(&handle, fido_checkout::CeremonyStep::AwaitingRegistration).await;
    handle.register().await.unwrap();
    let handoff = timeout(WAIT, handle.completion()).await.unwrap().unwrap();

    // Exit goes back to where checkout asked, leaving id and amount unchanged
    let url = entry.exit_url(&handoff);
    assert!(url.starts_with("http://localhost:3000/checkout/success?"));
    let (_, query) = url.split_once('?').unwrap();
    let received = ConfirmationHandoff::from_query(query).unwrap();
    assert_eq!(received.transaction_id, redirect.context.transaction_id());
    assert_eq!(received.amount, redirect.context.amount());
    assert_eq!(received.amount.to_display(), "$1563.84");
}

#[tokio::test]
async fn test_entry_without_parameters_still_runs() {
    let entry = CeremonyEntry::from_query("", &SystemClock);
    assert!(entry.context.transaction_id().starts_with("tx-"));
    assert_eq!(entry.context.amount().value(), 0.0);

    let handle = start_ceremony(
        entry.context.clone(),
        CeremonyPorts::new(software_authenticator()),
        test_settings(),
    );
    reach(&handle, fido_checkout::CeremonyStep::AwaitingRegistration).await;
    handle.register().await.unwrap();
    let handoff = timeout(WAIT, handle.completion()).await.unwrap().unwrap();
    assert_eq!(handoff, entry.context.confirmation());
}
