use std::{env, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fido_checkout::{
    CeremonyEntry, CeremonyHandle, CeremonyPorts, CeremonySettings, CeremonyStep,
    CredentialErrorKind, OrderTotals, PaymentMethod, SoftwareAuthenticator, SystemClock,
    initiate_checkout, start_ceremony,
};

/// Failure to inject into the software authenticator, from `FIDO_SIMULATE_FAILURE`.
fn simulate_failure(authenticator: SoftwareAuthenticator) -> SoftwareAuthenticator {
    let Ok(mode) = env::var("FIDO_SIMULATE_FAILURE") else {
        return authenticator;
    };
    match mode.as_str() {
        "unsupported" => authenticator.unsupported(),
        "registration-cancelled" => {
            authenticator.fail_next_registration(CredentialErrorKind::NotAllowed, "denied");
            authenticator
        }
        "assertion-timeout" => {
            authenticator.fail_next_assertion(CredentialErrorKind::NotAllowed, "timed out");
            authenticator
        }
        "insecure" => {
            authenticator.fail_next_assertion(CredentialErrorKind::Security, "insecure origin");
            authenticator
        }
        other => {
            tracing::warn!("Unknown FIDO_SIMULATE_FAILURE value: {}", other);
            authenticator
        }
    }
}

async fn follow(
    handle: &CeremonyHandle,
    entry: &CeremonyEntry,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut views = handle.subscribe();
    let mut last_step = None;
    let mut retried = false;

    loop {
        let view = views.borrow_and_update().clone();

        if last_step != Some(view.step) {
            println!("[{}] {}: {}", view.step, view.step.title(), view.step.description());
            if let Some(notice) = &view.notice {
                println!("    note: {notice}");
            }
            if let Some(error) = &view.error {
                println!("    error: {error}");
                for tip in &view.troubleshooting {
                    println!("      - {tip}");
                }
            }
            last_step = Some(view.step);

            match view.step {
                CeremonyStep::AwaitingRegistration if !view.advancing => {
                    handle.register().await?
                }
                CeremonyStep::Failed if view.can_retry && !retried => {
                    println!("    retrying once");
                    retried = true;
                    handle.retry().await?;
                }
                CeremonyStep::Failed | CeremonyStep::ProbingFailed if view.can_bypass => {
                    println!("    using demo bypass");
                    handle.bypass().await?;
                }
                CeremonyStep::Failed | CeremonyStep::ProbingFailed => {
                    return Err("ceremony failed and bypass is disabled".into());
                }
                _ => {}
            }
        } else if view.step.is_in_flight() {
            println!("    progress {:>5.1}%", view.progress);
        }

        if let Some(handoff) = &view.completion {
            println!(
                "Payment of {} authorized, continuing to {}",
                handoff.amount.to_display(),
                entry.exit_url(handoff)
            );
            return Ok(());
        }

        if views.changed().await.is_err() {
            // Final view may have been published right before the actor stopped
            let view = views.borrow().clone();
            return match view.completion {
                Some(handoff) => {
                    println!("Continuing to {}", entry.exit_url(&handoff));
                    Ok(())
                }
                None => Err("ceremony stopped before completing".into()),
            };
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info,fido_checkout=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = CeremonySettings::from_env();
    let totals = OrderTotals::demo();
    println!(
        "Order: subtotal ${:.2}, shipping ${:.2}, tax ${:.2}, total ${:.2}",
        totals.subtotal, totals.shipping, totals.tax, totals.total
    );

    let payment = PaymentMethod::Card {
        number: "4000 0000 0000 0002".to_string(),
        expiry: "12/27".to_string(),
        cvv: "123".to_string(),
        holder: "Demo Shopper".to_string(),
    };
    let return_url = format!("{}/checkout/success", settings.origin);
    let redirect = initiate_checkout(&totals, &payment, &return_url, &SystemClock)?;
    println!("Redirecting to {}", redirect.url);

    let query = redirect.url.split_once('?').map_or("", |(_, q)| q);
    let entry = CeremonyEntry::from_query(query, &SystemClock);

    let authenticator = simulate_failure(SoftwareAuthenticator::new(settings.origin.clone()));
    let handle = start_ceremony(
        entry.context.clone(),
        CeremonyPorts::new(Arc::new(authenticator)),
        settings,
    );

    follow(&handle, &entry).await
}
