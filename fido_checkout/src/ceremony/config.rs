use std::{env, sync::LazyLock, time::Duration};

pub(super) static ORIGIN: LazyLock<String> = LazyLock::new(|| {
    env::var("ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string())
});

pub(super) static FIDO_RP_ID: LazyLock<String> = LazyLock::new(|| rp_id_from_origin(&ORIGIN));

pub(super) static FIDO_RP_NAME: LazyLock<String> = LazyLock::new(|| {
    env::var("FIDO_RP_NAME").unwrap_or_else(|_| "Tech Store - FIDO 3DS Hub".to_string())
});

pub(super) static FIDO_USER_NAME: LazyLock<String> = LazyLock::new(|| {
    env::var("FIDO_USER_NAME").unwrap_or_else(|_| "customer@techstore.example".to_string())
});

pub(super) static FIDO_USER_DISPLAY_NAME: LazyLock<String> = LazyLock::new(|| {
    env::var("FIDO_USER_DISPLAY_NAME").unwrap_or_else(|_| "Tech Store Customer".to_string())
});

pub(super) static FIDO_TIMEOUT: LazyLock<u32> = LazyLock::new(|| {
    env::var("FIDO_TIMEOUT")
        .map(|v| v.parse::<u32>().unwrap_or(60))
        .unwrap_or(60)
});

pub(super) static FIDO_USER_VERIFICATION: LazyLock<String> = LazyLock::new(|| {
    env::var("FIDO_USER_VERIFICATION").map_or(
        "preferred".to_string(),
        |v| match v.to_lowercase().as_str() {
            "required" => "required".to_string(),
            "preferred" => "preferred".to_string(),
            "discouraged" => "discouraged".to_string(),
            _ => {
                tracing::warn!("Invalid user verification: {}. Using default 'preferred'", v);
                "preferred".to_string()
            }
        },
    )
});

pub(super) static FIDO_RESIDENT_KEY: LazyLock<String> = LazyLock::new(|| {
    env::var("FIDO_RESIDENT_KEY").map_or(
        "preferred".to_string(),
        |v| match v.to_lowercase().as_str() {
            "required" => "required".to_string(),
            "preferred" => "preferred".to_string(),
            "discouraged" => "discouraged".to_string(),
            _ => {
                tracing::warn!("Invalid resident key: {}. Using default 'preferred'", v);
                "preferred".to_string()
            }
        },
    )
});

pub(super) static FIDO_ATTESTATION: LazyLock<String> =
    LazyLock::new(|| match env::var("FIDO_ATTESTATION").ok() {
        None => "none".to_string(),
        Some(v) => match v.to_lowercase().as_str() {
            "none" => "none".to_string(),
            "direct" => "direct".to_string(),
            "indirect" => "indirect".to_string(),
            "enterprise" => "enterprise".to_string(),
            invalid => {
                tracing::warn!("Invalid attestation: {}. Using default 'none'", invalid);
                "none".to_string()
            }
        },
    });

/// Development-only escape hatch that lets a failed ceremony complete anyway.
pub(super) static FIDO_DEMO_BYPASS: LazyLock<bool> = LazyLock::new(|| {
    env::var("FIDO_DEMO_BYPASS").map_or(true, |v| match v.to_lowercase().as_str() {
        "true" => true,
        "false" => false,
        invalid => {
            tracing::warn!("Invalid demo bypass flag: {}. Using default 'true'", invalid);
            true
        }
    })
});

pub(super) static FIDO_PROGRESS_INTERVAL_MS: LazyLock<u64> = LazyLock::new(|| {
    env::var("FIDO_PROGRESS_INTERVAL_MS")
        .map(|v| v.parse::<u64>().unwrap_or(200))
        .unwrap_or(200)
});

pub(super) static FIDO_PROGRESS_CEILING: LazyLock<f64> = LazyLock::new(|| {
    env::var("FIDO_PROGRESS_CEILING")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| (0.0..100.0).contains(v))
        .unwrap_or(90.0)
});

pub(super) static FIDO_PROGRESS_MAX_STEP: LazyLock<f64> = LazyLock::new(|| {
    env::var("FIDO_PROGRESS_MAX_STEP")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .unwrap_or(15.0)
});

fn rp_id_from_origin(origin: &str) -> String {
    origin
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(['/', ':'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("localhost")
        .to_string()
}

/// Simulated pauses between ceremony steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonyPauses {
    /// Delay before the probe result is reported.
    pub probe: Duration,
    /// Simulated server-side registration sync after a credential is created.
    pub registration_sync: Duration,
    /// Auto-advance from a fresh registration to the assertion.
    pub advance_to_assertion: Duration,
    /// Auto-advance when the authenticator already holds a credential.
    pub already_exists: Duration,
    /// Pause before registering again when the authenticator has no credentials.
    pub no_credentials: Duration,
    /// Simulated 3-D Secure authorization of the assertion.
    pub authorization: Duration,
    /// Delay between `succeeded` and the confirmation hand-off.
    pub completion: Duration,
}

impl Default for CeremonyPauses {
    fn default() -> Self {
        Self {
            probe: Duration::from_millis(500),
            registration_sync: Duration::from_millis(1000),
            advance_to_assertion: Duration::from_millis(1000),
            already_exists: Duration::from_millis(2000),
            no_credentials: Duration::from_millis(2000),
            authorization: Duration::from_millis(1500),
            completion: Duration::from_millis(2000),
        }
    }
}

impl CeremonyPauses {
    /// No pauses at all; used by tests and headless runs.
    pub fn none() -> Self {
        Self {
            probe: Duration::ZERO,
            registration_sync: Duration::ZERO,
            advance_to_assertion: Duration::ZERO,
            already_exists: Duration::ZERO,
            no_credentials: Duration::ZERO,
            authorization: Duration::ZERO,
            completion: Duration::ZERO,
        }
    }
}

/// Everything a ceremony needs to know about the relying party and its own pacing.
#[derive(Debug, Clone)]
pub struct CeremonySettings {
    pub origin: String,
    pub rp_id: String,
    pub rp_name: String,
    pub user_name: String,
    pub user_display_name: String,
    /// Ceremony timeout passed to the authenticator, in milliseconds.
    pub timeout_ms: u32,
    pub user_verification: String,
    pub resident_key: String,
    pub attestation: String,
    pub allow_bypass: bool,
    pub progress_interval: Duration,
    pub progress_ceiling: f64,
    pub progress_max_step: f64,
    pub pauses: CeremonyPauses,
}

impl CeremonySettings {
    pub fn from_env() -> Self {
        Self {
            origin: ORIGIN.clone(),
            rp_id: FIDO_RP_ID.clone(),
            rp_name: FIDO_RP_NAME.clone(),
            user_name: FIDO_USER_NAME.clone(),
            user_display_name: FIDO_USER_DISPLAY_NAME.clone(),
            timeout_ms: (*FIDO_TIMEOUT).saturating_mul(1000),
            user_verification: FIDO_USER_VERIFICATION.clone(),
            resident_key: FIDO_RESIDENT_KEY.clone(),
            attestation: FIDO_ATTESTATION.clone(),
            allow_bypass: *FIDO_DEMO_BYPASS,
            progress_interval: Duration::from_millis(*FIDO_PROGRESS_INTERVAL_MS),
            progress_ceiling: *FIDO_PROGRESS_CEILING,
            progress_max_step: *FIDO_PROGRESS_MAX_STEP,
            pauses: CeremonyPauses::default(),
        }
    }

    /// Settings for `localhost` with no pauses and a fast ticker.
    pub fn for_localhost() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            rp_id: "localhost".to_string(),
            rp_name: "Tech Store - FIDO 3DS Hub".to_string(),
            user_name: "customer@techstore.example".to_string(),
            user_display_name: "Tech Store Customer".to_string(),
            timeout_ms: 60_000,
            user_verification: "preferred".to_string(),
            resident_key: "preferred".to_string(),
            attestation: "none".to_string(),
            allow_bypass: true,
            progress_interval: Duration::from_millis(10),
            progress_ceiling: 90.0,
            progress_max_step: 15.0,
            pauses: CeremonyPauses::none(),
        }
    }

    pub fn with_pauses(mut self, pauses: CeremonyPauses) -> Self {
        self.pauses = pauses;
        self
    }

    pub fn with_bypass(mut self, allow_bypass: bool) -> Self {
        self.allow_bypass = allow_bypass;
        self
    }
}

impl Default for CeremonySettings {
    fn default() -> Self {
        Self::from_env()
    }
}
