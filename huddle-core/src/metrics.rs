//! Prometheus metrics for the realtime hubs
//!
//! All metrics live in one process-global registry, exposed by the HTTP
//! layer on `/metrics`. Every series is labelled with the hub it belongs to
//! (`chat` or `signaling`).

use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, Encoder,
    IntCounterVec, IntGaugeVec, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Sessions currently registered with a hub
pub static SESSIONS_ACTIVE: std::sync::LazyLock<IntGaugeVec> = std::sync::LazyLock::new(|| {
    register_int_gauge_vec_with_registry!(
        "huddle_ws_sessions_active",
        "Sessions currently registered with a hub",
        &["hub"],
        REGISTRY.clone()
    )
    .expect("Failed to register SESSIONS_ACTIVE")
});

/// Frames handed to a session's outbound queue
pub static FRAMES_DELIVERED: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "huddle_frames_delivered_total",
        "Frames enqueued on a session outbound queue",
        &["hub"],
        REGISTRY.clone()
    )
    .expect("Failed to register FRAMES_DELIVERED")
});

/// Frames discarded because a recipient's outbound queue was full
pub static FRAMES_DROPPED: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        "huddle_frames_dropped_total",
        "Frames dropped for a slow recipient",
        &["hub"],
        REGISTRY.clone()
    )
    .expect("Failed to register FRAMES_DROPPED")
});

/// Inbound frames that could not be decoded and were skipped
pub static INBOUND_DECODE_ERRORS: std::sync::LazyLock<IntCounterVec> =
    std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            "huddle_inbound_decode_errors_total",
            "Inbound frames skipped because they failed to decode",
            &["hub"],
            REGISTRY.clone()
        )
        .expect("Failed to register INBOUND_DECODE_ERRORS")
    });

/// Create the series of one hub at zero.
///
/// Vec metrics export nothing for a label value until it is first used, so a
/// hub calls this when it is created.
pub fn init_hub_series(hub: &str) {
    SESSIONS_ACTIVE.with_label_values(&[hub]);
    FRAMES_DELIVERED.with_label_values(&[hub]);
    FRAMES_DROPPED.with_label_values(&[hub]);
    INBOUND_DECODE_ERRORS.with_label_values(&[hub]);
}

/// Render every registered metric in the Prometheus text format
pub fn gather_text() -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
