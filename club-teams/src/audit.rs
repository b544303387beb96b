//! Structured audit logging for admin actions and access control.
//!
//! Events go out under the `audit` target so they can be filtered or routed
//! separately from request logs.

/// Log a state-changing action performed by a connected user.
pub fn log_action(actor_uid: &str, action: &str, details: &str) {
    tracing::info!(
        target: "audit",
        event = "action",
        actor = actor_uid,
        action = action,
        details = details,
        "Action: {} by {} ({})",
        action,
        actor_uid,
        details
    );
}

/// Log an admin login attempt
pub fn log_auth_event(actor_uid: &str, event: &str, success: bool) {
    if success {
        tracing::info!(
            target: "audit",
            event = "auth",
            actor = actor_uid,
            auth_event = event,
            success = success,
            "Auth: {} - {} (success={})",
            event,
            actor_uid,
            success
        );
    } else {
        tracing::warn!(
            target: "audit",
            event = "auth",
            actor = actor_uid,
            auth_event = event,
            success = success,
            "Auth: {} - {} (success={})",
            event,
            actor_uid,
            success
        );
    }
}

/// Log a rejected admin-only operation
pub fn log_security_event(actor_uid: &str, event: &str, details: &str) {
    tracing::warn!(
        target: "audit",
        event = "security",
        actor = actor_uid,
        security_event = event,
        details = details,
        "Security: {} - {} - {}",
        event,
        actor_uid,
        details
    );
}
