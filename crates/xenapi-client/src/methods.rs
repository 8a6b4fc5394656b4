//! Recognized XenAPI operations and call-name routing.
//!
//! The remote surface is data, not code: an ordered table of name prefixes,
//! each tagged with how a matching call is handled. Classification scans the
//! table in declaration order and the first matching rule wins, so the table
//! is the single source of truth for dispatch and for capability checks;
//! the two can never disagree. Adding a remote operation is a table edit.

/// How a recognized call is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Establishes a session and stores the returned token locally.
    Login,
    /// Tears down the current session; trivially succeeds without one.
    Logout,
    /// Forwarded to the server with the session token prepended.
    PassThrough,
}

/// One entry of the recognized-operation table.
#[derive(Debug, Clone, Copy)]
pub struct MethodRule {
    /// Call names starting with this prefix match the rule.
    pub prefix: &'static str,
    pub kind: MethodKind,
}

/// Recognized-operation table, scanned in declaration order.
pub const METHOD_RULES: &[MethodRule] = &[
    // ── Session lifecycle ────────────────────────────────────────────────
    MethodRule { prefix: "login", kind: MethodKind::Login },
    MethodRule { prefix: "logout", kind: MethodKind::Logout },
    // ── Session attributes ───────────────────────────────────────────────
    MethodRule { prefix: "session_change_password", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_get_all_subject_identifiers", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_logout_subject_identifier", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_get_uuid", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_get_this_user", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_get_this_host", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_get_last_active", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_get_pool", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_get_other_config", kind: MethodKind::PassThrough },
    MethodRule { prefix: "session_set_other_config", kind: MethodKind::PassThrough },
    // ── Tasks ────────────────────────────────────────────────────────────
    MethodRule { prefix: "task_create", kind: MethodKind::PassThrough },
    MethodRule { prefix: "task_destroy", kind: MethodKind::PassThrough },
    MethodRule { prefix: "task_get_all", kind: MethodKind::PassThrough },
    // ── Events ───────────────────────────────────────────────────────────
    MethodRule { prefix: "event_register", kind: MethodKind::PassThrough },
    MethodRule { prefix: "event_unregister", kind: MethodKind::PassThrough },
    MethodRule { prefix: "event_next", kind: MethodKind::PassThrough },
    MethodRule { prefix: "event_get_current_id", kind: MethodKind::PassThrough },
    // ── VM lifecycle ─────────────────────────────────────────────────────
    MethodRule { prefix: "VM_snapshot", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_clone", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_copy", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_start", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_start_on", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_pause", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_unpause", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_suspend", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_resume", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_clean_shutdown", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_clean_reboot", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_hard_shutdown", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_pool_migrate", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_get_possible_hosts", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_assert_agile", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_get_uuid", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_get_powerstate", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_name_label", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_get_resident_on", kind: MethodKind::PassThrough },
    MethodRule { prefix: "VM_get_all", kind: MethodKind::PassThrough },
];

/// Classify a call name; first matching rule in declaration order wins.
pub fn classify(name: &str) -> Option<MethodKind> {
    METHOD_RULES
        .iter()
        .find(|rule| name.starts_with(rule.prefix))
        .map(|rule| rule.kind)
}

/// Capability check backed by the same table as dispatch.
pub fn is_supported(name: &str) -> bool {
    classify(name).is_some()
}

/// Rewrite a caller-facing name into the wire-level dotted form.
///
/// The first underscore separates the API class from the operation, so only
/// that one becomes a dot: `VM_get_possible_hosts` → `VM.get_possible_hosts`.
pub fn wire_method_name(name: &str) -> String {
    name.replacen('_', ".", 1)
}
