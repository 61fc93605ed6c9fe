// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// Per-tool approval policy. The Approval hook in the hook chain decides the
/// actual run-time disposition for `Ask`; `Auto` and `Deny` are never
/// escalated to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// Always run without asking
    Auto,
    /// Ask user before each invocation
    Ask,
    /// Never run; return an error
    Deny,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_are_distinct() {
        assert_ne!(ApprovalPolicy::Auto, ApprovalPolicy::Ask);
        assert_ne!(ApprovalPolicy::Auto, ApprovalPolicy::Deny);
        assert_ne!(ApprovalPolicy::Ask, ApprovalPolicy::Deny);
    }

    #[test]
    fn copy_semantics() {
        let a = ApprovalPolicy::Auto;
        let b = a;
        assert_eq!(a, b);
    }
}
