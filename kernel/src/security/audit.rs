//! Audit log (spec.md §4.8): a fixed 1024-entry ring behind one
//! spinlock. `shouldLog` gates on a configurable minimum severity
//! before anything is allocated, so a disabled audit tier costs one
//! atomic-free comparison per denial. No teacher module covers this;
//! the ring itself follows the same "fixed capacity behind a single
//! lock" shape as `kernel::fs::pipe`'s ring buffer, generalized to an
//! overwrite-oldest event log instead of a blocking byte stream.

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::string::String;

use kernel_sync::spinlock::Spinlock;

pub const RING_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum AuditSeverity {
    Info = 0,
    Warning = 1,
    Critical = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventType {
    Auth,
    PrivilegeChange,
    AccessDenied,
    SecurityViolation,
    Lockdown,
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub seq: u64,
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub pid: u32,
    pub uid: u32,
    pub message: String,
}

struct Inner {
    events: VecDeque<AuditEvent>,
    next_seq: u64,
    min_severity: AuditSeverity,
}

pub struct AuditLog {
    inner: Spinlock<Inner>,
}

impl AuditLog {
    pub const fn new() -> Self {
        Self {
            inner: Spinlock::new(Inner {
                events: VecDeque::new(),
                next_seq: 0,
                min_severity: AuditSeverity::Info,
            }),
        }
    }

    pub fn set_min_severity(&self, min: AuditSeverity) {
        self.inner.lock().min_severity = min;
    }

    pub fn should_log(&self, severity: AuditSeverity) -> bool {
        severity >= self.inner.lock().min_severity
    }

    fn append(&self, event_type: AuditEventType, severity: AuditSeverity, pid: u32, uid: u32, message: String) {
        if !self.should_log(severity) {
            return;
        }
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        if inner.events.len() >= RING_CAPACITY {
            inner.events.pop_front();
        }
        inner.events.push_back(AuditEvent {
            seq,
            event_type,
            severity,
            pid,
            uid,
            message,
        });
    }

    pub fn log_auth(&self, pid: u32, uid: u32, success: bool, message: String) {
        let severity = if success { AuditSeverity::Info } else { AuditSeverity::Warning };
        self.append(AuditEventType::Auth, severity, pid, uid, message);
    }

    pub fn log_privilege_change(&self, pid: u32, uid: u32, message: String) {
        self.append(AuditEventType::PrivilegeChange, AuditSeverity::Warning, pid, uid, message);
    }

    pub fn log_access_denied(&self, pid: u32, uid: u32, message: String) {
        self.append(AuditEventType::AccessDenied, AuditSeverity::Warning, pid, uid, message);
    }

    pub fn log_security_violation(&self, pid: u32, uid: u32, message: String) {
        self.append(AuditEventType::SecurityViolation, AuditSeverity::Critical, pid, uid, message);
    }

    pub fn log_lockdown_denial(&self, pid: u32, uid: u32, message: String) {
        self.append(AuditEventType::Lockdown, AuditSeverity::Critical, pid, uid, message);
    }

    /// Snapshot for `/proc` or a future audit-read syscall: newest last.
    pub fn snapshot(&self) -> alloc::vec::Vec<AuditEvent> {
        self.inner.lock().events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Global audit ring. Every subsystem that denies something reaches
/// through here (spec.md §6 "the audit log is the only externally
/// observable sink for security events").
pub static AUDIT: AuditLog = AuditLog::new();

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn overwrites_oldest_past_capacity() {
        let log = AuditLog::new();
        for i in 0..RING_CAPACITY + 10 {
            log.log_auth(1, 0, true, i.to_string());
        }
        assert_eq!(log.len(), RING_CAPACITY);
        let snap = log.snapshot();
        assert_eq!(snap.first().unwrap().message, "10");
    }

    #[test]
    fn should_log_gates_by_configured_minimum() {
        let log = AuditLog::new();
        log.set_min_severity(AuditSeverity::Critical);
        assert!(!log.should_log(AuditSeverity::Warning));
        log.log_auth(1, 0, false, "denied".to_string());
        assert!(log.is_empty());
        log.log_security_violation(1, 0, "boom".to_string());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let log = AuditLog::new();
        log.log_auth(1, 0, true, "a".to_string());
        log.log_auth(1, 0, true, "b".to_string());
        let snap = log.snapshot();
        assert!(snap[1].seq > snap[0].seq);
    }
}
