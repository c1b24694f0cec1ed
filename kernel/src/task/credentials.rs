//! Process credentials (spec.md §3 `Process.credentials`): real/
//! effective/saved uid+gid, filesystem uid/gid, supplementary groups,
//! and the 64-bit capability mask `security::capability` interprets.

extern crate alloc;

use alloc::vec::Vec;

pub const ROOT_UID: u32 = 0;

#[derive(Clone, Debug)]
pub struct Credentials {
    pub uid: u32,
    pub gid: u32,
    pub euid: u32,
    pub egid: u32,
    pub saved_uid: u32,
    pub saved_gid: u32,
    pub fsuid: u32,
    pub fsgid: u32,
    pub groups: Vec<u32>,
    pub capabilities: u64,
}

impl Credentials {
    pub fn root() -> Self {
        Self {
            uid: ROOT_UID,
            gid: ROOT_UID,
            euid: ROOT_UID,
            egid: ROOT_UID,
            saved_uid: ROOT_UID,
            saved_gid: ROOT_UID,
            fsuid: ROOT_UID,
            fsgid: ROOT_UID,
            groups: Vec::new(),
            capabilities: u64::MAX,
        }
    }

    pub fn unprivileged(uid: u32, gid: u32) -> Self {
        Self {
            uid,
            gid,
            euid: uid,
            egid: gid,
            saved_uid: uid,
            saved_gid: gid,
            fsuid: uid,
            fsgid: gid,
            groups: Vec::new(),
            capabilities: 0,
        }
    }

    pub fn is_root(&self) -> bool {
        self.euid == ROOT_UID
    }

    pub fn in_group(&self, gid: u32) -> bool {
        self.egid == gid || self.groups.contains(&gid)
    }

    /// `setuid`-family transition: moves real → saved, sets effective
    /// and filesystem ids to the new value. The caller has already
    /// checked the privilege required to call this (`CAP_SETUID` or
    /// `new_uid` matching one of the existing {real, effective, saved}
    /// triple).
    pub fn set_uid(&mut self, new_uid: u32) {
        self.saved_uid = self.euid;
        self.euid = new_uid;
        self.fsuid = new_uid;
        self.uid = new_uid;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn root_has_all_capabilities() {
        let creds = Credentials::root();
        assert!(creds.is_root());
        assert_eq!(creds.capabilities, u64::MAX);
    }

    #[test]
    fn unprivileged_has_no_capabilities() {
        let creds = Credentials::unprivileged(1000, 1000);
        assert!(!creds.is_root());
        assert_eq!(creds.capabilities, 0);
    }

    #[test]
    fn group_membership_checks_both_egid_and_supplementary() {
        let mut creds = Credentials::unprivileged(1000, 1000);
        creds.groups.push(27);
        assert!(creds.in_group(1000));
        assert!(creds.in_group(27));
        assert!(!creds.in_group(5));
    }
}
