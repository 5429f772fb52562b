//! Management-plane API boundary.
//!
//! The management plane is an external collaborator; this module pins
//! down the slice of its surface the cache needs and nothing more. A
//! concrete transport lives outside this crate — tests use an in-memory
//! implementation.

use tracing::warn;

use crate::error::ModelResult;
use crate::types::{
    BondRecord, BondRef, HostRef, NetworkRecord, NetworkRef, PifRecord, PifRef, SessionRef,
    VlanRecord, VlanRef,
};

/// A PIF record as returned by the management API, before per-host
/// filtering. The `host` field is dropped once filtering has happened.
#[derive(Debug, Clone)]
pub struct ApiPif {
    /// The PIF's opaque reference.
    pub pif: PifRef,
    /// The host this PIF belongs to.
    pub host: HostRef,
    /// The record itself.
    pub record: PifRecord,
}

/// The slice of the management API consumed by cache construction.
pub trait ManagementApi {
    /// Opens a new session.
    fn login(&self) -> ModelResult<SessionRef>;

    /// Closes a session previously opened with [`login`](Self::login).
    fn logout(&self, session: &SessionRef) -> ModelResult<()>;

    /// Resolves an installation identifier to a host reference.
    fn host_by_installation_uuid(
        &self,
        session: &SessionRef,
        uuid: &str,
    ) -> ModelResult<HostRef>;

    /// All PIF records known to the management plane, with their owning
    /// host.
    fn pif_records(&self, session: &SessionRef) -> ModelResult<Vec<ApiPif>>;

    /// All VLAN records.
    fn vlan_records(&self, session: &SessionRef) -> ModelResult<Vec<(VlanRef, VlanRecord)>>;

    /// All Bond records.
    fn bond_records(&self, session: &SessionRef) -> ModelResult<Vec<(BondRef, BondRecord)>>;

    /// All Network records.
    fn network_records(&self, session: &SessionRef)
        -> ModelResult<Vec<(NetworkRef, NetworkRecord)>>;
}

/// A session scope over a [`ManagementApi`].
///
/// When constructed without a caller-supplied session, the guard logs in
/// itself and guarantees logout when dropped, error paths included. A
/// borrowed session is left untouched.
pub struct SessionGuard<'a> {
    api: &'a dyn ManagementApi,
    session: SessionRef,
    owned: bool,
}

impl<'a> SessionGuard<'a> {
    /// Wraps an existing session, or logs in when none is supplied.
    pub fn new(api: &'a dyn ManagementApi, existing: Option<SessionRef>) -> ModelResult<Self> {
        match existing {
            Some(session) => Ok(Self {
                api,
                session,
                owned: false,
            }),
            None => {
                let session = api.login()?;
                Ok(Self {
                    api,
                    session,
                    owned: true,
                })
            }
        }
    }

    /// The session reference to pass to API calls.
    pub fn session(&self) -> &SessionRef {
        &self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = self.api.logout(&self.session) {
                warn!(error = %e, "Failed to log out management session");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use std::cell::RefCell;

    /// Counts login/logout calls; record getters are unused here.
    struct SessionCounter {
        logins: RefCell<u32>,
        logouts: RefCell<Vec<SessionRef>>,
    }

    impl SessionCounter {
        fn new() -> Self {
            Self {
                logins: RefCell::new(0),
                logouts: RefCell::new(Vec::new()),
            }
        }
    }

    impl ManagementApi for SessionCounter {
        fn login(&self) -> ModelResult<SessionRef> {
            *self.logins.borrow_mut() += 1;
            Ok(SessionRef::new("OpaqueRef:session"))
        }

        fn logout(&self, session: &SessionRef) -> ModelResult<()> {
            self.logouts.borrow_mut().push(session.clone());
            Ok(())
        }

        fn host_by_installation_uuid(
            &self,
            _session: &SessionRef,
            _uuid: &str,
        ) -> ModelResult<HostRef> {
            Err(ModelError::api("not implemented"))
        }

        fn pif_records(&self, _session: &SessionRef) -> ModelResult<Vec<ApiPif>> {
            Ok(Vec::new())
        }

        fn vlan_records(
            &self,
            _session: &SessionRef,
        ) -> ModelResult<Vec<(VlanRef, VlanRecord)>> {
            Ok(Vec::new())
        }

        fn bond_records(
            &self,
            _session: &SessionRef,
        ) -> ModelResult<Vec<(BondRef, BondRecord)>> {
            Ok(Vec::new())
        }

        fn network_records(
            &self,
            _session: &SessionRef,
        ) -> ModelResult<Vec<(NetworkRef, NetworkRecord)>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_owned_session_logs_out_on_drop() {
        let api = SessionCounter::new();
        {
            let guard = SessionGuard::new(&api, None).unwrap();
            assert_eq!(guard.session().as_str(), "OpaqueRef:session");
        }
        assert_eq!(*api.logins.borrow(), 1);
        assert_eq!(api.logouts.borrow().len(), 1);
    }

    #[test]
    fn test_borrowed_session_is_left_open() {
        let api = SessionCounter::new();
        {
            let _guard =
                SessionGuard::new(&api, Some(SessionRef::new("OpaqueRef:caller"))).unwrap();
        }
        assert_eq!(*api.logins.borrow(), 0);
        assert!(api.logouts.borrow().is_empty());
    }
}
