//! File registry implementation
//!
//! Binds caller-chosen file ids to a locator and a permission descriptor,
//! tracks the creating identity as owner and lets a fixed administrator
//! override ownership for deletion.

use crate::access::{self, AccessGrant, PublicMatch};
use crate::errors::*;
use crate::events::{AuditAction, AuditEvent, AuditSink, TracingAuditSink};
use filereg_storage::RecordStore;
use filereg_types::{
    FileId, FileRecord, Identity, Locator, PermissionDescriptor, StoredEntry, ValidationError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Construction-time options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    pub public_match: PublicMatch,
}

/// File registry
///
/// Mutations are serialised through one lock so that the owner check and the
/// store write happen as a single step; reads go straight to the store.
pub struct FileRegistry<S: RecordStore> {
    store: S,
    administrator: Identity,
    options: RegistryOptions,
    audit: Arc<dyn AuditSink>,
    write_lock: Mutex<()>,
}

impl<S: RecordStore> FileRegistry<S> {
    /// Open a registry over `store`, capturing `initializer` as administrator
    /// unless the store already carries one.
    pub fn initialize(store: S, initializer: Identity) -> Result<Self> {
        Self::with_options(store, initializer, RegistryOptions::default())
    }

    pub fn with_options(store: S, initializer: Identity, options: RegistryOptions) -> Result<Self> {
        if initializer.is_zero() {
            return Err(ValidationError::ZeroCaller.into());
        }

        let slot = store.init_administrator(initializer)?;
        let administrator = slot.identity();
        if slot.is_captured() {
            info!(
                %administrator,
                public_match = %options.public_match,
                "File registry initialised"
            );
        } else {
            debug!(%administrator, %initializer, "File registry reopened");
        }

        Ok(Self {
            store,
            administrator,
            options,
            audit: Arc::new(TracingAuditSink),
            write_lock: Mutex::new(()),
        })
    }

    /// Replace the default tracing audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn administrator(&self) -> Identity {
        self.administrator
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn try_create(
        &self,
        file_id: &FileId,
        locator: Locator,
        permissions: PermissionDescriptor,
        caller: Identity,
    ) -> Result<()> {
        file_id.validate()?;
        if caller.is_zero() {
            return Err(ValidationError::ZeroCaller.into());
        }
        let record = FileRecord::new(locator, permissions);
        record.validate()?;

        let _guard = self.write_lock.lock();
        let entry = StoredEntry {
            record,
            owner: caller,
        };
        if !self.store.insert(file_id, &entry)? {
            return Err(RegistryError::Conflict {
                file_id: file_id.clone(),
            });
        }

        self.emit(AuditAction::Created, file_id, caller);
        Ok(())
    }

    pub fn create(
        &self,
        file_id: &FileId,
        locator: Locator,
        permissions: PermissionDescriptor,
        caller: Identity,
    ) -> bool {
        project("create", self.try_create(file_id, locator, permissions, caller))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Stored record regardless of caller. Gate with [`Self::can_access`].
    pub fn try_read(&self, file_id: &FileId) -> Result<Option<FileRecord>> {
        Ok(self.store.load(file_id)?.map(|entry| entry.record))
    }

    pub fn read(&self, file_id: &FileId) -> Option<FileRecord> {
        self.try_read(file_id).unwrap_or_else(|err| {
            error!(%file_id, "read failed: {err}");
            None
        })
    }

    /// Legacy `locator|permissions` bytes, empty if absent.
    pub fn read_legacy(&self, file_id: &FileId) -> Vec<u8> {
        self.read(file_id)
            .map(|record| record.to_legacy_bytes())
            .unwrap_or_default()
    }

    pub fn get_locator(&self, file_id: &FileId) -> Option<Locator> {
        self.read(file_id).map(|record| record.locator)
    }

    pub fn get_permissions(&self, file_id: &FileId) -> Option<PermissionDescriptor> {
        self.read(file_id).map(|record| record.permissions)
    }

    pub fn try_exists(&self, file_id: &FileId) -> Result<bool> {
        Ok(self.store.contains(file_id)?)
    }

    pub fn exists(&self, file_id: &FileId) -> bool {
        self.try_exists(file_id).unwrap_or_else(|err| {
            error!(%file_id, "exists check failed: {err}");
            false
        })
    }

    pub fn try_get_owner(&self, file_id: &FileId) -> Result<Option<Identity>> {
        Ok(self.store.load(file_id)?.map(|entry| entry.owner))
    }

    /// Recorded owner, or [`Identity::ZERO`] if the record is absent.
    pub fn get_owner(&self, file_id: &FileId) -> Identity {
        match self.try_get_owner(file_id) {
            Ok(owner) => owner.unwrap_or(Identity::ZERO),
            Err(err) => {
                error!(%file_id, "owner lookup failed: {err}");
                Identity::ZERO
            }
        }
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn try_update(
        &self,
        file_id: &FileId,
        locator: Locator,
        permissions: PermissionDescriptor,
        caller: Identity,
    ) -> Result<()> {
        file_id.validate()?;
        let record = FileRecord::new(locator, permissions);
        record.validate()?;

        let _guard = self.write_lock.lock();
        self.require_owner(file_id, caller)?;
        if !self.store.replace_record(file_id, &record)? {
            return Err(RegistryError::NotFound {
                file_id: file_id.clone(),
            });
        }

        self.emit(AuditAction::Updated, file_id, caller);
        Ok(())
    }

    pub fn update(
        &self,
        file_id: &FileId,
        locator: Locator,
        permissions: PermissionDescriptor,
        caller: Identity,
    ) -> bool {
        project("update", self.try_update(file_id, locator, permissions, caller))
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    pub fn try_delete(&self, file_id: &FileId, caller: Identity) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.require_owner(file_id, caller)?;
        self.remove_entry(file_id)?;
        self.emit(AuditAction::Deleted, file_id, caller);
        Ok(())
    }

    pub fn delete(&self, file_id: &FileId, caller: Identity) -> bool {
        project("delete", self.try_delete(file_id, caller))
    }

    /// Administrator override. An absent record yields `NotFound` and no change.
    pub fn try_delete_as_admin(&self, file_id: &FileId, caller: Identity) -> Result<()> {
        if caller != self.administrator {
            return Err(RegistryError::Unauthorized {
                file_id: file_id.clone(),
                caller,
            });
        }

        let _guard = self.write_lock.lock();
        self.remove_entry(file_id)?;
        self.emit(AuditAction::AdminDeleted, file_id, caller);
        Ok(())
    }

    pub fn delete_as_admin(&self, file_id: &FileId, caller: Identity) -> bool {
        project("delete_as_admin", self.try_delete_as_admin(file_id, caller))
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    pub fn try_access_grant(
        &self,
        file_id: &FileId,
        requester: &Identity,
    ) -> Result<Option<AccessGrant>> {
        Ok(self
            .store
            .load(file_id)?
            .and_then(|entry| access::evaluate(&entry, requester, self.options.public_match)))
    }

    /// Advisory read check; never mutates state.
    pub fn can_access(&self, file_id: &FileId, requester: &Identity) -> bool {
        match self.try_access_grant(file_id, requester) {
            Ok(grant) => grant.is_some(),
            Err(err) => {
                error!(%file_id, "access evaluation failed: {err}");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Caller must hold the write lock.
    fn require_owner(&self, file_id: &FileId, caller: Identity) -> Result<()> {
        let entry = self
            .store
            .load(file_id)?
            .ok_or_else(|| RegistryError::NotFound {
                file_id: file_id.clone(),
            })?;
        if entry.owner != caller {
            return Err(RegistryError::Unauthorized {
                file_id: file_id.clone(),
                caller,
            });
        }
        Ok(())
    }

    fn remove_entry(&self, file_id: &FileId) -> Result<()> {
        if !self.store.remove(file_id)? {
            return Err(RegistryError::NotFound {
                file_id: file_id.clone(),
            });
        }
        Ok(())
    }

    fn emit(&self, action: AuditAction, file_id: &FileId, actor: Identity) {
        self.audit
            .record(AuditEvent::now(action, file_id.clone(), actor));
    }
}

/// Boolean projection of a registry result.
fn project(operation: &'static str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(RegistryError::Storage(err)) => {
            error!(operation, "storage failure: {err}");
            false
        }
        Err(err) => {
            debug!(operation, kind = ?err.kind(), "rejected: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryAuditSink;
    use filereg_storage::MemoryRecordStore;
    use filereg_types::{MAX_LOCATOR_BYTES, MAX_PERMISSIONS_BYTES};

    fn admin() -> Identity {
        Identity::derive(b"deployer")
    }

    fn alice() -> Identity {
        Identity::derive(b"alice")
    }

    fn bob() -> Identity {
        Identity::derive(b"bob")
    }

    fn registry() -> (FileRegistry<MemoryRecordStore>, MemoryAuditSink) {
        let sink = MemoryAuditSink::new();
        let registry = FileRegistry::initialize(MemoryRecordStore::new(), admin())
            .expect("registry")
            .with_audit_sink(Arc::new(sink.clone()));
        (registry, sink)
    }

    fn create_doc(registry: &FileRegistry<MemoryRecordStore>, id: &str, owner: Identity) {
        assert!(registry.create(
            &FileId::from(id),
            Locator::from("bafy-cid"),
            PermissionDescriptor::public(),
            owner,
        ));
    }

    #[test]
    fn test_create_and_read() {
        let (registry, sink) = registry();
        let id = FileId::from("doc");
        create_doc(&registry, "doc", alice());

        let record = registry.read(&id).unwrap();
        assert_eq!(record.locator, Locator::from("bafy-cid"));
        assert_eq!(record.permissions, PermissionDescriptor::public());
        assert_eq!(registry.read_legacy(&id), b"bafy-cid|public".to_vec());
        assert_eq!(registry.get_locator(&id), Some(Locator::from("bafy-cid")));
        assert_eq!(registry.get_permissions(&id), Some(PermissionDescriptor::public()));
        assert_eq!(registry.get_owner(&id), alice());
        assert!(registry.exists(&id));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AuditAction::Created);
        assert_eq!(events[0].file_id, id);
        assert_eq!(events[0].actor, alice());
    }

    #[test]
    fn test_absent_record_accessors() {
        let (registry, _) = registry();
        let id = FileId::from("missing");
        assert_eq!(registry.read(&id), None);
        assert!(registry.read_legacy(&id).is_empty());
        assert_eq!(registry.get_locator(&id), None);
        assert_eq!(registry.get_permissions(&id), None);
        assert_eq!(registry.get_owner(&id), Identity::ZERO);
        assert!(!registry.exists(&id));
        assert!(!registry.can_access(&id, &alice()));
    }

    #[test]
    fn test_create_rejections_are_classified() {
        let (registry, sink) = registry();
        let id = FileId::from("doc");
        let public = PermissionDescriptor::public();

        let empty_id = FileId::new(Vec::<u8>::new());
        let err = registry
            .try_create(&empty_id, Locator::from("cid"), public.clone(), alice())
            .unwrap_err();
        assert_eq!(err.kind(), RejectionKind::Validation);

        let err = registry
            .try_create(&id, Locator::new(Vec::<u8>::new()), public.clone(), alice())
            .unwrap_err();
        assert_eq!(err.kind(), RejectionKind::Validation);

        let empty_perms = PermissionDescriptor::new(Vec::<u8>::new());
        let err = registry
            .try_create(&id, Locator::from("cid"), empty_perms, alice())
            .unwrap_err();
        assert_eq!(err.kind(), RejectionKind::Validation);

        let err = registry
            .try_create(&id, Locator::from("cid"), public.clone(), Identity::ZERO)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ValidationError::ZeroCaller)));

        registry
            .try_create(&id, Locator::from("cid"), public.clone(), alice())
            .unwrap();
        let err = registry
            .try_create(&id, Locator::from("cid-2"), public, bob())
            .unwrap_err();
        assert_eq!(err.kind(), RejectionKind::Conflict);

        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_locator_size_boundary() {
        let (registry, _) = registry();
        assert!(!registry.create(
            &FileId::from("big"),
            Locator::new(vec![b'x'; MAX_LOCATOR_BYTES + 1]),
            PermissionDescriptor::public(),
            alice(),
        ));
        assert!(!registry.exists(&FileId::from("big")));

        assert!(registry.create(
            &FileId::from("big"),
            Locator::new(vec![b'x'; MAX_LOCATOR_BYTES]),
            PermissionDescriptor::public(),
            alice(),
        ));
    }

    #[test]
    fn test_update_by_owner() {
        let (registry, sink) = registry();
        let id = FileId::from("doc");
        create_doc(&registry, "doc", alice());

        assert!(registry.update(
            &id,
            Locator::from("bafy-v2"),
            PermissionDescriptor::allow_list(&[bob()]),
            alice(),
        ));
        let record = registry.read(&id).unwrap();
        assert_eq!(record.locator, Locator::from("bafy-v2"));
        assert_eq!(registry.get_owner(&id), alice());

        let actions: Vec<_> = sink.events().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Created, AuditAction::Updated]);
    }

    #[test]
    fn test_update_rejections() {
        let (registry, _) = registry();
        let id = FileId::from("doc");

        let err = registry
            .try_update(&id, Locator::from("x"), PermissionDescriptor::public(), alice())
            .unwrap_err();
        assert_eq!(err.kind(), RejectionKind::NotFound);

        create_doc(&registry, "doc", alice());
        let before = registry.read(&id);

        let err = registry
            .try_update(&id, Locator::from("x"), PermissionDescriptor::public(), bob())
            .unwrap_err();
        assert_eq!(err.kind(), RejectionKind::Unauthorized);

        let err = registry
            .try_update(
                &id,
                Locator::from("x"),
                PermissionDescriptor::new(vec![b'p'; 129]),
                alice(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), RejectionKind::Validation);

        assert_eq!(registry.read(&id), before);
    }

    #[test]
    fn test_delete_owner_only() {
        let (registry, sink) = registry();
        let id = FileId::from("doc");
        create_doc(&registry, "doc", alice());

        assert!(!registry.delete(&id, bob()));
        assert!(registry.exists(&id));

        assert!(registry.delete(&id, alice()));
        assert!(!registry.exists(&id));
        assert!(!registry.delete(&id, alice()));

        let last = sink.events().pop().unwrap();
        assert_eq!(last.action, AuditAction::Deleted);
    }

    #[test]
    fn test_recreate_after_delete() {
        let (registry, _) = registry();
        let id = FileId::from("doc");
        create_doc(&registry, "doc", alice());
        assert!(registry.delete(&id, alice()));

        create_doc(&registry, "doc", bob());
        assert_eq!(registry.get_owner(&id), bob());
    }

    #[test]
    fn test_admin_override() {
        let (registry, sink) = registry();
        let id = FileId::from("doc");
        create_doc(&registry, "doc", alice());

        assert!(!registry.delete_as_admin(&id, bob()));
        assert!(!registry.delete_as_admin(&id, alice()));
        assert!(registry.exists(&id));

        assert!(registry.delete_as_admin(&id, admin()));
        assert!(!registry.exists(&id));

        let last = sink.events().pop().unwrap();
        assert_eq!(last.action, AuditAction::AdminDeleted);
        assert_eq!(last.actor, admin());
    }

    #[test]
    fn test_admin_delete_absent_is_quiet_no_op() {
        let (registry, sink) = registry();
        let err = registry
            .try_delete_as_admin(&FileId::from("ghost"), admin())
            .unwrap_err();
        assert_eq!(err.kind(), RejectionKind::NotFound);
        assert!(!registry.delete_as_admin(&FileId::from("ghost"), admin()));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_access_evaluation_example() {
        let (registry, _) = registry();
        let carol = Identity::derive(b"carol");
        let owner = Identity::derive(b"owner");
        let listed = FileId::from("listed");
        let open = FileId::from("open");

        assert!(registry.create(
            &listed,
            Locator::from("cid"),
            PermissionDescriptor::allow_list(&[alice(), bob()]),
            owner,
        ));
        let public = PermissionDescriptor::public();
        assert!(registry.create(&open, Locator::from("cid"), public, owner));

        assert!(registry.can_access(&listed, &alice()));
        assert!(registry.can_access(&listed, &bob()));
        assert!(registry.can_access(&listed, &owner));
        assert!(!registry.can_access(&listed, &carol));
        assert!(registry.can_access(&open, &carol));
        assert_eq!(
            registry.try_access_grant(&listed, &owner).unwrap(),
            Some(AccessGrant::Owner)
        );
    }

    #[test]
    fn test_two_member_allow_list_from_encoded_text() {
        let (registry, _) = registry();
        let id = FileId::from("shared");
        let owner = Identity::derive(b"owner");
        let text = format!("{},{}", alice().encode(), bob().encode());
        assert!(text.len() <= MAX_PERMISSIONS_BYTES);

        registry
            .try_create(&id, Locator::from("cid"), PermissionDescriptor::from(text.as_str()), owner)
            .unwrap();
        assert_eq!(
            registry.try_access_grant(&id, &bob()).unwrap(),
            Some(AccessGrant::Listed)
        );
        assert!(registry.can_access(&id, &alice()));
        assert!(!registry.can_access(&id, &Identity::derive(b"carol")));

        // Widest identities still leave room for two entries.
        let widest = Identity::from_bytes([0xFF; 32]);
        let pair = PermissionDescriptor::allow_list(&[widest, alice()]);
        registry
            .try_update(&id, Locator::from("cid-2"), pair, owner)
            .unwrap();
        assert!(registry.can_access(&id, &widest));
        assert!(!registry.can_access(&id, &bob()));
    }

    #[test]
    fn test_exact_token_mode() {
        let registry = FileRegistry::with_options(
            MemoryRecordStore::new(),
            admin(),
            RegistryOptions {
                public_match: PublicMatch::ExactToken,
            },
        )
        .unwrap();
        let id = FileId::from("doc");
        assert!(registry.create(
            &id,
            Locator::from("cid"),
            PermissionDescriptor::from("notpublicly,alice"),
            bob(),
        ));
        assert!(!registry.can_access(&id, &Identity::derive(b"stranger")));
    }

    #[test]
    fn test_administrator_fixed_at_first_initialisation() {
        let store = MemoryRecordStore::new();
        let first = FileRegistry::initialize(store.clone(), admin()).unwrap();
        assert_eq!(first.administrator(), admin());

        let second = FileRegistry::initialize(store, alice()).unwrap();
        assert_eq!(second.administrator(), admin());
    }

    #[test]
    fn test_zero_initializer_rejected() {
        let result = FileRegistry::initialize(MemoryRecordStore::new(), Identity::ZERO);
        assert!(matches!(
            result,
            Err(RegistryError::Validation(ValidationError::ZeroCaller))
        ));
    }
}
