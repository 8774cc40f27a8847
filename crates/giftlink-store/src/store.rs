//! The persistence contract shared by every backend.

use std::path::PathBuf;
use std::sync::Arc;

use crate::database::Database;
use crate::error::Result;
use crate::models::{
    AcceptOutcome, ClosePerson, ClosePersonUpdate, Invitation, InvitationAcceptance,
    NewClosePerson, NewUser, User,
};
use crate::pg_store::{self, PgStore};
use crate::{close_people, invitations, users};

/// Capability set of a persistence backend.
///
/// Implementations are blocking and must be safe to share between
/// threads; each call is atomic on its own.
pub trait Store: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Insert the user unless already present. Returns `true` if inserted.
    fn ensure_user(&self, user: &NewUser) -> Result<bool>;

    fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Returns the generated id. Fails with `UnknownUser` if the owner has
    /// never been registered.
    fn add_close_person(&self, owner_id: &str, person: &NewClosePerson) -> Result<i64>;

    fn get_close_person(&self, id: i64) -> Result<Option<ClosePerson>>;

    /// Most recently added first.
    fn list_close_people(&self, owner_id: &str) -> Result<Vec<ClosePerson>>;

    /// Returns `false` when no row owned by `owner_id` has that id, or when
    /// the update carries no fields.
    fn update_close_person(&self, owner_id: &str, id: i64, update: &ClosePersonUpdate) -> Result<bool>;

    /// Returns the number of rows deleted.
    fn delete_close_people(&self, owner_id: &str, ids: &[i64]) -> Result<usize>;

    /// Returns `true` if the pair was newly recorded.
    fn record_invitation_if_absent(&self, inviter_id: &str, invited_id: &str) -> Result<bool>;

    fn check_invitation(&self, inviter_id: &str, invited_id: &str) -> Result<Option<Invitation>>;

    /// Register the invited user, record the invitation, and link the
    /// invited user into the inviter's close people, atomically.
    fn accept_invitation(&self, acceptance: &InvitationAcceptance) -> Result<AcceptOutcome>;
}

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite { path: PathBuf },
    Postgres { url: String },
}

/// Open the configured backend, running migrations / schema setup.
pub fn open_store(backend: &StoreBackend) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match backend {
        StoreBackend::Sqlite { path } => Arc::new(Database::open_at(path)?),
        StoreBackend::Postgres { url } => Arc::new(PgStore::connect(url)?),
    };
    tracing::info!(backend = store.backend_name(), "store ready");
    Ok(store)
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

impl Store for Database {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn ensure_user(&self, user: &NewUser) -> Result<bool> {
        users::ensure_user(&*self.lock()?, user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        users::get_user(&*self.lock()?, user_id)
    }

    fn add_close_person(&self, owner_id: &str, person: &NewClosePerson) -> Result<i64> {
        close_people::add_close_person(&*self.lock()?, owner_id, person)
    }

    fn get_close_person(&self, id: i64) -> Result<Option<ClosePerson>> {
        close_people::get_close_person(&*self.lock()?, id)
    }

    fn list_close_people(&self, owner_id: &str) -> Result<Vec<ClosePerson>> {
        close_people::list_close_people(&*self.lock()?, owner_id)
    }

    fn update_close_person(&self, owner_id: &str, id: i64, update: &ClosePersonUpdate) -> Result<bool> {
        close_people::update_close_person(&*self.lock()?, owner_id, id, update)
    }

    fn delete_close_people(&self, owner_id: &str, ids: &[i64]) -> Result<usize> {
        close_people::delete_close_people(&*self.lock()?, owner_id, ids)
    }

    fn record_invitation_if_absent(&self, inviter_id: &str, invited_id: &str) -> Result<bool> {
        invitations::record_invitation_if_absent(&*self.lock()?, inviter_id, invited_id)
    }

    fn check_invitation(&self, inviter_id: &str, invited_id: &str) -> Result<Option<Invitation>> {
        invitations::check_invitation(&*self.lock()?, inviter_id, invited_id)
    }

    fn accept_invitation(&self, acceptance: &InvitationAcceptance) -> Result<AcceptOutcome> {
        invitations::accept_invitation(&mut *self.lock()?, acceptance)
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

impl Store for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn ensure_user(&self, user: &NewUser) -> Result<bool> {
        pg_store::ensure_user(&mut *self.lock()?, user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        pg_store::get_user(&mut *self.lock()?, user_id)
    }

    fn add_close_person(&self, owner_id: &str, person: &NewClosePerson) -> Result<i64> {
        pg_store::add_close_person(&mut *self.lock()?, owner_id, person)
    }

    fn get_close_person(&self, id: i64) -> Result<Option<ClosePerson>> {
        pg_store::get_close_person(&mut *self.lock()?, id)
    }

    fn list_close_people(&self, owner_id: &str) -> Result<Vec<ClosePerson>> {
        pg_store::list_close_people(&mut *self.lock()?, owner_id)
    }

    fn update_close_person(&self, owner_id: &str, id: i64, update: &ClosePersonUpdate) -> Result<bool> {
        pg_store::update_close_person(&mut *self.lock()?, owner_id, id, update)
    }

    fn delete_close_people(&self, owner_id: &str, ids: &[i64]) -> Result<usize> {
        pg_store::delete_close_people(&mut *self.lock()?, owner_id, ids)
    }

    fn record_invitation_if_absent(&self, inviter_id: &str, invited_id: &str) -> Result<bool> {
        pg_store::record_invitation_if_absent(&mut *self.lock()?, inviter_id, invited_id)
    }

    fn check_invitation(&self, inviter_id: &str, invited_id: &str) -> Result<Option<Invitation>> {
        pg_store::check_invitation(&mut *self.lock()?, inviter_id, invited_id)
    }

    fn accept_invitation(&self, acceptance: &InvitationAcceptance) -> Result<AcceptOutcome> {
        pg_store::accept_invitation(&mut *self.lock()?, acceptance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StoreBackend::Sqlite {
            path: dir.path().join("gift_bot.db"),
        };
        let store = open_store(&backend).unwrap();
        assert_eq!(store.backend_name(), "sqlite");

        assert!(store.ensure_user(&NewUser::new("1")).unwrap());
        let id = store
            .add_close_person("1", &NewClosePerson::named("Alice"))
            .unwrap();
        assert_eq!(store.list_close_people("1").unwrap()[0].id, id);
    }

    #[test]
    fn every_operation_through_the_trait() {
        let store: Arc<dyn Store> = Arc::new(Database::open_in_memory().unwrap());

        assert!(store.ensure_user(&NewUser::new("1")).unwrap());
        assert_eq!(store.get_user("1").unwrap().unwrap().user_id, "1");

        let id = store
            .add_close_person("1", &NewClosePerson::named("Alice"))
            .unwrap();
        let update = ClosePersonUpdate {
            age: Some(40),
            ..Default::default()
        };
        assert!(store.update_close_person("1", id, &update).unwrap());
        assert_eq!(store.get_close_person(id).unwrap().unwrap().age, Some(40));

        let acceptance = InvitationAcceptance {
            inviter_id: "1".into(),
            invited: NewUser::new("2"),
            contact_name: "User".into(),
        };
        let outcome = store.accept_invitation(&acceptance).unwrap();
        assert!(outcome.invitation_created);
        assert!(!store.record_invitation_if_absent("1", "2").unwrap());
        assert!(store.check_invitation("1", "2").unwrap().is_some());

        assert_eq!(store.list_close_people("1").unwrap().len(), 2);
        assert_eq!(store.delete_close_people("1", &[id]).unwrap(), 1);
    }

    #[test]
    fn store_is_object_safe_and_shareable() {
        let store: Arc<dyn Store> = Arc::new(Database::open_in_memory().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.ensure_user(&NewUser::new(format!("u{i}"))))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().unwrap());
        }
    }
}
