//! Contact and invitation business logic.
//!
//! [`ContactService`] validates input, then drives the blocking [`Store`]
//! from tokio's blocking pool. It is the only path by which the HTTP API
//! and the bot mutate state.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use giftlink_shared::constants::MAX_AGE_YEARS;
use giftlink_shared::UserClaims;
use giftlink_store::{
    AcceptOutcome, ClosePerson, ClosePersonUpdate, InvitationAcceptance, NewClosePerson, NewUser,
    Store, StoreError,
};

use crate::notify::{notify_best_effort, Notification, Notifier};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("You cannot accept your own invitation")]
    SelfInvitation,

    #[error("Unknown inviter: {0}")]
    UnknownInviter(String),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Clone)]
pub struct ContactService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl ContactService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Run a store operation on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Store) -> std::result::Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| ServiceError::Internal(format!("store task failed: {e}")))?
            .map_err(ServiceError::from)
    }

    /// Register the user if unseen. Existing rows are left untouched.
    pub async fn ensure_user(&self, claims: &UserClaims) -> Result<()> {
        let user = new_user(claims);
        let created = self.with_store(move |store| store.ensure_user(&user)).await?;
        if created {
            info!(user_id = claims.id, "Registered new user");
        }
        Ok(())
    }

    pub async fn list_close_people(&self, owner_id: &str) -> Result<Vec<ClosePerson>> {
        let owner_id = owner_id.to_string();
        self.with_store(move |store| store.list_close_people(&owner_id))
            .await
    }

    pub async fn add_close_person(&self, owner_id: &str, mut person: NewClosePerson) -> Result<i64> {
        person.name = validate_name(&person.name)?;
        validate_age(person.age)?;

        let owner = owner_id.to_string();
        let id = self
            .with_store(move |store| store.add_close_person(&owner, &person))
            .await?;
        info!(owner_id, person_db_id = id, "Close person added");
        Ok(id)
    }

    /// Apply a partial update. Returns `false` when nothing matched or the
    /// update carried no fields.
    pub async fn update_close_person(
        &self,
        owner_id: &str,
        person_db_id: i64,
        mut update: ClosePersonUpdate,
    ) -> Result<bool> {
        if let Some(name) = &update.name {
            update.name = Some(validate_name(name)?);
        }
        validate_age(update.age)?;

        if update.is_empty() {
            debug!(owner_id, person_db_id, "Empty update ignored");
            return Ok(false);
        }

        let owner = owner_id.to_string();
        let updated = self
            .with_store(move |store| store.update_close_person(&owner, person_db_id, &update))
            .await?;
        debug!(owner_id, person_db_id, updated, "Close person update applied");
        Ok(updated)
    }

    /// Delete the caller's rows among `ids`. Returns how many were removed.
    pub async fn delete_close_people(&self, owner_id: &str, ids: Vec<i64>) -> Result<usize> {
        let owner = owner_id.to_string();
        let deleted = self
            .with_store(move |store| store.delete_close_people(&owner, &ids))
            .await?;
        info!(owner_id, deleted, "Close people deleted");
        Ok(deleted)
    }

    /// Record that `inviter_id` invited `invited_id`. Idempotent.
    pub async fn record_invitation(&self, inviter_id: &str, invited_id: &str) -> Result<bool> {
        if inviter_id == invited_id {
            return Err(ServiceError::SelfInvitation);
        }
        let (inviter, invited) = (inviter_id.to_string(), invited_id.to_string());
        self.with_store(move |store| store.record_invitation_if_absent(&inviter, &invited))
            .await
    }

    /// Accept `inviter_id`'s invitation on behalf of `invited`.
    ///
    /// Registers the invited user, records the invitation, and adds the
    /// invited user to the inviter's close people in one store
    /// transaction. Repeating the call changes nothing. The inviter is
    /// notified in the background, only when the invitation is new.
    pub async fn accept_invitation(&self, inviter_id: &str, invited: &UserClaims) -> Result<AcceptOutcome> {
        let inviter_id = inviter_id.trim();
        if inviter_id.is_empty() {
            return Err(ServiceError::Validation("inviter id is required".into()));
        }
        if inviter_id == invited.user_id() {
            return Err(ServiceError::SelfInvitation);
        }

        let acceptance = InvitationAcceptance {
            inviter_id: inviter_id.to_string(),
            invited: new_user(invited),
            contact_name: invited.contact_name(),
        };

        let outcome = self
            .with_store(move |store| store.accept_invitation(&acceptance))
            .await
            .map_err(|e| match e {
                ServiceError::Store(StoreError::UnknownUser(id)) => ServiceError::UnknownInviter(id),
                other => other,
            })?;

        if outcome.invitation_created {
            info!(
                inviter_id,
                invited_id = invited.id,
                close_person_id = ?outcome.close_person_id,
                "Invitation accepted"
            );
            let notifier = Arc::clone(&self.notifier);
            let notification = Notification::InvitationAccepted {
                inviter_id: inviter_id.to_string(),
                invited_name: invited.display_name(),
            };
            // Delivery must not hold up the caller.
            tokio::spawn(async move {
                notify_best_effort(notifier.as_ref(), notification).await;
            });
        } else {
            debug!(inviter_id, invited_id = invited.id, "Invitation already recorded");
        }

        Ok(outcome)
    }
}

fn new_user(claims: &UserClaims) -> NewUser {
    NewUser {
        user_id: claims.user_id(),
        username: claims.username.clone(),
        first_name: claims.first_name.clone(),
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation("name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

fn validate_age(age: Option<i32>) -> Result<()> {
    match age {
        Some(age) if !(0..=MAX_AGE_YEARS).contains(&age) => Err(ServiceError::Validation(format!(
            "age must be between 0 and {MAX_AGE_YEARS}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use giftlink_store::Database;

    use super::*;
    use crate::notify::tests::RecordingNotifier;

    fn claims(id: u64, first_name: &str) -> UserClaims {
        let mut claims = UserClaims::new(id);
        claims.first_name = Some(first_name.into());
        claims
    }

    fn service() -> (ContactService, Arc<dyn Store>, Arc<RecordingNotifier>) {
        let store: Arc<dyn Store> = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = ContactService::new(Arc::clone(&store), notifier.clone());
        (service, store, notifier)
    }

    #[tokio::test]
    async fn ensure_user_twice_keeps_one_row() {
        let (service, store, _) = service();
        service.ensure_user(&claims(1, "Ann")).await.unwrap();
        service.ensure_user(&claims(1, "Changed")).await.unwrap();

        let user = store.get_user("1").unwrap().unwrap();
        assert_eq!(user.first_name.as_deref(), Some("Ann"));
    }

    #[tokio::test]
    async fn add_requires_name() {
        let (service, _, _) = service();
        service.ensure_user(&claims(1, "Ann")).await.unwrap();

        let err = service
            .add_close_person("1", NewClosePerson::named("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut person = NewClosePerson::named("  Bob ");
        person.age = Some(-3);
        assert!(service.add_close_person("1", person.clone()).await.is_err());

        person.age = Some(40);
        let id = service.add_close_person("1", person).await.unwrap();
        let people = service.list_close_people("1").await.unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].id, id);
        assert_eq!(people[0].name, "Bob");
    }

    #[tokio::test]
    async fn update_keeps_unspecified_fields() {
        let (service, store, _) = service();
        service.ensure_user(&claims(1, "Ann")).await.unwrap();

        let mut alice = NewClosePerson::named("Alice");
        alice.age = Some(30);
        let id = service.add_close_person("1", alice).await.unwrap();

        let update = ClosePersonUpdate {
            age: Some(31),
            ..Default::default()
        };
        assert!(service.update_close_person("1", id, update).await.unwrap());

        let stored = store.get_close_person(id).unwrap().unwrap();
        assert_eq!(stored.name, "Alice");
        assert_eq!(stored.age, Some(31));

        // No recognized fields: no-op, not an error.
        assert!(!service
            .update_close_person("1", id, ClosePersonUpdate::default())
            .await
            .unwrap());

        // Empty name is rejected rather than stored.
        let update = ClosePersonUpdate {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(service.update_close_person("1", id, update).await.is_err());
    }

    #[tokio::test]
    async fn other_owners_rows_are_untouchable() {
        let (service, store, _) = service();
        service.ensure_user(&claims(1, "Ann")).await.unwrap();
        service.ensure_user(&claims(2, "Eve")).await.unwrap();
        let id = service
            .add_close_person("1", NewClosePerson::named("Alice"))
            .await
            .unwrap();

        let update = ClosePersonUpdate {
            name: Some("Owned".into()),
            ..Default::default()
        };
        assert!(!service.update_close_person("2", id, update).await.unwrap());
        assert_eq!(service.delete_close_people("2", vec![id]).await.unwrap(), 0);
        assert_eq!(store.get_close_person(id).unwrap().unwrap().name, "Alice");
    }

    #[tokio::test]
    async fn record_invitation_rejects_self_and_is_idempotent() {
        let (service, store, _) = service();
        service.ensure_user(&claims(1, "Ann")).await.unwrap();
        service.ensure_user(&claims(2, "Bea")).await.unwrap();

        assert!(matches!(
            service.record_invitation("1", "1").await,
            Err(ServiceError::SelfInvitation)
        ));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.record_invitation("1", "2").await })
            })
            .collect();
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert!(store.check_invitation("1", "2").unwrap().is_some());
    }

    #[tokio::test]
    async fn accept_invitation_end_to_end() {
        let (service, store, notifier) = service();
        service.ensure_user(&claims(1, "Ann")).await.unwrap();

        let bea = claims(2, "Bea");
        let outcome = service.accept_invitation("1", &bea).await.unwrap();
        assert!(outcome.invitation_created);

        assert!(store.get_user("2").unwrap().is_some());
        assert!(store.check_invitation("1", "2").unwrap().is_some());
        let people = store.list_close_people("1").unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].person_id.as_deref(), Some("2"));
        assert_eq!(people[0].name, "Bea");
        assert_eq!(Some(people[0].id), outcome.close_person_id);

        wait_for_notifications(&notifier, 1).await;

        // Repeating the acceptance creates nothing and notifies nobody.
        let again = service.accept_invitation("1", &bea).await.unwrap();
        assert!(!again.invitation_created);
        assert_eq!(store.list_close_people("1").unwrap().len(), 1);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(
            *sent,
            vec![Notification::InvitationAccepted {
                inviter_id: "1".into(),
                invited_name: "Bea".into(),
            }]
        );
    }

    async fn wait_for_notifications(notifier: &RecordingNotifier, count: usize) {
        for _ in 0..100 {
            if notifier.sent.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} notification(s)");
    }

    /// Never finishes delivering.
    struct StalledNotifier;

    #[async_trait::async_trait]
    impl Notifier for StalledNotifier {
        async fn send(&self, _notification: &Notification) -> anyhow::Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn slow_notifier_does_not_delay_acceptance() {
        let store: Arc<dyn Store> = Arc::new(Database::open_in_memory().unwrap());
        let service = ContactService::new(Arc::clone(&store), Arc::new(StalledNotifier));
        service.ensure_user(&claims(1, "Ann")).await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            service.accept_invitation("1", &claims(2, "Bea")),
        )
        .await
        .expect("acceptance waited on notification delivery")
        .unwrap();
        assert!(outcome.invitation_created);
    }

    #[tokio::test]
    async fn accept_invitation_rejections() {
        let (service, store, _) = service();
        let ann = claims(1, "Ann");
        service.ensure_user(&ann).await.unwrap();

        assert!(matches!(
            service.accept_invitation("1", &ann).await,
            Err(ServiceError::SelfInvitation)
        ));
        assert!(matches!(
            service.accept_invitation("  ", &ann).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service.accept_invitation("404", &claims(2, "Bea")).await,
            Err(ServiceError::UnknownInviter(id)) if id == "404"
        ));
        assert!(store.list_close_people("1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_acceptance() {
        let store: Arc<dyn Store> = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let service = ContactService::new(Arc::clone(&store), notifier.clone());
        service.ensure_user(&claims(1, "Ann")).await.unwrap();

        let outcome = service.accept_invitation("1", &claims(2, "Bea")).await.unwrap();
        assert!(outcome.invitation_created);
        wait_for_notifications(&notifier, 1).await;
    }
}
