//! The shopper's address book.
//!
//! Addresses live on the user record; there is no list endpoint, so the
//! list is read from `/users/{id}`. Saving an address marked default
//! clears the flag on the others server-side.

use std::sync::Arc;

use async_trait::async_trait;
use pethub_core::{Address, AddressDraft, AddressId, UserId};
use tracing::{info, instrument};

use crate::api::types::{AddressDto, AddressRequest, UserDto, UserRef};
use crate::api::{ApiClient, ApiError, conversions, segment};
use crate::error::{CartError, Result};
use crate::session::Authenticator;

/// Address endpoints of the backend.
#[async_trait]
pub trait AddressBackend: Send + Sync {
    /// Addresses saved on a user.
    async fn list(&self, user: &UserId) -> Result<Vec<Address>>;

    async fn get(&self, id: &AddressId) -> Result<Address>;

    /// Save a new address and return it as stored.
    async fn create(&self, user: &UserId, draft: &AddressDraft) -> Result<Address>;

    /// Replace an address and return it as stored.
    async fn update(&self, user: &UserId, id: &AddressId, draft: &AddressDraft)
    -> Result<Address>;

    async fn delete(&self, user: &UserId, id: &AddressId) -> Result<()>;
}

fn request<'a>(user: &'a UserId, draft: &'a AddressDraft) -> AddressRequest<'a> {
    AddressRequest {
        user_id: user.as_str(),
        label: draft.label(),
        name: draft.name.trim(),
        lastname: draft.lastname(),
        phone: draft.phone.trim(),
        address: draft.detail.trim(),
        zip_code: draft.zip_code.trim(),
        province: draft.province.trim(),
        district: draft.district.trim(),
        is_default: draft.is_default,
    }
}

fn stored(dto: AddressDto) -> Result<Address> {
    conversions::convert_address(dto).ok_or(CartError::Network(ApiError::MissingField("_id")))
}

/// [`AddressBackend`] over the PetHub REST API.
#[derive(Clone)]
pub struct HttpAddresses {
    api: ApiClient,
}

impl HttpAddresses {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AddressBackend for HttpAddresses {
    async fn list(&self, user: &UserId) -> Result<Vec<Address>> {
        let record: UserDto = self
            .api
            .get_json(&format!("/users/{}", segment(user.as_str())))
            .await?;
        Ok(conversions::convert_addresses(record.addresses))
    }

    async fn get(&self, id: &AddressId) -> Result<Address> {
        let dto: AddressDto = self
            .api
            .get_json(&format!("/addresses/{}", segment(id.as_str())))
            .await?;
        stored(dto)
    }

    async fn create(&self, user: &UserId, draft: &AddressDraft) -> Result<Address> {
        let dto: AddressDto = self
            .api
            .post_json("/addresses", &request(user, draft))
            .await?;
        stored(dto)
    }

    async fn update(
        &self,
        user: &UserId,
        id: &AddressId,
        draft: &AddressDraft,
    ) -> Result<Address> {
        let dto: AddressDto = self
            .api
            .patch_json(
                &format!("/addresses/{}", segment(id.as_str())),
                &request(user, draft),
            )
            .await?;
        stored(dto)
    }

    async fn delete(&self, user: &UserId, id: &AddressId) -> Result<()> {
        let body = UserRef {
            user_id: user.as_str(),
        };
        self.api
            .delete(&format!("/addresses/{}", segment(id.as_str())), &body)
            .await?;
        Ok(())
    }
}

/// Address book operations for the current shopper.
#[derive(Clone)]
pub struct AddressBook {
    backend: Arc<dyn AddressBackend>,
    auth: Arc<dyn Authenticator>,
}

impl AddressBook {
    #[must_use]
    pub fn new(backend: Arc<dyn AddressBackend>, auth: Arc<dyn Authenticator>) -> Self {
        Self { backend, auth }
    }

    /// Every saved address.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` or the request failure.
    #[instrument(skip(self))]
    pub async fn addresses(&self) -> Result<Vec<Address>> {
        let user = self.auth.current_user_id().await?;
        self.backend.list(&user).await
    }

    /// One address by id.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, `Network(NotFound)` or the request failure.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn address(&self, id: &AddressId) -> Result<Address> {
        self.auth.current_user_id().await?;
        self.backend.get(id).await
    }

    /// The address to ship to by default: the one flagged default, else
    /// the first saved. `None` when the book is empty.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` or the request failure.
    pub async fn default_address(&self) -> Result<Option<Address>> {
        let addresses = self.addresses().await?;
        Ok(Address::preferred(&addresses).cloned())
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` before contacting the backend when a required
    /// field is blank, otherwise `Unauthenticated` or the request failure.
    #[instrument(skip(self, draft), fields(label = draft.label()))]
    pub async fn add(&self, draft: &AddressDraft) -> Result<Address> {
        validate(draft)?;
        let user = self.auth.current_user_id().await?;
        let address = self.backend.create(&user, draft).await?;
        info!(address_id = %address.id, "Address saved");
        Ok(address)
    }

    /// Replace a saved address.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add`], plus `Network(NotFound)` for an unknown id.
    #[instrument(skip(self, draft), fields(address_id = %id))]
    pub async fn update(&self, id: &AddressId, draft: &AddressDraft) -> Result<Address> {
        validate(draft)?;
        let user = self.auth.current_user_id().await?;
        self.backend.update(&user, id, draft).await
    }

    /// Delete a saved address.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, `Network(NotFound)` or the request failure.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn remove(&self, id: &AddressId) -> Result<()> {
        let user = self.auth.current_user_id().await?;
        self.backend.delete(&user, id).await?;
        info!("Address deleted");
        Ok(())
    }
}

fn validate(draft: &AddressDraft) -> Result<()> {
    match draft.missing_field() {
        Some(field) => Err(CartError::MissingField(field)),
        None => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pethub_core::DEFAULT_ADDRESS_LABEL;

    use super::*;
    use crate::testing::{InMemoryAccount, StaticAuth};

    fn draft(name: &str, is_default: bool) -> AddressDraft {
        AddressDraft {
            label: None,
            name: name.to_string(),
            lastname: None,
            phone: "0812345678".to_string(),
            detail: "99/1 Sukhumvit Rd".to_string(),
            zip_code: "10110".to_string(),
            province: "Bangkok".to_string(),
            district: "Watthana".to_string(),
            is_default,
        }
    }

    fn book(account: &Arc<InMemoryAccount>) -> AddressBook {
        AddressBook::new(
            Arc::clone(account) as Arc<dyn AddressBackend>,
            Arc::new(StaticAuth::user("u1")),
        )
    }

    #[tokio::test]
    async fn test_add_applies_defaults() {
        let account = Arc::new(InMemoryAccount::new());
        let book = book(&account);

        let saved = book.add(&draft("Somchai", false)).await.unwrap();
        assert_eq!(saved.label, DEFAULT_ADDRESS_LABEL);
        assert_eq!(saved.lastname, "");
        assert_eq!(book.addresses().await.unwrap(), vec![saved.clone()]);
        assert_eq!(book.address(&saved.id).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_blank_required_field_is_rejected_before_any_call() {
        let account = Arc::new(InMemoryAccount::new());
        let mut incomplete = draft("Somchai", false);
        incomplete.zip_code = String::new();

        let err = book(&account).add(&incomplete).await.unwrap_err();
        assert!(matches!(err, CartError::MissingField("zip_code")));
        assert_eq!(account.address_calls().await, 0);
    }

    #[tokio::test]
    async fn test_new_default_replaces_previous_default() {
        let account = Arc::new(InMemoryAccount::new());
        let book = book(&account);

        let home = book.add(&draft("Home", true)).await.unwrap();
        assert_eq!(book.default_address().await.unwrap().unwrap().id, home.id);

        let office = book.add(&draft("Office", true)).await.unwrap();
        let addresses = book.addresses().await.unwrap();
        assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);
        assert_eq!(book.default_address().await.unwrap().unwrap().id, office.id);
    }

    #[tokio::test]
    async fn test_default_address_falls_back_to_first() {
        let account = Arc::new(InMemoryAccount::new());
        let book = book(&account);
        assert!(book.default_address().await.unwrap().is_none());

        let first = book.add(&draft("First", false)).await.unwrap();
        book.add(&draft("Second", false)).await.unwrap();
        assert_eq!(book.default_address().await.unwrap().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let account = Arc::new(InMemoryAccount::new());
        let book = book(&account);
        let saved = book.add(&draft("Somchai", false)).await.unwrap();

        let mut changed = draft("Somsri", false);
        changed.label = Some("Office".to_string());
        let updated = book.update(&saved.id, &changed).await.unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.name, "Somsri");
        assert_eq!(updated.label, "Office");

        book.remove(&saved.id).await.unwrap();
        assert!(book.addresses().await.unwrap().is_empty());
        assert!(book.remove(&saved.id).await.unwrap_err().is_not_found());
        assert!(book.update(&saved.id, &changed).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_anonymous_shopper_has_no_address_book() {
        let account = Arc::new(InMemoryAccount::new());
        let book = AddressBook::new(account, Arc::new(StaticAuth::anonymous()));
        assert!(matches!(
            book.addresses().await,
            Err(CartError::Unauthenticated)
        ));
        assert!(matches!(
            book.add(&draft("Somchai", false)).await,
            Err(CartError::Unauthenticated)
        ));
    }

    #[test]
    fn test_request_trims_and_defaults() {
        let user = UserId::new("u1");
        let mut d = draft(" Somchai ", true);
        d.lastname = Some(" Jaidee ".to_string());
        let json = serde_json::to_value(request(&user, &d)).unwrap();
        assert_eq!(json["name"], "Somchai");
        assert_eq!(json["lastname"], "Jaidee");
        assert_eq!(json["label"], DEFAULT_ADDRESS_LABEL);
        assert_eq!(json["address"], "99/1 Sukhumvit Rd");
        assert_eq!(json["isDefault"], true);
    }
}
