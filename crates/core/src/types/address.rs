//! Shipping addresses in the shopper's address book.

use serde::{Deserialize, Serialize};

use super::id::AddressId;

/// Label given to an address saved without one ("home").
pub const DEFAULT_ADDRESS_LABEL: &str = "บ้าน";

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub label: String,
    pub name: String,
    pub lastname: String,
    pub phone: String,
    /// House number, street and the rest of the free-form line.
    pub detail: String,
    pub zip_code: String,
    pub province: String,
    pub district: String,
    pub is_default: bool,
}

impl Address {
    /// Full recipient name.
    #[must_use]
    pub fn recipient(&self) -> String {
        format!("{} {}", self.name, self.lastname).trim().to_string()
    }

    /// The address to preselect: the one marked default, else the first.
    #[must_use]
    pub fn preferred(addresses: &[Self]) -> Option<&Self> {
        addresses
            .iter()
            .find(|a| a.is_default)
            .or_else(|| addresses.first())
    }
}

/// Fields for creating or replacing an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDraft {
    /// Blank means [`DEFAULT_ADDRESS_LABEL`].
    pub label: Option<String>,
    pub name: String,
    /// Optional; sent as an empty string when absent.
    pub lastname: Option<String>,
    pub phone: String,
    pub detail: String,
    pub zip_code: String,
    pub province: String,
    pub district: String,
    pub is_default: bool,
}

impl AddressDraft {
    #[must_use]
    pub fn label(&self) -> &str {
        match self.label.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_ADDRESS_LABEL,
            Some(label) => label,
        }
    }

    #[must_use]
    pub fn lastname(&self) -> &str {
        self.lastname.as_deref().map_or("", str::trim)
    }

    /// First required field left blank, by its field name.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("name", &self.name),
            ("phone", &self.phone),
            ("detail", &self.detail),
            ("zip_code", &self.zip_code),
            ("province", &self.province),
            ("district", &self.district),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }
}
