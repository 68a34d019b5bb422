//! Customer profile types.
//!
//! A profile holds the personal details collected by the intake dialogue. It
//! is owned by exactly one account and only ever created through the intake
//! form's terminal commit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, ProfileId};

/// A customer profile owned by an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// Profile id.
    pub id: ProfileId,

    /// Owning account.
    pub account_id: AccountId,

    /// First name.
    pub first_name: String,

    /// Middle name, if provided.
    pub middle_name: Option<String>,

    /// Last name.
    pub last_name: String,

    /// Phone number (digits retained as entered, at least ten of them).
    pub phone: String,

    /// Email address.
    pub email: String,

    /// Gender.
    pub gender: String,

    /// Date of birth.
    pub date_of_birth: NaiveDate,

    /// Street address.
    pub address: String,

    /// Apartment / unit, if provided.
    pub apartment: Option<String>,

    /// City.
    pub city: String,

    /// State or region.
    pub state: String,

    /// Postal code (`NNNNN` or `NNNNN-NNNN`).
    pub postal_code: String,

    /// Optional credential supplied by the customer.
    pub password: Option<String>,

    /// When the profile was created.
    pub created_at: DateTime<Utc>,

    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

/// The editable fields of a profile.
///
/// Used by the intake machine's editing state to update a single field
/// outside the linear flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ProfileField {
    FirstName,
    MiddleName,
    LastName,
    Phone,
    Email,
    Gender,
    DateOfBirth,
    Address,
    Apartment,
    City,
    State,
    PostalCode,
    Password,
}

impl ProfileField {
    /// The intake state whose validator applies to this field.
    #[must_use]
    pub const fn intake_state(self) -> crate::IntakeState {
        use crate::IntakeState;
        match self {
            Self::FirstName => IntakeState::Name,
            Self::MiddleName => IntakeState::MiddleName,
            Self::LastName => IntakeState::LastName,
            Self::Phone => IntakeState::Phone,
            Self::Email => IntakeState::Email,
            Self::Gender => IntakeState::Gender,
            Self::DateOfBirth => IntakeState::Dob,
            Self::Address => IntakeState::Address,
            Self::Apartment => IntakeState::Apartment,
            Self::City => IntakeState::City,
            Self::State => IntakeState::State,
            Self::PostalCode => IntakeState::Postal,
            Self::Password => IntakeState::Password,
        }
    }
}

impl CustomerProfile {
    /// Apply a validated value to a single field.
    ///
    /// The value must already have passed the field's intake validator;
    /// optional fields treat an empty value as clearing the field.
    pub fn set_field(&mut self, field: ProfileField, value: String) {
        match field {
            ProfileField::FirstName => self.first_name = value,
            ProfileField::MiddleName => {
                self.middle_name = if value.is_empty() { None } else { Some(value) };
            }
            ProfileField::LastName => self.last_name = value,
            ProfileField::Phone => self.phone = value,
            ProfileField::Email => self.email = value,
            ProfileField::Gender => self.gender = value,
            ProfileField::DateOfBirth => {
                // Validator guarantees the value parses; keep the old date if
                // something slipped through.
                if let Some(date) = crate::intake::parse_dob(&value) {
                    self.date_of_birth = date;
                }
            }
            ProfileField::Address => self.address = value,
            ProfileField::Apartment => {
                self.apartment = if value.is_empty() { None } else { Some(value) };
            }
            ProfileField::City => self.city = value,
            ProfileField::State => self.state = value,
            ProfileField::PostalCode => self.postal_code = value,
            ProfileField::Password => {
                self.password = if value.is_empty() { None } else { Some(value) };
            }
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> CustomerProfile {
        CustomerProfile {
            id: ProfileId::generate(),
            account_id: AccountId::generate(),
            first_name: "Ada".into(),
            middle_name: None,
            last_name: "Lovelace".into(),
            phone: "5551234567".into(),
            email: "ada@example.com".into(),
            gender: "female".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
            address: "12 Analytical Way".into(),
            apartment: None,
            city: "London".into(),
            state: "LN".into(),
            postal_code: "12345".into(),
            password: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn set_field_updates_value_and_timestamp() {
        let mut profile = sample_profile();
        let before = profile.updated_at;

        profile.set_field(ProfileField::City, "Paris".into());
        assert_eq!(profile.city, "Paris");
        assert!(profile.updated_at >= before);
    }

    #[test]
    fn set_optional_field_empty_clears_it() {
        let mut profile = sample_profile();
        profile.middle_name = Some("Augusta".into());

        profile.set_field(ProfileField::MiddleName, String::new());
        assert!(profile.middle_name.is_none());
    }

    #[test]
    fn set_dob_parses_date() {
        let mut profile = sample_profile();
        profile.set_field(ProfileField::DateOfBirth, "1985-06-01".into());
        assert_eq!(
            profile.date_of_birth,
            NaiveDate::from_ymd_opt(1985, 6, 1).unwrap()
        );
    }
}
