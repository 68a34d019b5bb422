//! Intake form states, prompts, and field validators.
//!
//! The dialogue is linear with two optional branches (middle name, apartment)
//! and an optional credential step behind a yes/no gate. Validation never
//! advances the machine: bad input re-emits the same state's prompt.
//!
//! The types here are pure; the state machine driver and session store live
//! in the engine crate.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, CoreError, CustomerProfile, ProfileId};

/// Marker a user sends to skip an optional step.
pub const SKIP_MARKER: &str = "-";

/// The intake dialogue states, in linear order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum IntakeState {
    Name,
    MiddleName,
    LastName,
    Phone,
    Email,
    Gender,
    Dob,
    Address,
    Apartment,
    City,
    State,
    Postal,
    PasswordOption,
    Password,
}

impl IntakeState {
    /// First state of the linear flow.
    #[must_use]
    pub const fn first() -> Self {
        Self::Name
    }

    /// The state following this one in the linear flow, or `None` when this
    /// is the last prompt before the terminal save.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Name => Some(Self::MiddleName),
            Self::MiddleName => Some(Self::LastName),
            Self::LastName => Some(Self::Phone),
            Self::Phone => Some(Self::Email),
            Self::Email => Some(Self::Gender),
            Self::Gender => Some(Self::Dob),
            Self::Dob => Some(Self::Address),
            Self::Address => Some(Self::Apartment),
            Self::Apartment => Some(Self::City),
            Self::City => Some(Self::State),
            Self::State => Some(Self::Postal),
            Self::Postal => Some(Self::PasswordOption),
            Self::PasswordOption => Some(Self::Password),
            Self::Password => None,
        }
    }

    /// Whether this step may be skipped with the skip marker.
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Self::MiddleName | Self::Apartment)
    }

    /// The prompt shown when entering this state.
    #[must_use]
    pub const fn prompt(self) -> &'static str {
        match self {
            Self::Name => "Enter the first name:",
            Self::MiddleName => "Enter the middle name (or \"-\" to skip):",
            Self::LastName => "Enter the last name:",
            Self::Phone => "Enter the phone number (at least 10 digits):",
            Self::Email => "Enter the email address:",
            Self::Gender => "Enter the gender (male / female / other):",
            Self::Dob => "Enter the date of birth (YYYY-MM-DD):",
            Self::Address => "Enter the street address:",
            Self::Apartment => "Enter the apartment or unit (or \"-\" to skip):",
            Self::City => "Enter the city:",
            Self::State => "Enter the state:",
            Self::Postal => "Enter the postal code (NNNNN or NNNNN-NNNN):",
            Self::PasswordOption => "Set a password for this profile? (yes / no):",
            Self::Password => "Enter the password (at least 6 characters):",
        }
    }

    /// Validate raw input for this state.
    ///
    /// Returns the normalized value to store. Optional states return an empty
    /// string when skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] with a user-facing message when the
    /// input does not satisfy this state's rules.
    pub fn validate(self, raw: &str) -> Result<String, ValidationError> {
        let input = raw.trim();

        if self.is_optional() && input == SKIP_MARKER {
            return Ok(String::new());
        }

        match self {
            Self::Name | Self::LastName | Self::MiddleName => validate_name(input),
            Self::Phone => validate_phone(input),
            Self::Email => validate_email(input),
            Self::Gender => validate_gender(input),
            Self::Dob => validate_dob(input),
            Self::Address | Self::Apartment | Self::City => validate_nonempty(input),
            Self::State => validate_state(input),
            Self::Postal => validate_postal(input),
            Self::PasswordOption => validate_yes_no(input),
            Self::Password => validate_password(input),
        }
    }
}

/// A rejected dialogue input. The machine stays in the same state and
/// re-emits its prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// User-facing message explaining what to fix.
    pub message: String,
}

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn validate_nonempty(input: &str) -> Result<String, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::new("This field cannot be empty."));
    }
    Ok(input.to_string())
}

fn validate_name(input: &str) -> Result<String, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::new("The name cannot be empty."));
    }
    if input.chars().any(char::is_numeric) {
        return Err(ValidationError::new("The name cannot contain digits."));
    }
    Ok(input.to_string())
}

fn validate_phone(input: &str) -> Result<String, ValidationError> {
    let digits: String = input.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 10 {
        return Err(ValidationError::new(
            "The phone number must contain at least 10 digits.",
        ));
    }
    Ok(digits)
}

fn validate_email(input: &str) -> Result<String, ValidationError> {
    let valid = input
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
    if !valid {
        return Err(ValidationError::new("That does not look like an email address."));
    }
    Ok(input.to_string())
}

fn validate_gender(input: &str) -> Result<String, ValidationError> {
    let normalized = input.to_lowercase();
    match normalized.as_str() {
        "male" | "female" | "other" => Ok(normalized),
        _ => Err(ValidationError::new("Please answer male, female, or other.")),
    }
}

/// Parse a date of birth in `YYYY-MM-DD` or `MM/DD/YYYY` form.
#[must_use]
pub fn parse_dob(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%m/%d/%Y"))
        .ok()
}

fn validate_dob(input: &str) -> Result<String, ValidationError> {
    let Some(date) = parse_dob(input) else {
        return Err(ValidationError::new(
            "Please enter the date as YYYY-MM-DD (for example 1990-04-23).",
        ));
    };
    let today = Utc::now().date_naive();
    if date >= today {
        return Err(ValidationError::new("The date of birth must be in the past."));
    }
    if today.year() - date.year() > 120 {
        return Err(ValidationError::new("That date is too far in the past."));
    }
    Ok(date.format("%Y-%m-%d").to_string())
}

fn validate_state(input: &str) -> Result<String, ValidationError> {
    if input.len() < 2 {
        return Err(ValidationError::new("Please enter the full state or region."));
    }
    Ok(input.to_string())
}

fn validate_postal(input: &str) -> Result<String, ValidationError> {
    let bytes = input.as_bytes();
    let valid = match bytes.len() {
        5 => bytes.iter().all(u8::is_ascii_digit),
        10 => {
            bytes[..5].iter().all(u8::is_ascii_digit)
                && bytes[5] == b'-'
                && bytes[6..].iter().all(u8::is_ascii_digit)
        }
        _ => false,
    };
    if !valid {
        return Err(ValidationError::new(
            "The postal code must look like 12345 or 12345-6789.",
        ));
    }
    Ok(input.to_string())
}

fn validate_yes_no(input: &str) -> Result<String, ValidationError> {
    match input.to_lowercase().as_str() {
        "yes" | "y" => Ok("yes".into()),
        "no" | "n" => Ok("no".into()),
        _ => Err(ValidationError::new("Please answer yes or no.")),
    }
}

fn validate_password(input: &str) -> Result<String, ValidationError> {
    if input.len() < 6 {
        return Err(ValidationError::new(
            "The password must be at least 6 characters.",
        ));
    }
    Ok(input.to_string())
}

/// The fields collected so far by an in-flight intake dialogue.
///
/// A draft touches only the session store; nothing is persisted until the
/// terminal commit converts it into a [`CustomerProfile`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntakeDraft {
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    gender: Option<String>,
    date_of_birth: Option<String>,
    address: Option<String>,
    apartment: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    password: Option<String>,
}

impl IntakeDraft {
    /// Record a validated, normalized value for the given state.
    ///
    /// Empty values for optional states are stored as skipped.
    pub fn record(&mut self, state: IntakeState, value: String) {
        let slot = match state {
            IntakeState::Name => &mut self.first_name,
            IntakeState::MiddleName => &mut self.middle_name,
            IntakeState::LastName => &mut self.last_name,
            IntakeState::Phone => &mut self.phone,
            IntakeState::Email => &mut self.email,
            IntakeState::Gender => &mut self.gender,
            IntakeState::Dob => &mut self.date_of_birth,
            IntakeState::Address => &mut self.address,
            IntakeState::Apartment => &mut self.apartment,
            IntakeState::City => &mut self.city,
            IntakeState::State => &mut self.state,
            IntakeState::Postal => &mut self.postal_code,
            IntakeState::Password => &mut self.password,
            // The yes/no gate is flow control, not profile data.
            IntakeState::PasswordOption => return,
        };
        *slot = if value.is_empty() { None } else { Some(value) };
    }

    /// Convert the completed draft into a profile owned by `account_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] if a mandatory field was never
    /// collected, which indicates a driver bug rather than user error.
    pub fn into_profile(self, account_id: AccountId) -> Result<CustomerProfile, CoreError> {
        fn require(value: Option<String>, field: &'static str) -> Result<String, CoreError> {
            value.ok_or(CoreError::MissingField { field })
        }

        let dob_raw = require(self.date_of_birth, "date_of_birth")?;
        let date_of_birth = parse_dob(&dob_raw).ok_or(CoreError::MissingField {
            field: "date_of_birth",
        })?;

        let now = Utc::now();
        Ok(CustomerProfile {
            id: ProfileId::generate(),
            account_id,
            first_name: require(self.first_name, "first_name")?,
            middle_name: self.middle_name,
            last_name: require(self.last_name, "last_name")?,
            phone: require(self.phone, "phone")?,
            email: require(self.email, "email")?,
            gender: require(self.gender, "gender")?,
            date_of_birth,
            address: require(self.address, "address")?,
            apartment: self.apartment,
            city: require(self.city, "city")?,
            state: require(self.state, "state")?,
            postal_code: require(self.postal_code, "postal_code")?,
            password: self.password,
            created_at: now,
            updated_at: now,
        })
    }
}
