//! Intake dialogue driver and session store.
//!
//! Sessions are in-memory and per-account: one live dialogue at a time. The
//! draft accumulates only in the session; nothing touches the profile store
//! until the terminal commit, and `Cancel` discards unconditionally from any
//! state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use tokdesk_core::{
    AccountId, CustomerProfile, IntakeDraft, IntakeState, ProfileField, ProfileId,
};
use tokdesk_store::Store;

use crate::error::{EngineError, Result};

/// A user action delivered to the intake machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntakeEvent {
    /// Free-form text answering the current prompt. When no dialogue is
    /// live, the first input starts one and is answered with the first
    /// prompt.
    Input {
        /// The raw user text.
        text: String,
    },

    /// Discard the live dialogue, whatever state it is in.
    Cancel,

    /// Start a single-field edit of an existing profile. The next `Input`
    /// supplies the new value.
    EditField {
        /// The profile to edit. Must belong to the acting account.
        profile_id: ProfileId,
        /// The field to replace.
        field: ProfileField,
    },
}

/// The machine's answer to one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntakeReply {
    /// Ask the user the next question.
    Prompt {
        /// The state now awaiting input.
        state: IntakeState,
        /// The question to show.
        message: String,
    },

    /// The input was rejected; the same state is re-prompted.
    Invalid {
        /// The state still awaiting input.
        state: IntakeState,
        /// What to fix.
        message: String,
    },

    /// The dialogue finished and the profile was committed to the store.
    Completed {
        /// The newly created profile.
        profile: CustomerProfile,
    },

    /// A single-field edit was applied to a stored profile.
    Updated {
        /// The profile after the edit.
        profile: CustomerProfile,
    },

    /// The dialogue (if any) was discarded.
    Cancelled,
}

enum Session {
    Flow { state: IntakeState, draft: IntakeDraft },
    Editing { profile_id: ProfileId, field: ProfileField },
}

/// Drives intake dialogues over an in-memory session map.
pub struct IntakeEngine {
    store: Arc<dyn Store>,
    sessions: Mutex<HashMap<AccountId, Session>>,
}

impl IntakeEngine {
    /// Create an intake engine over the given store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one user event for one account.
    ///
    /// # Errors
    ///
    /// Returns an error when a referenced profile is missing or not owned by
    /// the account, or when the store fails. Bad *input* is not an error; it
    /// comes back as [`IntakeReply::Invalid`].
    pub fn handle(&self, account_id: AccountId, event: IntakeEvent) -> Result<IntakeReply> {
        match event {
            IntakeEvent::Input { text } => self.handle_input(account_id, &text),
            IntakeEvent::Cancel => {
                let had_session = self.lock_sessions().remove(&account_id).is_some();
                tracing::debug!(%account_id, had_session, "intake cancelled");
                Ok(IntakeReply::Cancelled)
            }
            IntakeEvent::EditField { profile_id, field } => {
                self.begin_edit(account_id, profile_id, field)
            }
        }
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<AccountId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_edit(
        &self,
        account_id: AccountId,
        profile_id: ProfileId,
        field: ProfileField,
    ) -> Result<IntakeReply> {
        let profile = self
            .store
            .get_profile(&profile_id)?
            .ok_or_else(|| tokdesk_store::StoreError::NotFound {
                entity: "profile",
                id: profile_id.to_string(),
            })?;
        if profile.account_id != account_id {
            return Err(EngineError::Forbidden("profile belongs to another account"));
        }

        let state = field.intake_state();
        self.lock_sessions()
            .insert(account_id, Session::Editing { profile_id, field });
        Ok(prompt(state))
    }

    fn handle_input(&self, account_id: AccountId, text: &str) -> Result<IntakeReply> {
        let mut sessions = self.lock_sessions();

        match sessions.remove(&account_id) {
            None => {
                // First contact starts a fresh dialogue; the triggering text
                // is not an answer to anything.
                let state = IntakeState::first();
                sessions.insert(
                    account_id,
                    Session::Flow {
                        state,
                        draft: IntakeDraft::default(),
                    },
                );
                Ok(prompt(state))
            }

            Some(Session::Flow { state, mut draft }) => match state.validate(text) {
                Err(err) => {
                    let message = err.message.clone();
                    sessions.insert(account_id, Session::Flow { state, draft });
                    Ok(IntakeReply::Invalid { state, message })
                }
                Ok(value) => {
                    // The yes/no gate routes without recording anything.
                    if state == IntakeState::PasswordOption && value == "no" {
                        return self.commit(&mut sessions, account_id, draft);
                    }
                    draft.record(state, value);
                    match state.next() {
                        Some(next) => {
                            sessions.insert(account_id, Session::Flow { state: next, draft });
                            Ok(prompt(next))
                        }
                        None => self.commit(&mut sessions, account_id, draft),
                    }
                }
            },

            Some(Session::Editing { profile_id, field }) => {
                let state = field.intake_state();
                match state.validate(text) {
                    Err(err) => {
                        let message = err.message.clone();
                        sessions.insert(account_id, Session::Editing { profile_id, field });
                        Ok(IntakeReply::Invalid { state, message })
                    }
                    Ok(value) => {
                        let mut profile = self.store.get_profile(&profile_id)?.ok_or_else(|| {
                            tokdesk_store::StoreError::NotFound {
                                entity: "profile",
                                id: profile_id.to_string(),
                            }
                        })?;
                        profile.set_field(field, value);
                        self.store.put_profile(&profile)?;
                        tracing::info!(%account_id, %profile_id, ?field, "profile field updated");
                        Ok(IntakeReply::Updated { profile })
                    }
                }
            }
        }
    }

    /// Terminal commit: the only point where a dialogue produces a stored
    /// profile. On failure the session is restored so the user can retry.
    fn commit(
        &self,
        sessions: &mut HashMap<AccountId, Session>,
        account_id: AccountId,
        draft: IntakeDraft,
    ) -> Result<IntakeReply> {
        let profile = match draft.clone().into_profile(account_id) {
            Ok(profile) => profile,
            Err(err) => {
                sessions.insert(
                    account_id,
                    Session::Flow {
                        state: IntakeState::first(),
                        draft,
                    },
                );
                return Err(err.into());
            }
        };

        if let Err(err) = self.store.put_profile(&profile) {
            sessions.insert(
                account_id,
                Session::Flow {
                    state: IntakeState::Password,
                    draft,
                },
            );
            return Err(err.into());
        }

        tracing::info!(%account_id, profile_id = %profile.id, "intake completed");
        Ok(IntakeReply::Completed { profile })
    }
}

fn prompt(state: IntakeState) -> IntakeReply {
    IntakeReply::Prompt {
        state,
        message: state.prompt().to_string(),
    }
}
