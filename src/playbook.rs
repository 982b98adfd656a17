//! Agent playbook: free-text triage rules plus an optional policy handbook.
//!
//! The playbook is global to the agent's workspace, with no per-client
//! scoping, and only changes through explicit edits. Rules travel verbatim
//! inside the generation system instruction; the handbook document travels
//! as a binary attachment and is never inlined as text.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use crate::error::StoreError;

/// Rule set shipped with a fresh workspace, used until the agent edits it.
pub const DEFAULT_PLAYBOOK_RULES: &str = r#"[RULE: ADDRESS CHANGE]
- Ask for "Effective Date" of the move.
- Verify policies: Householders, Liability, Legal.
- Ask if bank details (IBAN) changed.

[RULE: EMOTIONAL TONE]
- If 'Urgent': Confirm receipt immediately.
- If 'Frustrated': Apologize for the friction first.

[RULE: STYLE]
- Professional and warm.
- Sign off: "Best regards, Your Agency Team""#;

/// An attached policy handbook document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandbookDocument {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl HandbookDocument {
    /// Wrap raw document bytes, guessing the MIME type from the file name.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime_type,
            data,
        }
    }
}

/// The agent's configured triage knowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playbook {
    pub rules_text: String,
    pub handbook: Option<HandbookDocument>,
}

impl Default for Playbook {
    fn default() -> Self {
        Self {
            rules_text: DEFAULT_PLAYBOOK_RULES.to_string(),
            handbook: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PlaybookManifest {
    rules_text: String,
    handbook_name: Option<String>,
    handbook_mime: Option<String>,
}

/// Persists the playbook across sessions in the workspace data directory.
///
/// Layout: `playbook.toml` (rules plus handbook metadata) and `handbook.bin`
/// (the raw document bytes, present only while a handbook is attached).
#[derive(Debug, Clone)]
pub struct PlaybookStore {
    dir: PathBuf,
}

impl PlaybookStore {
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            dir: storage.data_dir.clone(),
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.dir.join("playbook.toml")
    }

    fn handbook_path(&self) -> PathBuf {
        self.dir.join("handbook.bin")
    }

    /// Load the persisted playbook. A fresh workspace yields the defaults.
    pub fn load(&self) -> Result<Playbook, StoreError> {
        let raw = match std::fs::read_to_string(self.manifest_path()) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Playbook::default());
            }
            Err(err) => {
                return Err(StoreError::Local(format!("failed to read playbook: {err}")));
            }
        };

        let manifest: PlaybookManifest = toml::from_str(&raw)
            .map_err(|err| StoreError::Local(format!("corrupt playbook manifest: {err}")))?;

        let handbook = match (manifest.handbook_name, manifest.handbook_mime) {
            (Some(name), mime) => {
                let data = std::fs::read(self.handbook_path()).map_err(|err| {
                    StoreError::Local(format!("failed to read handbook document: {err}"))
                })?;
                let mime_type = mime.unwrap_or_else(|| {
                    mime_guess::from_path(&name)
                        .first_or_octet_stream()
                        .essence_str()
                        .to_string()
                });
                Some(HandbookDocument {
                    name,
                    mime_type,
                    data,
                })
            }
            (None, _) => None,
        };

        Ok(Playbook {
            rules_text: manifest.rules_text,
            handbook,
        })
    }

    /// Persist the playbook, replacing whatever was stored before.
    pub fn save(&self, playbook: &Playbook) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|err| {
            StoreError::Local(format!(
                "failed to create workspace dir {}: {err}",
                self.dir.display()
            ))
        })?;

        let manifest = PlaybookManifest {
            rules_text: playbook.rules_text.clone(),
            handbook_name: playbook.handbook.as_ref().map(|h| h.name.clone()),
            handbook_mime: playbook.handbook.as_ref().map(|h| h.mime_type.clone()),
        };
        let raw = toml::to_string_pretty(&manifest)
            .map_err(|err| StoreError::Local(format!("failed to serialize playbook: {err}")))?;
        std::fs::write(self.manifest_path(), raw)
            .map_err(|err| StoreError::Local(format!("failed to write playbook: {err}")))?;

        match &playbook.handbook {
            Some(handbook) => std::fs::write(self.handbook_path(), &handbook.data)
                .map_err(|err| StoreError::Local(format!("failed to write handbook: {err}")))?,
            None => {
                if let Err(err) = std::fs::remove_file(self.handbook_path())
                    && err.kind() != std::io::ErrorKind::NotFound
                {
                    return Err(StoreError::Local(format!(
                        "failed to remove stale handbook: {err}"
                    )));
                }
            }
        }
        Ok(())
    }
}
