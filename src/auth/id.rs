//! Strongly typed identifiers for providers and Data Management resources.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 256;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty or whitespace.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (provider, hub, project, ...).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (provider, hub, project, ...).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (provider, hub, project, ...).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ProviderId, "Identifier for a provider descriptor.", "Provider" }
def_id! { HubId, "Data Management hub identifier (e.g. `b.3f2a...`).", "Hub" }
def_id! { ProjectId, "Data Management project identifier.", "Project" }
def_id! { FolderId, "Data Management folder URN.", "Folder" }
def_id! { ItemId, "Data Management item (file) URN.", "Item" }
def_id! { VersionId, "Data Management version URN (`...?version=N`).", "Version" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashMap;
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_blanks() {
		assert!(HubId::new(" b.hub").is_err(), "Leading whitespace must be rejected.");
		assert!(HubId::new("b.hub ").is_err(), "Trailing whitespace must be rejected.");

		let hub = HubId::new("b.hub-123").expect("Hub fixture should be considered valid.");

		assert_eq!(hub.as_ref(), "b.hub-123");
		assert!(ProjectId::new("").is_err());
		assert!(ProviderId::new("with space").is_err());
	}

	#[test]
	fn urn_identifiers_are_accepted() {
		let folder = FolderId::new("urn:adsk.wipprod:fs.folder:co.AbCdEf")
			.expect("Folder URNs should be valid identifiers.");
		let version = VersionId::new("urn:adsk.wipprod:fs.file:vf.AbCdEf?version=3")
			.expect("Version URNs with query suffixes should be valid identifiers.");

		assert_eq!(format!("{folder:?}"), "Folder(urn:adsk.wipprod:fs.folder:co.AbCdEf)");
		assert!(version.ends_with("?version=3"));
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let item: ItemId = serde_json::from_str("\"urn:adsk.wipprod:dm.lineage:abc\"")
			.expect("Item should deserialize successfully.");

		assert_eq!(item.as_ref(), "urn:adsk.wipprod:dm.lineage:abc");
		assert!(serde_json::from_str::<ItemId>("\"with space\"").is_err());
	}

	#[test]
	fn unicode_whitespace_and_length_limits() {
		let nbsp = format!("hub{}id", '\u{00A0}');

		assert!(HubId::new(&nbsp).is_err());

		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		HubId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(matches!(
			HubId::new(&too_long),
			Err(IdentifierError::TooLong { kind: "Hub", .. })
		));
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ProjectId, u8> = HashMap::from_iter([(
			ProjectId::new("b.project-1").expect("Project used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("b.project-1"), Some(&7));
	}
}
