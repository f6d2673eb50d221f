//! Object name and extension rules applied before anything is written

use thiserror::Error;

use crate::{model::StoragePolicy, Error};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameValidationError {
	#[error("name cannot be empty")]
	Empty,

	#[error("name cannot contain path separators (/ or \\)")]
	ContainsPathSeparator,

	#[error("name cannot be '.' or '..'")]
	InvalidDotName,

	#[error("name contains invalid character: {0:?}")]
	InvalidCharacter(char),

	#[error("name cannot start or end with whitespace")]
	SurroundingWhitespace,

	#[error("name exceeds maximum length of {0} bytes")]
	TooLong(usize),
}

impl From<NameValidationError> for Error {
	fn from(e: NameValidationError) -> Self {
		Self::ParamInvalid(e.to_string())
	}
}

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\0'];

const MAX_NAME_LENGTH: usize = 255;

pub fn validate_name(name: &str) -> Result<(), NameValidationError> {
	if name.is_empty() {
		return Err(NameValidationError::Empty);
	}

	if name.contains(['/', '\\']) {
		return Err(NameValidationError::ContainsPathSeparator);
	}

	if name == "." || name == ".." {
		return Err(NameValidationError::InvalidDotName);
	}

	if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c) || c.is_control()) {
		return Err(NameValidationError::InvalidCharacter(c));
	}

	if name.trim() != name {
		return Err(NameValidationError::SurroundingWhitespace);
	}

	if name.len() > MAX_NAME_LENGTH {
		return Err(NameValidationError::TooLong(MAX_NAME_LENGTH));
	}

	Ok(())
}

/// Lower-cased text after the last dot, empty when there is none
#[must_use]
pub fn extension_of(name: &str) -> String {
	name.rsplit_once('.')
		.map(|(_, ext)| ext.to_lowercase())
		.unwrap_or_default()
}

/// An empty allow-list accepts every file
pub fn check_extension(policy: &StoragePolicy, name: &str) -> Result<(), Error> {
	if policy.allowed_extensions.is_empty() {
		return Ok(());
	}

	let ext = extension_of(name);
	if policy
		.allowed_extensions
		.iter()
		.any(|allowed| allowed.eq_ignore_ascii_case(&ext))
	{
		Ok(())
	} else {
		Err(Error::ParamInvalid(format!(
			"file extension '{ext}' is not allowed by storage policy '{}'",
			policy.name
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::CopyMode;

	#[test]
	fn valid_names() {
		for name in ["file.txt", "my document.pdf", ".hidden", "file-name_123", "日本語ファイル.txt"] {
			assert_eq!(validate_name(name), Ok(()), "{name}");
		}
	}

	#[test]
	fn invalid_names() {
		assert_eq!(validate_name(""), Err(NameValidationError::Empty));
		assert_eq!(
			validate_name("a/b"),
			Err(NameValidationError::ContainsPathSeparator)
		);
		assert_eq!(
			validate_name("a\\b"),
			Err(NameValidationError::ContainsPathSeparator)
		);
		assert_eq!(validate_name(".."), Err(NameValidationError::InvalidDotName));
		assert_eq!(
			validate_name("what?.txt"),
			Err(NameValidationError::InvalidCharacter('?'))
		);
		assert_eq!(
			validate_name("tab\there"),
			Err(NameValidationError::InvalidCharacter('\t'))
		);
		assert_eq!(
			validate_name(" padded "),
			Err(NameValidationError::SurroundingWhitespace)
		);
		assert_eq!(
			validate_name(&"a".repeat(256)),
			Err(NameValidationError::TooLong(MAX_NAME_LENGTH))
		);
		assert_eq!(validate_name(&"a".repeat(255)), Ok(()));
	}

	#[test]
	fn extension_allow_list() {
		let mut policy = StoragePolicy {
			id: 1,
			name: "local".into(),
			backend: "local".into(),
			max_size: 0,
			allowed_extensions: vec![],
			copy_mode: CopyMode::Reference,
		};

		assert!(check_extension(&policy, "anything.exe").is_ok());

		policy.allowed_extensions = vec!["jpg".into(), "png".into()];
		assert!(check_extension(&policy, "photo.JPG").is_ok());
		assert!(check_extension(&policy, "photo.png").is_ok());
		assert!(matches!(
			check_extension(&policy, "archive.zip"),
			Err(Error::ParamInvalid(_))
		));
		assert!(check_extension(&policy, "no_extension").is_err());
	}

	#[test]
	fn extension_extraction() {
		assert_eq!(extension_of("a.TAR.GZ"), "gz");
		assert_eq!(extension_of("README"), "");
		assert_eq!(extension_of(".bashrc"), "bashrc");
	}
}
