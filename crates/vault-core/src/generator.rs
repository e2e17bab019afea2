//! Random password generation

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Character classes and length; lowercase is always included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorOptions {
    pub length: usize,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            length: 16,
            uppercase: true,
            digits: true,
            symbols: true,
        }
    }
}

impl GeneratorOptions {
    fn classes(&self) -> Vec<&'static [u8]> {
        let mut classes = vec![LOWERCASE];
        if self.uppercase {
            classes.push(UPPERCASE);
        }
        if self.digits {
            classes.push(DIGITS);
        }
        if self.symbols {
            classes.push(SYMBOLS);
        }
        classes
    }
}

/// Generate a password with at least one character of every enabled class
pub fn generate(options: &GeneratorOptions) -> Result<String> {
    let classes = options.classes();
    if options.length < classes.len() {
        return Err(VaultError::InvalidInput(format!(
            "password length must be at least {} for the selected character classes",
            classes.len()
        )));
    }

    let mut rng = OsRng;
    let alphabet: Vec<u8> = classes.concat();

    let mut password: Vec<u8> = classes
        .iter()
        .filter_map(|class| class.choose(&mut rng).copied())
        .collect();
    while password.len() < options.length {
        if let Some(c) = alphabet.choose(&mut rng) {
            password.push(*c);
        }
    }
    password.shuffle(&mut rng);

    // Every alphabet byte is ASCII
    Ok(password.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains_any(password: &str, class: &[u8]) -> bool {
        password.bytes().any(|b| class.contains(&b))
    }

    #[test]
    fn test_default_has_every_class() {
        for _ in 0..50 {
            let password = generate(&GeneratorOptions::default()).unwrap();

            assert_eq!(password.len(), 16);
            assert!(contains_any(&password, LOWERCASE));
            assert!(contains_any(&password, UPPERCASE));
            assert!(contains_any(&password, DIGITS));
            assert!(contains_any(&password, SYMBOLS));
        }
    }

    #[test]
    fn test_disabled_classes_are_absent() {
        let options = GeneratorOptions {
            length: 32,
            uppercase: false,
            digits: true,
            symbols: false,
        };

        let password = generate(&options).unwrap();
        assert_eq!(password.len(), 32);
        assert!(!contains_any(&password, UPPERCASE));
        assert!(!contains_any(&password, SYMBOLS));
        assert!(contains_any(&password, DIGITS));
    }

    #[test]
    fn test_minimum_length() {
        let options = GeneratorOptions {
            length: 3,
            ..GeneratorOptions::default()
        };
        assert!(matches!(generate(&options), Err(VaultError::InvalidInput(_))));

        let options = GeneratorOptions {
            length: 4,
            ..GeneratorOptions::default()
        };
        assert_eq!(generate(&options).unwrap().len(), 4);
    }

    #[test]
    fn test_passwords_differ() {
        let options = GeneratorOptions::default();
        assert_ne!(generate(&options).unwrap(), generate(&options).unwrap());
    }
}
