//! Mining identities: index-aligned public addresses and signing credentials.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;

use crate::error::IdentityError;

/// Identities driven through every round
pub const IDENTITY_COUNT: usize = 5;

/// Accounts of the local development node
pub const PUBLIC_ADDRESSES: [&str; IDENTITY_COUNT] = [
    "0xe037ec8ec9ec423826750853899394de7f024fee",
    "0xcdd8fa31af8475574b8909f135d510579a8087d3",
    "0xb9dd5afd86547df817da2d0fb89334a6f8edd891",
    "0x230570cd052f40e14c14a81038c6f3aa685d712b",
    "0x3233afa02644ccd048587f8ba6e99b3c00a34dcc",
];

pub const CREDENTIALS: [&str; IDENTITY_COUNT] = [
    "4bdc16637633fa4b4854670fbb83fa254756798009f52a1d3add27fb5f5a8e16",
    "d32132133e03be292495035cf32e0e2ce0227728ff7ec4ef5d47ec95097ceeed",
    "d13dc98a245bd29193d5b41203a1d3a4ae564257d60e00d6f68d120ef6b796c5",
    "4beaa6653cdcacc36e3c400ce286f2aefd59e2642c2f7f29804708a434dd7dbe",
    "78c1c7e40057ea22a36a0185380ce04ba4f333919d1c5e2effaf0ae8d6431f14",
];

/// Opaque signing credential, only ever handed to the submitter
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub address: Address,
    pub credential: Credential,
}

/// The fixed, ordered set of identities
#[derive(Debug, Clone)]
pub struct IdentitySet {
    identities: Vec<Identity>,
}

impl IdentitySet {
    pub fn from_lists(addresses: &[&str], credentials: &[&str]) -> Result<Self, IdentityError> {
        if addresses.len() != credentials.len() {
            return Err(IdentityError::LengthMismatch {
                addresses: addresses.len(),
                credentials: credentials.len(),
            });
        }
        if addresses.len() != IDENTITY_COUNT {
            return Err(IdentityError::WrongCount {
                expected: IDENTITY_COUNT,
                actual: addresses.len(),
            });
        }

        let identities = addresses
            .iter()
            .zip(credentials)
            .enumerate()
            .map(|(index, (address, credential))| {
                let address =
                    Address::from_str(address).map_err(|_| IdentityError::InvalidAddress {
                        index,
                        value: address.to_string(),
                    })?;
                let credential = credential.trim();
                if credential.is_empty() {
                    return Err(IdentityError::EmptyCredential { index });
                }
                Ok(Identity {
                    address,
                    credential: Credential::new(credential),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { identities })
    }

    /// The built-in development accounts
    pub fn builtin() -> Result<Self, IdentityError> {
        Self::from_lists(&PUBLIC_ADDRESSES, &CREDENTIALS)
    }

    pub fn get(&self, index: usize) -> Option<&Identity> {
        self.identities.get(index)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_builtin_identities() {
        let set = IdentitySet::builtin().unwrap();
        assert_eq!(set.len(), IDENTITY_COUNT);
        assert_eq!(
            set.get(0).unwrap().address,
            address!("e037ec8ec9ec423826750853899394de7f024fee")
        );
        assert_eq!(
            set.get(4).unwrap().credential.expose(),
            "78c1c7e40057ea22a36a0185380ce04ba4f333919d1c5e2effaf0ae8d6431f14"
        );
        assert!(set.get(5).is_none());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let set = IdentitySet::builtin().unwrap();
        let printed = format!("{:?}", set.get(1).unwrap());
        assert!(printed.contains("redacted"));
        assert!(!printed.contains(CREDENTIALS[1]));
    }

    #[test]
    fn test_mismatched_lists() {
        assert_eq!(
            IdentitySet::from_lists(&PUBLIC_ADDRESSES, &CREDENTIALS[..4]).unwrap_err(),
            IdentityError::LengthMismatch {
                addresses: 5,
                credentials: 4
            }
        );
        assert_eq!(
            IdentitySet::from_lists(&PUBLIC_ADDRESSES[..3], &CREDENTIALS[..3]).unwrap_err(),
            IdentityError::WrongCount {
                expected: 5,
                actual: 3
            }
        );
    }

    #[test]
    fn test_invalid_entries() {
        let mut addresses = PUBLIC_ADDRESSES;
        addresses[2] = "0xnothex";
        assert!(matches!(
            IdentitySet::from_lists(&addresses, &CREDENTIALS),
            Err(IdentityError::InvalidAddress { index: 2, .. })
        ));

        let mut credentials = CREDENTIALS;
        credentials[3] = "  ";
        assert_eq!(
            IdentitySet::from_lists(&PUBLIC_ADDRESSES, &credentials).unwrap_err(),
            IdentityError::EmptyCredential { index: 3 }
        );
    }
}
