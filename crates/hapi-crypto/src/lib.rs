//! Ciphers used by HAPI archives
//!
//! HAPI archives (`.hpi`, `.ufo`, `.ccx`, `.gp3`) protect their contents with
//! two independent, very light ciphers:
//!
//! - **Archive scrambling**: every byte after the fixed header is XORed with a
//!   key derived from the header and with its own absolute file position.
//! - **Chunk ciphering**: the payload of an individual SQSH chunk may be
//!   additionally obfuscated with a position-dependent byte transform.
//!
//! Neither is cryptographically meaningful; they exist purely for format
//! compatibility.
//!
//! # Examples
//!
//! ```
//! use hapi_crypto::HapiKey;
//!
//! let key = HapiKey::from_header(0x7D).expect("non-zero header key");
//! let scrambled = key.encrypt_byte(0x40, b'A');
//! assert_eq!(key.decrypt_byte(0x40, scrambled), b'A');
//!
//! // A zero header word means the archive is not scrambled.
//! assert!(HapiKey::from_header(0).is_none());
//! ```

#![warn(missing_docs)]

pub mod chunk;
pub mod key;

pub use chunk::{decrypt_chunk, encrypt_chunk};
pub use key::HapiKey;
