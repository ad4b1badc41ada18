pub mod credentials;

pub use credentials::{Credential, CredentialResolver, CredentialStore, StaticCredentialStore};
