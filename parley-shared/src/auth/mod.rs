/// Credential handling
///
/// - `password`: Argon2id hashing behind the [`password::CredentialHasher`] seam

pub mod password;
