pub mod transport_cipher;

// Re-export key types
pub use transport_cipher::{derive_key_iv, encrypt_private_key, PrivateKeyTransportCipher, TransportKey};
