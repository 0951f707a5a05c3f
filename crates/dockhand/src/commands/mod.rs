pub mod build;
pub mod deploy;
pub mod fingerprint;
pub mod inspect;
