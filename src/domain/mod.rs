pub mod carrier;
pub mod constants;
pub mod crypto;
pub mod patch;
pub mod pkcs7;
pub mod powershell;
pub mod spc;
pub mod style;
pub mod types;
