// Herald - push notification dispatch and device reconciliation
//
// This library sends one message to many devices over GCM, FCM or the APNS
// binary protocol and keeps the device registry in step with what the
// services report back.

// Re-export core functionality
pub use herald_push::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use herald_config;

#[cfg(feature = "testing")]
pub use herald_testing;
