//! Platform drivers.
//!
//! Each supported SoC provides a handle type that owns the register
//! mapping and implements the [`crate::hal`] traits. The platform is
//! chosen with a cargo feature and re-exported as [`CurrentPlatform`].

cfg_if::cfg_if! {
    if #[cfg(feature = "bcm2835")] {
        pub mod bcm2835;
        pub use bcm2835::Bcm2835 as CurrentPlatform;
    } else {
        compile_error!(
            "No platform selected!\n\
            Use: cargo build --features bcm2835"
        );
    }
}
