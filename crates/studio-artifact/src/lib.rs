//! Studio Artifact
//!
//! Value types for what a generation backend hands back.
//!
//! # Core Concepts
//!
//! - [`GeneratedArtifact`]: generated component source with optional handles
//! - [`PreviewHandle`]: opaque reference for the sandboxed renderer
//! - [`DeploymentHandle`]: hosted copy of the artifact
//! - [`ContentHash`]: 32-byte Blake3 hash of the source
//!
//! # Example
//!
//! ```rust
//! use studio_artifact::{GeneratedArtifact, PreviewHandle};
//!
//! let artifact = GeneratedArtifact::new("export default () => <main />")
//!     .unwrap()
//!     .with_preview(PreviewHandle::new("sandbox://42"));
//!
//! assert!(artifact.has_preview());
//! println!("Hash: {}", artifact.hash().short());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod hash;

pub use artifact::{ArtifactError, DeploymentHandle, GeneratedArtifact, PreviewHandle};
pub use hash::{ContentHash, HashError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_non_blank_source_always_builds(source in "[a-zA-Z<>/ ]{0,32}[a-zA-Z<>/]") {
            let artifact = GeneratedArtifact::new(source.clone()).unwrap();
            prop_assert_eq!(artifact.source(), source.as_str());
            prop_assert!(artifact.verify());
        }

        #[test]
        fn prop_hash_roundtrips_through_hex(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let hash = ContentHash::compute(&data);
            let parsed: ContentHash = hash.to_string().parse().unwrap();
            prop_assert_eq!(hash, parsed);
        }
    }
}
