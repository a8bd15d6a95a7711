pub mod manifest;
pub mod resolver;
pub mod version_file;

pub use manifest::{LatestVersions, VersionCatalog, VersionEntry, VersionType};
pub use resolver::ManifestResolver;
pub use version_file::{ArtifactDescriptor, AssetIndexDescriptor, VersionMetadata};
