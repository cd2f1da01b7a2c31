pub mod bundle;
pub mod crypto;
pub mod descriptor;
pub mod error;
pub mod localization;
pub mod project;
pub mod scancode;

pub use bundle::{CompressionLevel, Manifest, ManifestBuilder, PassStream};
pub use crypto::{Credentials, PemInput, PemSource};
pub use descriptor::{Descriptor, FieldArea, MergePolicy, PassType, Relevance, TransitType};
pub use error::Error;
pub use localization::Localizations;
pub use project::Project;
pub use scancode::{ScanCodeInput, ScanCodeSet};

pub type Result<T> = std::result::Result<T, Error>;
