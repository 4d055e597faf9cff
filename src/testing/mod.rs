//! Testing infrastructure for ClaudeStep.
//!
//! - **Mocks**: [`MockHosting`], an in-memory [`crate::hosting::HostingApi`]
//!   with controllable conflicts and failures
//! - **Fixtures**: sample checklists, configurations and metadata builders
//!
//! The hosting trait itself lives at the seam in [`crate::hosting`].
//!
//! # Example
//!
//! ```rust,ignore
//! use claudestep::testing::{MetadataFixture, MockHosting, SAMPLE_SPEC};
//!
//! let hosting = MockHosting::new()
//!     .with_branch("claudestep-metadata")
//!     .with_forced_conflicts(2);
//!
//! let metadata = MetadataFixture::new("auth").with_checklist(SAMPLE_SPEC).build();
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
