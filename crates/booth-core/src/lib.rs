//! booth-core — Subject segmentation and background compositing.
//!
//! Given a captured photograph and a backdrop image, produces a composite in
//! which the subject is preserved and the original background is replaced.
//! Three segmentation backends are supported — a fast neural portrait matte,
//! a general-purpose background remover, and a region-growing classical
//! fallback — tried in that order when the selector is `auto`. Every path
//! yields an image; failures degrade, they never propagate to the caller.

pub mod detector;
pub mod grabcut;
pub mod mask;
pub mod matting;
pub mod pipeline;
pub mod portrait;
pub mod session;
pub mod types;

pub use mask::Mask;
pub use pipeline::{composite, Backends};
pub use session::{transition, SessionEvent, SessionState, TransitionError};
pub use types::{CompositeResult, FaceBox, MethodUsed, SegMethod, SeedRect};
