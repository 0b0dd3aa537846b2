//! Pure, synchronous hydration of backend history into display messages.
//!
//! Nothing in this crate performs I/O or logs; diagnostics come back as
//! values on [`HydrationOutcome`].

pub mod escape;
pub mod extract;
pub mod hydrate;
pub mod normalize;
pub mod project;

pub use escape::decode;
pub use extract::{StructuredResult, build_simplified_text, parse_structured, render_output};
pub use hydrate::{ChunkHydrator, HydrationOutcome, apply};
pub use normalize::{NormalizeContext, NormalizeOutcome, Normalizer, PayloadNormalizer, normalize};
pub use project::{ProjectionOptions, project, project_with};
