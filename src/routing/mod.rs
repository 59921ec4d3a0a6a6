//! Audience routing over entity registries.
//!
//! Audiences pair a tag expression with delivery services and an optional
//! minimum severity; routing evaluates each audience's compiled expression
//! against every entity's tag set and reports which entities it reaches.

mod audience;
mod resolve;
mod severity;

pub use audience::{Audience, AudienceRoute, RoutingTable};
pub use resolve::{EntityTags, resolve_entities};
pub use severity::{DEFAULT_SEVERITY_LEVELS, SeverityLevels};
