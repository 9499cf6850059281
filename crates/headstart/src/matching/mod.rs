//! Pure roster logic: role suggestion, dashboard filtering and ordering, and
//! roster snapshot import. Nothing here touches storage or the network.

pub mod filter;
pub mod role;
pub mod roster;
pub mod selection;
pub mod sort;
pub mod taxonomy;

pub use filter::{EmptySelection, HoursBucket, NeedFilter, RosterFilter, UnknownToken};
pub use role::determine_role;
pub use roster::{RosterImportError, RosterImporter};
pub use selection::{DashboardParams, DashboardQuery, DashboardQueryError};
pub use sort::{SortDirection, SortKey, SortSpec};
pub use taxonomy::{SkillCategory, BUSINESS_SKILLS, DESIGN_SKILL, DEV_SKILLS};
