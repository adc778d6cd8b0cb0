//! Season data model.
//!
//! Plain data supplied by external collaborators: the roster, team
//! equipment, the event calendar and confirmed results. Everything here
//! is immutable once a [`Season`] has been validated.

pub mod competitor;
pub mod event;
pub mod result;
pub mod season;
pub mod team;

pub use competitor::{Competitor, Personality, SkillTraits};
pub use event::{Downforce, EventDescriptor, LapProfile, Overtaking, TrackType, TyreDeg};
pub use result::ConfirmedResult;
pub use season::{Season, SeasonData};
pub use team::{Component, ComponentRates, PitCrew, Team, TeamTier};
