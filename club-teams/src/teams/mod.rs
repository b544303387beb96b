pub mod balancer;
pub mod reconcile;
pub mod strategy;
pub mod types;

pub use balancer::{balance_teams, balance_teams_with};
pub use reconcile::reconcile;
pub use strategy::{Exact, Greedy, SeatingStrategy, StrategyKind};
pub use types::{AssignmentEntry, Balance, Seat, Team, TeamTarget, DEFAULT_TEAM_SIZE};
