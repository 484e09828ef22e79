pub mod perspective;
pub mod planner;
pub mod single;
pub mod tiled;

pub use planner::{PlanError, PlannerBuilder, RequestPlannerBuilder, ViewPlan, ViewPlanner};
