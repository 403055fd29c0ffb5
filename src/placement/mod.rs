//! Placement strategies (`SPEC_FULL.md` §4.12): bottom-up, top-down and
//! ILP, plus the shared lowest-common-ancestor rule binary operators use
//! regardless of which unary strategy placed everything else.

pub mod bottom_up;
pub mod ilp;
pub mod lca;
pub mod top_down;

pub use bottom_up::place_bottom_up;
pub use ilp::place_ilp;
pub use lca::place_join;
pub use top_down::place_top_down;

/// Selects which unary placement strategy a deployment uses. All three
/// honor the same admissible-path/capacity contract; `Ilp` additionally
/// minimizes total output-weighted hop distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PlacementStrategy {
    BottomUp,
    TopDown,
    Ilp,
}
