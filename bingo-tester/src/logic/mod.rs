pub mod card_tester;
pub mod reports;
pub mod seeds;
pub mod tester;

pub use card_tester::{CardPlan, CardTester, RunSummary, Step};
pub use seeds::resolve_seed_inputs;
pub use tester::*;
