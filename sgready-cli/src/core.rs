pub mod decision;
pub mod outcome;
pub mod state;
