//! Question/answer dialogue for the live interview

pub mod branch;
pub mod controller;

pub use branch::{resolve_branch, synonym_lookup, SynonymBranchClassifier};
pub use controller::{DialogueController, Stage, CLOSING_MESSAGE};
