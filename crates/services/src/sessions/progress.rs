/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub answered: u32,
    pub correct: u32,
    pub max_challenges: u32,
    pub remaining: u32,
    pub score: u32,
    pub is_finished: bool,
}
