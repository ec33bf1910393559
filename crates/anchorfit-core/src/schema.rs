/// Arrow schema definitions for refinement batch files.
pub mod batch {
    use arrow::datatypes::{DataType, Field, Schema};

    /// Output column names, in write order.
    pub const ANCHOR: &str = "anchor";
    pub const ORIGINAL_TEXT: &str = "original_text";
    pub const IMPROVED_TEXT: &str = "improved_text";
    pub const TAG: &str = "tag";
    pub const OLD_SCORE: &str = "old_score";
    pub const NEW_SCORE: &str = "new_score";
    pub const PERCENT_CHANGE: &str = "percent_change";
    pub const DECISION: &str = "decision";
    pub const ATTEMPTS: &str = "attempts";

    /// Schema for refinement results, one row per input row.
    ///
    /// `percent_change` is null when the baseline score is zero.
    pub fn results_schema() -> Schema {
        Schema::new(vec![
            Field::new(ANCHOR, DataType::Utf8, false),
            Field::new(ORIGINAL_TEXT, DataType::Utf8, false),
            Field::new(IMPROVED_TEXT, DataType::Utf8, false),
            Field::new(TAG, DataType::Utf8, false),
            Field::new(OLD_SCORE, DataType::Float64, false),
            Field::new(NEW_SCORE, DataType::Float64, false),
            Field::new(PERCENT_CHANGE, DataType::Float64, true),
            Field::new(DECISION, DataType::Utf8, false),
            Field::new(ATTEMPTS, DataType::UInt32, false),
        ])
    }
}
