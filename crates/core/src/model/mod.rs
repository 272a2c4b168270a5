mod category;
mod completion;
mod ids;
mod question;
mod selection;

pub use ids::{CategoryId, CompletionId, ParseIdError, QuestionId, UserId};

pub use category::{Category, CategoryError, sort_for_display};
pub use completion::{CompletionMark, CompletionUpdate};
pub use question::{Question, QuestionError, QuestionWithCategory, UNKNOWN_CATEGORY_NAME};
pub use selection::{SelectionError, SelectionSet};
