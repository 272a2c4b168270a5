use thiserror::Error;

use crate::model::{CategoryError, ParseIdError, QuestionError, SelectionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
