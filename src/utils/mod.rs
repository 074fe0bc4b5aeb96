pub mod html;
pub mod json;
pub mod text_splitter;
pub mod threads;
pub mod token_estimator;
