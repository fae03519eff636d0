mod error;
mod manager;
mod template;

pub use error::PmError;
pub use manager::{PromptManager, REWRITE_TEMPLATE};
pub use template::PromptTemplate;
