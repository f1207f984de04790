pub mod item;
pub mod schema;

pub use item::{ChoiceOption, Item, ItemType};
pub use schema::{Section, SurveySchema};
