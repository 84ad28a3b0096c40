pub mod accounting;
pub mod card;

pub use accounting::{AccountingClient, HttpAccountingClient};
pub use card::{CardDataProvider, HttpCardClient};
