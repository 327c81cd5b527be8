//! Model-facing engine: response normalisation, estimation with fallbacks,
//! refinement and advice generation. No HTTP or SQL in here.

pub mod advisor;
pub mod client;
pub mod coerce;
pub mod error;
pub mod estimation;
pub mod extract;
pub mod locate;
pub mod meal_type;
pub mod preferences;
pub mod refine;

pub use client::{ModelClient, OllamaClient};
pub use error::{ai_failure, AiError};
pub use meal_type::MealType;
pub use preferences::AiPreferences;
